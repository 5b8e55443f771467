//! # Feed Harness
//!
//! Two small fetch-transform-load pipelines, each with a thin HTTP read API.
//!
//! - **Posts**: pull a JSON array from an upstream API, project it to
//!   `(userId, post_id, title)`, and replace a PostgreSQL table with it.
//!   The posts API serves the table back.
//! - **Articles**: provision an LLM in Ollama, recreate a Weaviate
//!   collection, and bulk-import a JSON file of articles. The articles API
//!   exposes semantic search, category-filtered search and RAG answers.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────┐   ┌────────────┐   ┌───────────┐
//! │ upstream API │──▶│ transform │──▶│ PostgreSQL │──▶│ posts API │
//! └──────────────┘   └───────────┘   └────────────┘   └───────────┘
//!
//! ┌──────────────┐   ┌───────────┐   ┌────────────┐   ┌──────────────┐
//! │  data.json   │──▶│  import   │──▶│  Weaviate  │──▶│ articles API │
//! └──────────────┘   └───────────┘   └────────────┘   └──────┬───────┘
//!                                                            │
//!                                                     ┌──────▼───────┐
//!                                                     │    Ollama    │
//!                                                     └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! feed posts load                    # fetch and replace the posts table
//! feed posts serve                   # GET /posts on :8000
//! feed articles load --data data.json
//! feed articles serve                # /search, /filter, /ask on :8000
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration with environment overrides |
//! | [`models`] | Core data types |
//! | [`retry`] | Bounded retry with injectable sleeper |
//! | [`db`] | PostgreSQL pool and readiness wait |
//! | [`fetch`] | Upstream JSON fetch |
//! | [`transform`] | Field projection and preview |
//! | [`store`] | Post storage seam (PostgreSQL, in-memory) |
//! | [`ingest`] | `posts load` pipeline |
//! | [`server`] | Posts read API |
//! | [`progress`] | Model pull progress reporting |
//! | [`ollama`] | Ollama model provisioning and generation |
//! | [`vector`] | Article storage seam (Weaviate, in-memory) |
//! | [`import`] | `articles load` pipeline |
//! | [`rag`] | Prompt composition and answers |
//! | [`vector_server`] | Articles read API |
//! | [`cors`] | Cross-origin policy for both APIs |

pub mod config;
pub mod cors;
pub mod db;
pub mod fetch;
pub mod import;
pub mod ingest;
pub mod models;
pub mod ollama;
pub mod progress;
pub mod rag;
pub mod retry;
pub mod server;
pub mod store;
pub mod transform;
pub mod vector;
pub mod vector_server;
