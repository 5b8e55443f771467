//! Vector store abstraction for the article collection.
//!
//! [`ArticleStore`] covers both sides of the articles pipeline: collection
//! provisioning and batched import for the loader, near-text search for the
//! read service. [`Generator`] is the LLM seam used by `/ask`.
//!
//! Backends:
//! - [`weaviate::WeaviateStore`]: Weaviate over REST and GraphQL.
//! - [`memory::InMemoryArticleStore`]: brute-force cosine search over
//!   hashed bag-of-words vectors, for tests.

pub mod memory;
pub mod schema;
pub mod weaviate;

use async_trait::async_trait;

use crate::models::{Article, ScoredArticle};

use self::schema::CollectionSchema;

/// Failure kinds surfaced by an [`ArticleStore`] or [`Generator`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VectorError {
    #[error("collection '{0}' does not exist")]
    CollectionMissing(String),
    #[error("vector store connection failed: {0}")]
    Connection(String),
    #[error("query failed: {0}")]
    Query(String),
    #[error("{failed} objects in batch failed: {message}")]
    Batch { failed: usize, message: String },
    #[error("generation failed: {0}")]
    Generation(String),
}

impl VectorError {
    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            VectorError::CollectionMissing(_) => "collection_missing",
            VectorError::Connection(_) => "connection_failed",
            VectorError::Query(_) => "query_failed",
            VectorError::Batch { .. } => "batch_failed",
            VectorError::Generation(_) => "generation_failed",
        }
    }
}

/// A near-text search request.
#[derive(Debug, Clone, PartialEq)]
pub struct NearTextQuery {
    pub text: String,
    pub limit: usize,
    /// Exact, case-sensitive match on the `category` property.
    pub category: Option<String>,
}

impl NearTextQuery {
    pub fn new(text: impl Into<String>, limit: usize) -> Self {
        Self {
            text: text.into(),
            limit,
            category: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Check that the backend is up and accepting requests.
    async fn ready(&self) -> Result<(), VectorError>;

    /// Delete the collection if it exists, then create it from `schema`.
    /// Returns whether an existing collection was deleted.
    async fn recreate_collection(&self, schema: &CollectionSchema) -> Result<bool, VectorError>;

    /// Insert one batch of articles. No rollback on partial failure.
    async fn insert_batch(&self, collection: &str, articles: &[Article]) -> Result<(), VectorError>;

    /// Up to `query.limit` articles ranked by ascending vector distance.
    async fn near_text(
        &self,
        collection: &str,
        query: &NearTextQuery,
    ) -> Result<Vec<ScoredArticle>, VectorError>;

    async fn close(&self) {}
}

/// Text generation backend (an LLM).
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, VectorError>;
}
