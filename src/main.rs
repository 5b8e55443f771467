//! # Feed Harness CLI (`feed`)
//!
//! ## Usage
//!
//! ```bash
//! feed [--config ./feed.toml] <pipeline> <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `feed posts load` | Fetch upstream posts and replace the PostgreSQL table |
//! | `feed posts serve` | Start the posts read API |
//! | `feed articles load` | Pull the LLM, recreate the collection, import articles |
//! | `feed articles serve` | Start the articles read API |
//!
//! Human-facing output goes to stdout. Logs go to stderr, filtered by
//! `RUST_LOG` (default `info`).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use feed_harness::progress::ProgressMode;
use feed_harness::{config, import, ingest, server, vector_server};

/// Feed Harness: fetch-transform-load pipelines for PostgreSQL and Weaviate
/// with thin HTTP read APIs.
#[derive(Parser)]
#[command(name = "feed", version)]
struct Cli {
    /// Path to a TOML configuration file.
    ///
    /// Optional. Without it, built-in defaults are used. Environment
    /// variables (`DB_HOST`, `WEAVIATE_URL`, ...) override either.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Posts pipeline: upstream JSON API into PostgreSQL.
    Posts {
        #[command(subcommand)]
        action: PostsAction,
    },
    /// Articles pipeline: JSON file into Weaviate, with RAG over Ollama.
    Articles {
        #[command(subcommand)]
        action: ArticlesAction,
    },
}

#[derive(Subcommand)]
enum PostsAction {
    /// Fetch posts, project them, and replace the destination table.
    ///
    /// Waits for the database with a bounded fixed-delay retry. Exits
    /// non-zero on any failure.
    Load {
        /// Fetch and preview only; do not touch the database.
        #[arg(long)]
        dry_run: bool,
    },
    /// Serve `GET /posts`.
    Serve {
        /// Bind address, overriding `server.bind`.
        #[arg(long)]
        bind: Option<String>,
    },
}

#[derive(Subcommand)]
enum ArticlesAction {
    /// Pull the model, recreate the collection, and import articles.
    Load {
        /// JSON array of `{title, content, category}` objects.
        #[arg(long, default_value = "data.json")]
        data: PathBuf,

        /// Do not ask Ollama to pull the model.
        #[arg(long)]
        skip_pull: bool,

        /// Pull progress on stderr: off, human, or json.
        /// Default: human when stderr is a TTY, otherwise off.
        #[arg(long, value_enum)]
        progress: Option<ProgressMode>,
    },
    /// Serve `/search`, `/filter` and `/ask`.
    Serve {
        /// Bind address, overriding `server.bind`.
        #[arg(long)]
        bind: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Posts { action } => match action {
            PostsAction::Load { dry_run } => {
                ingest::run_posts_load(&cfg, dry_run).await?;
            }
            PostsAction::Serve { bind } => {
                server::run_posts_server(&cfg, bind).await?;
            }
        },
        Commands::Articles { action } => match action {
            ArticlesAction::Load {
                data,
                skip_pull,
                progress,
            } => {
                let mode = progress.unwrap_or_else(ProgressMode::default_for_tty);
                import::run_articles_load(&cfg, &data, skip_pull, mode).await?;
            }
            ArticlesAction::Serve { bind } => {
                vector_server::run_articles_server(&cfg, bind).await?;
            }
        },
    }

    Ok(())
}
