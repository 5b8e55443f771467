//! Posts read API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Static greeting |
//! | `GET`  | `/posts` | Every row of the posts table |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! `/posts` never fails at the transport level. Store errors are returned
//! with HTTP 200 and a body of the form:
//!
//! ```json
//! { "error": "'posts' table not found. ...", "code": "table_missing" }
//! ```
//!
//! Codes: `table_missing`, `connection_failed`, `query_failed`.

use anyhow::Result;
use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use crate::config::Config;
use crate::cors::cors_layer;
use crate::db;
use crate::store::postgres::PgPostStore;
use crate::store::{PostStore, StoreError};

/// Shared state for the posts routes. The store is built once at startup.
#[derive(Clone)]
struct PostsState {
    store: Arc<dyn PostStore>,
}

/// Starts the posts read API against PostgreSQL.
///
/// The pool connects lazily, so the server comes up even when the database
/// is not reachable yet. Runs until Ctrl-C or SIGTERM, then closes the pool.
pub async fn run_posts_server(config: &Config, bind: Option<String>) -> Result<()> {
    let bind_addr = bind.unwrap_or_else(|| config.server.bind.clone());
    let store: Arc<dyn PostStore> = Arc::new(PgPostStore::new(
        db::connect_lazy(config),
        config.posts.table.clone(),
    ));
    let cors = cors_layer(&config.server.allowed_origins)?;

    let listener = TcpListener::bind(&bind_addr).await?;
    println!("posts API listening on http://{}", bind_addr);
    tracing::info!(database = %config.db.display_url(), table = %config.posts.table, "posts API started");

    serve_posts(listener, store, cors, shutdown_signal()).await
}

/// Serves the posts API on `listener` until `shutdown` resolves, then
/// closes `store`.
pub async fn serve_posts<F>(
    listener: TcpListener,
    store: Arc<dyn PostStore>,
    cors: CorsLayer,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = posts_router(store.clone()).layer(cors);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    store.close().await;
    tracing::info!("posts API stopped");
    Ok(())
}

pub fn posts_router(store: Arc<dyn PostStore>) -> Router {
    Router::new()
        .route("/", get(handle_root))
        .route("/posts", get(handle_posts))
        .route("/health", get(handle_health))
        .with_state(PostsState { store })
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}

// ============ Responses ============

#[derive(Serialize)]
pub(crate) struct MessageResponse {
    pub message: String,
}

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub(crate) async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Error body for `/posts`.
#[derive(Debug, Serialize)]
struct PostsError {
    error: String,
    code: &'static str,
}

impl From<&StoreError> for PostsError {
    fn from(err: &StoreError) -> Self {
        let error = match err {
            StoreError::TableMissing { table } => format!(
                "'{}' table not found. Run `feed posts load` first to create it.",
                table
            ),
            StoreError::Connection(cause) => format!("database connection failed: {}", cause),
            other => format!("unexpected error: {}", other),
        };
        PostsError {
            error,
            code: err.code(),
        }
    }
}

// ============ Handlers ============

async fn handle_root() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "Posts read API. Query /posts for the loaded rows.".to_string(),
    })
}

/// Handler for `GET /posts`.
///
/// Errors are reported in the body with HTTP 200; see the module docs.
async fn handle_posts(State(state): State<PostsState>) -> Response {
    match state.store.list_posts().await {
        Ok(posts) => {
            tracing::debug!(rows = posts.len(), "GET /posts");
            Json(posts).into_response()
        }
        Err(err) => {
            tracing::warn!(code = err.code(), "GET /posts failed: {}", err);
            Json(PostsError::from(&err)).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_missing_message_points_at_loader() {
        let body = PostsError::from(&StoreError::TableMissing {
            table: "posts".to_string(),
        });
        assert_eq!(body.code, "table_missing");
        assert!(body.error.contains("'posts' table not found"));
        assert!(body.error.contains("feed posts load"));
    }

    #[test]
    fn connection_message_carries_cause() {
        let body = PostsError::from(&StoreError::Connection("refused".to_string()));
        assert_eq!(body.code, "connection_failed");
        assert_eq!(body.error, "database connection failed: refused");
    }

    #[test]
    fn other_errors_are_generic() {
        let body = PostsError::from(&StoreError::Query("syntax".to_string()));
        assert_eq!(body.code, "query_failed");
        assert!(body.error.starts_with("unexpected error:"));
    }
}
