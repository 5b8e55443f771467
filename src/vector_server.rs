//! Articles read API: semantic search, filtered search and RAG answers.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Static greeting |
//! | `GET`  | `/search?q=&limit=` | Near-text search with distances |
//! | `GET`  | `/filter?q=&category=&limit=` | Near-text search within one category |
//! | `GET`  | `/ask?q=` | Generated answer grounded on the top 2 articles |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! Any store or generator failure answers HTTP 500:
//!
//! ```json
//! { "detail": "collection 'Article' does not exist", "code": "collection_missing" }
//! ```

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use crate::config::Config;
use crate::cors::cors_layer;
use crate::models::ScoredArticle;
use crate::ollama::OllamaClient;
use crate::rag;
use crate::server::{handle_health, shutdown_signal, MessageResponse};
use crate::vector::weaviate::WeaviateStore;
use crate::vector::{ArticleStore, Generator, NearTextQuery, VectorError};

/// Upper bound on `limit` for `/search` and `/filter`.
pub const MAX_LIMIT: usize = 100;

/// Handles and settings the articles routes run against.
#[derive(Clone)]
pub struct ArticlesService {
    pub store: Arc<dyn ArticleStore>,
    pub generator: Arc<dyn Generator>,
    pub collection: String,
    pub default_limit: usize,
    pub prompt_template: String,
}

/// Starts the articles read API against Weaviate and Ollama.
pub async fn run_articles_server(config: &Config, bind: Option<String>) -> Result<()> {
    let bind_addr = bind.unwrap_or_else(|| config.server.bind.clone());
    let store = WeaviateStore::new(&config.weaviate.url, config.weaviate.timeout_secs)?;
    let generator = OllamaClient::new(
        &config.ollama.url,
        &config.ollama.model,
        config.ollama.timeout_secs,
    )?;
    let service = ArticlesService {
        store: Arc::new(store),
        generator: Arc::new(generator),
        collection: config.weaviate.collection.clone(),
        default_limit: config.weaviate.search_limit,
        prompt_template: config.ollama.prompt_template.clone(),
    };
    let cors = cors_layer(&config.server.allowed_origins)?;

    let listener = TcpListener::bind(&bind_addr).await?;
    println!("articles API listening on http://{}", bind_addr);
    tracing::info!(
        weaviate = %config.weaviate.url,
        collection = %config.weaviate.collection,
        model = %config.ollama.model,
        "articles API started"
    );

    serve_articles(listener, service, cors, shutdown_signal()).await
}

/// Serves the articles API on `listener` until `shutdown` resolves, then
/// closes the store.
pub async fn serve_articles<F>(
    listener: TcpListener,
    service: ArticlesService,
    cors: CorsLayer,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let store = service.store.clone();
    let app = articles_router(service).layer(cors);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    store.close().await;
    tracing::info!("articles API stopped");
    Ok(())
}

pub fn articles_router(service: ArticlesService) -> Router {
    Router::new()
        .route("/", get(handle_root))
        .route("/search", get(handle_search))
        .route("/filter", get(handle_filter))
        .route("/ask", get(handle_ask))
        .route("/health", get(handle_health))
        .with_state(Arc::new(service))
}

// ============ Requests / Responses ============

#[derive(Deserialize)]
struct SearchParams {
    q: String,
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct FilterParams {
    q: String,
    category: String,
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct AskParams {
    q: String,
}

#[derive(Serialize)]
struct SearchHit {
    title: String,
    content: String,
    distance: Option<f64>,
}

#[derive(Serialize)]
struct SearchResponse {
    query: String,
    results: Vec<SearchHit>,
}

#[derive(Serialize)]
struct FilterHit {
    title: String,
    content: String,
}

#[derive(Serialize)]
struct FilterResponse {
    query: String,
    category_filter: String,
    results: Vec<FilterHit>,
}

#[derive(Serialize)]
struct AskResponse {
    question: String,
    answer: String,
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
    code: &'static str,
}

struct ApiError(VectorError);

impl From<VectorError> for ApiError {
    fn from(err: VectorError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::warn!(code = self.0.code(), "request failed: {}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody {
                detail: self.0.to_string(),
                code: self.0.code(),
            }),
        )
            .into_response()
    }
}

fn clamp_limit(requested: Option<usize>, default: usize) -> usize {
    requested.unwrap_or(default).clamp(1, MAX_LIMIT)
}

// ============ Handlers ============

async fn handle_root() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "Articles read API. Try /search?q=, /filter?q=&category= or /ask?q=.".to_string(),
    })
}

async fn handle_search(
    State(service): State<Arc<ArticlesService>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let query = NearTextQuery::new(
        params.q.clone(),
        clamp_limit(params.limit, service.default_limit),
    );
    let hits = service.store.near_text(&service.collection, &query).await?;
    Ok(Json(SearchResponse {
        query: params.q,
        results: hits
            .into_iter()
            .map(|ScoredArticle { article, distance }| SearchHit {
                title: article.title,
                content: article.content,
                distance,
            })
            .collect(),
    }))
}

async fn handle_filter(
    State(service): State<Arc<ArticlesService>>,
    Query(params): Query<FilterParams>,
) -> Result<Json<FilterResponse>, ApiError> {
    let query = NearTextQuery::new(
        params.q.clone(),
        clamp_limit(params.limit, service.default_limit),
    )
    .with_category(params.category.clone());
    let hits = service.store.near_text(&service.collection, &query).await?;
    Ok(Json(FilterResponse {
        query: params.q,
        category_filter: params.category,
        results: hits
            .into_iter()
            .map(|hit| FilterHit {
                title: hit.article.title,
                content: hit.article.content,
            })
            .collect(),
    }))
}

async fn handle_ask(
    State(service): State<Arc<ArticlesService>>,
    Query(params): Query<AskParams>,
) -> Result<Json<AskResponse>, ApiError> {
    let answer = rag::answer(
        service.store.as_ref(),
        service.generator.as_ref(),
        &service.collection,
        &service.prompt_template,
        &params.q,
    )
    .await?;
    Ok(Json(AskResponse {
        question: params.q,
        answer,
    }))
}
