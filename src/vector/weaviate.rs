//! Weaviate backend over REST (schema, batch import) and GraphQL (search).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};

use super::schema::CollectionSchema;
use super::{ArticleStore, NearTextQuery, VectorError};
use crate::models::{Article, ScoredArticle};

pub struct WeaviateStore {
    client: Client,
    base_url: String,
}

impl WeaviateStore {
    pub fn new(base_url: &str, timeout_secs: u64) -> anyhow::Result<Self> {
        anyhow::ensure!(
            base_url.starts_with("http://") || base_url.starts_with("https://"),
            "Weaviate URL must be an http(s) URL: '{}'",
            base_url
        );
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build Weaviate HTTP client: {}", e))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn collection_exists(&self, name: &str) -> Result<bool, VectorError> {
        let resp = self
            .client
            .get(self.url(&format!("/v1/schema/{}", name)))
            .send()
            .await
            .map_err(transport_error)?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(false),
            s if s.is_success() => Ok(true),
            _ => Err(status_error("GET /v1/schema", resp).await),
        }
    }
}

#[async_trait]
impl ArticleStore for WeaviateStore {
    async fn ready(&self) -> Result<(), VectorError> {
        let resp = self
            .client
            .get(self.url("/v1/.well-known/ready"))
            .send()
            .await
            .map_err(transport_error)?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(VectorError::Connection(format!(
                "Weaviate not ready: HTTP {}",
                resp.status()
            )))
        }
    }

    async fn recreate_collection(&self, schema: &CollectionSchema) -> Result<bool, VectorError> {
        let existed = self.collection_exists(&schema.name).await?;
        if existed {
            let resp = self
                .client
                .delete(self.url(&format!("/v1/schema/{}", schema.name)))
                .send()
                .await
                .map_err(transport_error)?;
            if !resp.status().is_success() {
                return Err(status_error("DELETE /v1/schema", resp).await);
            }
            tracing::info!(collection = %schema.name, "deleted existing collection");
        }

        let resp = self
            .client
            .post(self.url("/v1/schema"))
            .json(&schema.to_class_json())
            .send()
            .await
            .map_err(transport_error)?;
        if !resp.status().is_success() {
            return Err(status_error("POST /v1/schema", resp).await);
        }
        tracing::info!(collection = %schema.name, "created collection");
        Ok(existed)
    }

    async fn insert_batch(&self, collection: &str, articles: &[Article]) -> Result<(), VectorError> {
        if articles.is_empty() {
            return Ok(());
        }
        let resp = self
            .client
            .post(self.url("/v1/batch/objects"))
            .json(&batch_body(collection, articles))
            .send()
            .await
            .map_err(transport_error)?;
        if !resp.status().is_success() {
            return Err(status_error("POST /v1/batch/objects", resp).await);
        }
        let body: Value = resp.json().await.map_err(transport_error)?;
        parse_batch_response(&body)?;
        tracing::debug!(collection, objects = articles.len(), "batch inserted");
        Ok(())
    }

    async fn near_text(
        &self,
        collection: &str,
        query: &NearTextQuery,
    ) -> Result<Vec<ScoredArticle>, VectorError> {
        let resp = self
            .client
            .post(self.url("/v1/graphql"))
            .json(&json!({ "query": near_text_graphql(collection, query) }))
            .send()
            .await
            .map_err(transport_error)?;
        if !resp.status().is_success() {
            return Err(status_error("POST /v1/graphql", resp).await);
        }
        let body: Value = resp.json().await.map_err(transport_error)?;
        parse_near_text_response(collection, &body)
    }
}

fn transport_error(err: reqwest::Error) -> VectorError {
    if err.is_connect() || err.is_timeout() {
        VectorError::Connection(err.to_string())
    } else {
        VectorError::Query(err.to_string())
    }
}

async fn status_error(what: &str, resp: Response) -> VectorError {
    let status = resp.status();
    let body = resp
        .text()
        .await
        .unwrap_or_else(|_| "<body unavailable>".to_string());
    VectorError::Query(format!("{} returned {}: {}", what, status, body))
}

fn batch_body(collection: &str, articles: &[Article]) -> Value {
    let objects: Vec<Value> = articles
        .iter()
        .map(|a| {
            json!({
                "class": collection,
                "properties": {
                    "title": a.title,
                    "content": a.content,
                    "category": a.category,
                },
            })
        })
        .collect();
    json!({ "objects": objects })
}

#[derive(Debug, Deserialize)]
struct BatchObjectResult {
    #[serde(default)]
    result: Option<BatchResultErrors>,
}

#[derive(Debug, Deserialize)]
struct BatchResultErrors {
    #[serde(default)]
    errors: Option<ErrorList>,
}

#[derive(Debug, Deserialize)]
struct ErrorList {
    #[serde(default)]
    error: Vec<ErrorMessage>,
}

#[derive(Debug, Deserialize)]
struct ErrorMessage {
    message: String,
}

/// The batch endpoint answers 200 even when objects fail; failures are
/// reported per object under `result.errors.error[]`.
fn parse_batch_response(body: &Value) -> Result<(), VectorError> {
    let results: Vec<BatchObjectResult> = serde_json::from_value(body.clone())
        .map_err(|e| VectorError::Query(format!("unexpected batch response: {}", e)))?;

    let mut failed = 0;
    let mut first_message = None;
    for errors in results
        .iter()
        .filter_map(|r| r.result.as_ref()?.errors.as_ref())
        .filter(|e| !e.error.is_empty())
    {
        failed += 1;
        if first_message.is_none() {
            first_message = Some(errors.error[0].message.clone());
        }
    }

    match first_message {
        Some(message) => Err(VectorError::Batch { failed, message }),
        None => Ok(()),
    }
}

/// GraphQL string literal. JSON string escaping is a valid subset.
fn graphql_string(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

pub fn near_text_graphql(collection: &str, query: &NearTextQuery) -> String {
    let mut args = format!(
        "nearText: {{concepts: [{}]}}, limit: {}",
        graphql_string(&query.text),
        query.limit
    );
    if let Some(category) = &query.category {
        args.push_str(&format!(
            ", where: {{path: [\"category\"], operator: Equal, valueText: {}}}",
            graphql_string(category)
        ));
    }
    format!(
        "{{ Get {{ {}({}) {{ title content category _additional {{ distance }} }} }} }}",
        collection, args
    )
}

pub fn parse_near_text_response(
    collection: &str,
    body: &Value,
) -> Result<Vec<ScoredArticle>, VectorError> {
    if let Some(errors) = body.get("errors").and_then(Value::as_array) {
        if !errors.is_empty() {
            let message = errors
                .iter()
                .filter_map(|e| e.get("message").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("; ");
            if message.contains(&format!("Cannot query field \"{}\"", collection)) {
                return Err(VectorError::CollectionMissing(collection.to_string()));
            }
            return Err(VectorError::Query(message));
        }
    }

    let items = body
        .get("data")
        .and_then(|d| d.get("Get"))
        .and_then(|g| g.get(collection))
        .and_then(Value::as_array)
        .ok_or_else(|| {
            VectorError::Query(format!("response has no data.Get.{} array", collection))
        })?;

    Ok(items
        .iter()
        .map(|item| ScoredArticle {
            article: Article {
                title: text_prop(item, "title"),
                content: text_prop(item, "content"),
                category: text_prop(item, "category"),
            },
            distance: item
                .get("_additional")
                .and_then(|a| a.get("distance"))
                .and_then(Value::as_f64),
        })
        .collect())
}

fn text_prop(item: &Value, name: &str) -> String {
    item.get(name)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
