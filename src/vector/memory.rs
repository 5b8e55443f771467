//! In-memory [`ArticleStore`] for tests and local runs without Weaviate.
//!
//! Vectors are hashed bag-of-words counts over the schema's vectorized
//! properties, so filter-only properties never influence ranking. Search is
//! brute-force cosine distance.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::schema::CollectionSchema;
use super::{ArticleStore, NearTextQuery, VectorError};
use crate::models::{Article, ScoredArticle};

const DIMS: usize = 256;

struct Collection {
    schema: CollectionSchema,
    objects: Vec<(Article, Vec<f32>)>,
}

#[derive(Default)]
pub struct InMemoryArticleStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryArticleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects in `collection`, if it exists.
    pub fn count(&self, collection: &str) -> Option<usize> {
        let guard = self.collections.read().ok()?;
        guard.get(collection).map(|c| c.objects.len())
    }
}

fn poisoned() -> VectorError {
    VectorError::Connection("in-memory store lock poisoned".to_string())
}

#[async_trait]
impl ArticleStore for InMemoryArticleStore {
    async fn ready(&self) -> Result<(), VectorError> {
        Ok(())
    }

    async fn recreate_collection(&self, schema: &CollectionSchema) -> Result<bool, VectorError> {
        let mut guard = self.collections.write().map_err(|_| poisoned())?;
        let existed = guard
            .insert(
                schema.name.clone(),
                Collection {
                    schema: schema.clone(),
                    objects: Vec::new(),
                },
            )
            .is_some();
        Ok(existed)
    }

    async fn insert_batch(&self, collection: &str, articles: &[Article]) -> Result<(), VectorError> {
        let mut guard = self.collections.write().map_err(|_| poisoned())?;
        let target = guard
            .get_mut(collection)
            .ok_or_else(|| VectorError::CollectionMissing(collection.to_string()))?;
        for article in articles {
            let vector = embed(&vectorized_text(&target.schema, article));
            target.objects.push((article.clone(), vector));
        }
        Ok(())
    }

    async fn near_text(
        &self,
        collection: &str,
        query: &NearTextQuery,
    ) -> Result<Vec<ScoredArticle>, VectorError> {
        let guard = self.collections.read().map_err(|_| poisoned())?;
        let target = guard
            .get(collection)
            .ok_or_else(|| VectorError::CollectionMissing(collection.to_string()))?;

        let query_vec = embed(&query.text);
        let mut hits: Vec<ScoredArticle> = target
            .objects
            .iter()
            .filter(|(article, _)| match &query.category {
                Some(category) => &article.category == category,
                None => true,
            })
            .map(|(article, vector)| ScoredArticle {
                article: article.clone(),
                distance: Some(f64::from(1.0 - cosine_similarity(&query_vec, vector))),
            })
            .collect();

        // Stable sort: ties keep insertion order.
        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(query.limit);
        Ok(hits)
    }
}

fn vectorized_text(schema: &CollectionSchema, article: &Article) -> String {
    schema
        .vectorized_properties()
        .filter_map(|p| match p.name.as_str() {
            "title" => Some(article.title.as_str()),
            "content" => Some(article.content.as_str()),
            "category" => Some(article.category.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Hashed term-count vector.
fn embed(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; DIMS];
    for token in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        let token = token.to_lowercase();
        vector[(fnv1a(token.as_bytes()) % DIMS as u64) as usize] += 1.0;
    }
    vector
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// Cosine similarity in `[-1.0, 1.0]`; `0.0` when either vector is zero or
/// the lengths differ.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }
    dot / denom
}
