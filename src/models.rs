//! Core data models for both pipelines.
//!
//! Posts flow from the upstream JSON API through [`ProjectedPost`] into the
//! `posts` table as [`Post`] rows. Articles flow from a JSON file into the
//! vector store and come back out as [`ScoredArticle`] search hits.

use serde::{Deserialize, Serialize};

/// A row of the posts table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    #[serde(rename = "userId")]
    pub user_id: i64,
    pub post_id: i64,
    pub title: String,
}

/// A fetched record after field selection and renaming, before typing.
///
/// Values are carried through untouched; a missing source field becomes
/// `null`. Type checks happen when the record is written (see
/// [`ProjectedPost::to_post`]).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectedPost {
    #[serde(rename = "userId")]
    pub user_id: serde_json::Value,
    pub post_id: serde_json::Value,
    pub title: serde_json::Value,
}

/// Why a projected record could not be typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub reason: String,
}

impl ProjectedPost {
    pub fn to_post(&self) -> Result<Post, FieldError> {
        Ok(Post {
            user_id: int_field("userId", &self.user_id)?,
            post_id: int_field("post_id", &self.post_id)?,
            title: text_field("title", &self.title)?,
        })
    }
}

fn int_field(field: &'static str, value: &serde_json::Value) -> Result<i64, FieldError> {
    match value {
        serde_json::Value::Null => Err(FieldError {
            field,
            reason: "missing".to_string(),
        }),
        v => v.as_i64().ok_or_else(|| FieldError {
            field,
            reason: format!("expected an integer, got {}", v),
        }),
    }
}

fn text_field(field: &'static str, value: &serde_json::Value) -> Result<String, FieldError> {
    match value {
        serde_json::Value::Null => Err(FieldError {
            field,
            reason: "missing".to_string(),
        }),
        serde_json::Value::String(s) => Ok(s.clone()),
        v => Err(FieldError {
            field,
            reason: format!("expected a string, got {}", v),
        }),
    }
}

/// A document in the article collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub content: String,
    pub category: String,
}

/// An article returned by a near-text query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredArticle {
    pub article: Article,
    /// Vector distance to the query; lower is more similar.
    pub distance: Option<f64>,
}
