//! In-memory [`PostStore`] for tests.
//!
//! Mirrors the PostgreSQL contract: the table does not exist until the first
//! [`replace_posts`](PostStore::replace_posts), and each replace discards the
//! previous contents. A store can also be built to fail every call with a
//! fixed error, to exercise the read service's error payloads.

use std::sync::RwLock;

use async_trait::async_trait;

use crate::models::{Post, ProjectedPost};

use super::{type_posts, PostStore, StoreError};

pub struct InMemoryPostStore {
    table: String,
    rows: RwLock<Option<Vec<Post>>>,
    failure: Option<StoreError>,
}

impl InMemoryPostStore {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            rows: RwLock::new(None),
            failure: None,
        }
    }

    /// A store whose every operation returns `error`.
    pub fn failing(table: impl Into<String>, error: StoreError) -> Self {
        Self {
            failure: Some(error),
            ..Self::new(table)
        }
    }
}

#[async_trait]
impl PostStore for InMemoryPostStore {
    fn table(&self) -> &str {
        &self.table
    }

    async fn replace_posts(&self, records: &[ProjectedPost]) -> Result<u64, StoreError> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        let posts = type_posts(records)?;
        let count = posts.len() as u64;
        *self.rows.write().unwrap() = Some(posts);
        Ok(count)
    }

    async fn list_posts(&self) -> Result<Vec<Post>, StoreError> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        self.rows
            .read()
            .unwrap()
            .clone()
            .ok_or_else(|| StoreError::TableMissing {
                table: self.table.clone(),
            })
    }
}
