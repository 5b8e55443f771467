//! Storage abstraction for the posts table.
//!
//! The [`PostStore`] trait is the seam between the posts pipeline (loader and
//! read service) and the database. [`postgres::PgPostStore`] is the real
//! backend; [`memory::InMemoryPostStore`] backs the tests.
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`replace_posts`](PostStore::replace_posts) | Drop and recreate the table with new contents |
//! | [`list_posts`](PostStore::list_posts) | Run the fixed read query |
//! | [`close`](PostStore::close) | Release the underlying handle |

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::models::{Post, ProjectedPost};

/// Failure kinds surfaced by a [`PostStore`].
///
/// The read service maps each variant to its own response payload, so new
/// failure modes belong here rather than in free-form strings.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("table '{table}' does not exist")]
    TableMissing { table: String },
    #[error("database connection failed: {0}")]
    Connection(String),
    #[error("record {index}: field '{field}' {reason}")]
    InvalidRecord {
        index: usize,
        field: &'static str,
        reason: String,
    },
    #[error("query failed: {0}")]
    Query(String),
}

impl StoreError {
    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::TableMissing { .. } => "table_missing",
            StoreError::Connection(_) => "connection_failed",
            StoreError::InvalidRecord { .. } => "invalid_record",
            StoreError::Query(_) => "query_failed",
        }
    }
}

#[async_trait]
pub trait PostStore: Send + Sync {
    /// Name of the destination table.
    fn table(&self) -> &str;

    /// Replace the table wholesale with `records`.
    ///
    /// Every record is typed before anything is written; the first record
    /// that fails yields [`StoreError::InvalidRecord`]. Returns the number
    /// of rows written.
    async fn replace_posts(&self, records: &[ProjectedPost]) -> Result<u64, StoreError>;

    /// All rows, in the order the store returns them.
    async fn list_posts(&self) -> Result<Vec<Post>, StoreError>;

    async fn close(&self) {}
}

/// Type every projected record, failing on the first bad one.
pub fn type_posts(records: &[ProjectedPost]) -> Result<Vec<Post>, StoreError> {
    records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            record.to_post().map_err(|e| StoreError::InvalidRecord {
                index,
                field: e.field,
                reason: e.reason,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn type_posts_reports_first_bad_index() {
        let records = vec![
            ProjectedPost {
                user_id: json!(1),
                post_id: json!(1),
                title: json!("ok"),
            },
            ProjectedPost {
                user_id: json!(1),
                post_id: json!(2),
                title: serde_json::Value::Null,
            },
        ];
        let err = type_posts(&records).unwrap_err();
        assert_eq!(
            err,
            StoreError::InvalidRecord {
                index: 1,
                field: "title",
                reason: "missing".to_string()
            }
        );
        assert_eq!(err.code(), "invalid_record");
    }

    #[test]
    fn codes_are_distinct() {
        let codes = [
            StoreError::TableMissing {
                table: "posts".into(),
            }
            .code(),
            StoreError::Connection("x".into()).code(),
            StoreError::Query("x".into()).code(),
        ];
        assert_eq!(codes, ["table_missing", "connection_failed", "query_failed"]);
    }
}
