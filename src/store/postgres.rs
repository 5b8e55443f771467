//! PostgreSQL [`PostStore`] backed by a sqlx pool.
//!
//! Replacement runs in a single transaction: drop, create, then multi-row
//! inserts in chunks small enough to stay under the bind-parameter limit.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};

use crate::models::{Post, ProjectedPost};

use super::{type_posts, PostStore, StoreError};

/// Rows per INSERT statement (3 binds per row).
const INSERT_CHUNK: usize = 1000;

pub struct PgPostStore {
    pool: PgPool,
    table: String,
}

impl PgPostStore {
    pub fn new(pool: PgPool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }
}

#[async_trait]
impl PostStore for PgPostStore {
    fn table(&self) -> &str {
        &self.table
    }

    async fn replace_posts(&self, records: &[ProjectedPost]) -> Result<u64, StoreError> {
        let posts = type_posts(records)?;
        let table = quote_ident(&self.table);
        let classify = |e| classify_sqlx_error(&self.table, e);

        let mut tx = self.pool.begin().await.map_err(classify)?;

        sqlx::query(&format!("DROP TABLE IF EXISTS {}", table))
            .execute(&mut *tx)
            .await
            .map_err(classify)?;

        sqlx::query(&format!(
            r#"CREATE TABLE {} ("userId" BIGINT NOT NULL, post_id BIGINT NOT NULL, title TEXT NOT NULL)"#,
            table
        ))
        .execute(&mut *tx)
        .await
        .map_err(classify)?;

        for chunk in posts.chunks(INSERT_CHUNK) {
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
                r#"INSERT INTO {} ("userId", post_id, title) "#,
                table
            ));
            builder.push_values(chunk, |mut row, post| {
                row.push_bind(post.user_id)
                    .push_bind(post.post_id)
                    .push_bind(post.title.clone());
            });
            builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(classify)?;
        }

        tx.commit().await.map_err(classify)?;
        Ok(posts.len() as u64)
    }

    async fn list_posts(&self) -> Result<Vec<Post>, StoreError> {
        let sql = format!(
            r#"SELECT "userId", post_id, title FROM {}"#,
            quote_ident(&self.table)
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| classify_sqlx_error(&self.table, e))?;

        rows.iter()
            .map(|row| {
                Ok(Post {
                    user_id: row.try_get("userId")?,
                    post_id: row.try_get("post_id")?,
                    title: row.try_get("title")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(|e| classify_sqlx_error(&self.table, e))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Quote a possibly schema-qualified identifier (`public.posts`).
pub fn quote_ident(name: &str) -> String {
    name.split('.')
        .map(|part| format!("\"{}\"", part.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(".")
}

/// Whether a SQLSTATE means the server is unreachable or not yet accepting
/// this client: connection exceptions (`08`), shutdown/startup (`57P0x`),
/// auth failures while the role is still being provisioned (`28`), a
/// database that has not been created yet (`3D000`), and too many
/// connections (`53300`).
pub fn is_connection_sqlstate(code: &str) -> bool {
    code.starts_with("08")
        || code.starts_with("57P0")
        || code.starts_with("28")
        || code == "3D000"
        || code == "53300"
}

/// SQLSTATE for `undefined_table`.
const UNDEFINED_TABLE: &str = "42P01";

/// Whether a sqlx error means "could not talk to the database".
pub fn is_connection_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => true,
        sqlx::Error::Database(db) => db
            .code()
            .map(|code| is_connection_sqlstate(&code))
            .unwrap_or(false),
        _ => false,
    }
}

pub fn classify_sqlx_error(table: &str, err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.code().as_deref() == Some(UNDEFINED_TABLE) {
            return StoreError::TableMissing {
                table: table.to_string(),
            };
        }
    }
    if is_connection_error(&err) {
        StoreError::Connection(err.to_string())
    } else {
        StoreError::Query(err.to_string())
    }
}
