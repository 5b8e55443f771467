//! Posts load orchestration.
//!
//! fetch → project → wait for the database → replace the table. Every
//! failure is fatal and propagates to `main`, which exits non-zero. Only the
//! database wait is retried.

use anyhow::{Context, Result};

use crate::config::Config;
use crate::db;
use crate::fetch;
use crate::models::ProjectedPost;
use crate::retry::TokioSleeper;
use crate::store::postgres::PgPostStore;
use crate::store::PostStore;
use crate::transform;

/// Counts reported at the end of a load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSummary {
    pub fetched: usize,
    pub written: u64,
}

pub async fn run_posts_load(config: &Config, dry_run: bool) -> Result<()> {
    println!("fetching posts from {}", config.posts.source_url);
    let client = fetch::http_client(config.posts.fetch_timeout_secs)?;
    let records = fetch::fetch_records(&client, &config.posts.source_url).await?;

    let projected = transform::project_posts(&records);
    println!("  projected records: {}", projected.len());
    print!(
        "{}",
        transform::preview(&projected, config.posts.preview_rows)
    );

    if dry_run {
        println!("posts load (dry-run): skipping database write");
        return Ok(());
    }

    let pool = db::wait_for_database(config, &TokioSleeper).await?;
    let store = PgPostStore::new(pool, config.posts.table.clone());

    let result = load_posts(&store, &projected).await;
    store.close().await;
    let summary = result?;

    println!("posts load");
    println!("  fetched: {} records", summary.fetched);
    println!("  rows written to '{}': {}", store.table(), summary.written);
    println!("ok");
    Ok(())
}

/// Replace the destination table with `projected`.
pub async fn load_posts(store: &dyn PostStore, projected: &[ProjectedPost]) -> Result<LoadSummary> {
    let written = store
        .replace_posts(projected)
        .await
        .with_context(|| format!("failed to write table '{}'", store.table()))?;

    Ok(LoadSummary {
        fetched: projected.len(),
        written,
    })
}
