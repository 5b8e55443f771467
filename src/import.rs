//! Articles load orchestration.
//!
//! ensure the LLM is present → check Weaviate → recreate the collection →
//! read the JSON file → batch import. The model pull is best effort; every
//! other failure is fatal. A failing batch leaves earlier batches in place.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::models::Article;
use crate::ollama::OllamaClient;
use crate::progress::{ProgressMode, PullProgressReporter};
use crate::retry::{Sleeper, TokioSleeper};
use crate::vector::schema::{article_schema, CollectionSchema};
use crate::vector::weaviate::WeaviateStore;
use crate::vector::ArticleStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    /// An earlier collection of the same name was deleted.
    pub replaced_existing: bool,
    pub inserted: usize,
    pub batches: usize,
}

pub async fn run_articles_load(
    config: &Config,
    data: &Path,
    skip_pull: bool,
    progress: ProgressMode,
) -> Result<()> {
    if skip_pull {
        println!("skipping model pull");
    } else {
        let ollama = OllamaClient::new(
            &config.ollama.url,
            &config.ollama.model,
            config.ollama.timeout_secs,
        )?;
        println!(
            "ensuring Ollama has {} (this can take a few minutes)",
            ollama.model()
        );
        let reporter = progress.reporter();
        provision_model(
            &ollama,
            Duration::from_secs(config.ollama.pull_delay_secs),
            reporter.as_ref(),
            &TokioSleeper,
        )
        .await;
    }

    let store = WeaviateStore::new(&config.weaviate.url, config.weaviate.timeout_secs)?;
    store
        .ready()
        .await
        .with_context(|| format!("Weaviate at {} is not reachable", config.weaviate.url))?;
    println!("connected to Weaviate at {}", config.weaviate.url);

    let articles = match read_articles(data) {
        Ok(articles) => articles,
        Err(e) => {
            store.close().await;
            return Err(e);
        }
    };

    let schema = article_schema(config);
    let result = import_articles(&store, &schema, &articles, config.weaviate.batch_size).await;
    store.close().await;
    let summary = result?;

    println!(
        "articles load: {} objects written to '{}' in {} batch(es)",
        summary.inserted, schema.name, summary.batches
    );
    println!("ok");
    Ok(())
}

/// Wait `delay`, then make sure the model is present. Failures are logged
/// and reported as `false`; the import goes on without the model.
pub async fn provision_model(
    ollama: &OllamaClient,
    delay: Duration,
    reporter: &dyn PullProgressReporter,
    sleeper: &dyn Sleeper,
) -> bool {
    if !delay.is_zero() {
        sleeper.sleep(delay).await;
    }
    match ollama.ensure_model(reporter).await {
        Ok(pulled) => {
            if pulled {
                println!("model {} pulled", ollama.model());
            } else {
                println!("model {} already present", ollama.model());
            }
            true
        }
        Err(e) => {
            tracing::warn!(model = ollama.model(), "model pull failed: {:#}", e);
            println!(
                "model pull failed (is Ollama running?): {:#}; continuing",
                e
            );
            false
        }
    }
}

pub fn read_articles(path: &Path) -> Result<Vec<Article>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let articles: Vec<Article> = serde_json::from_str(&content).with_context(|| {
        format!(
            "{} must be a JSON array of {{title, content, category}} objects",
            path.display()
        )
    })?;
    Ok(articles)
}

/// Recreate the collection from `schema` and insert `articles` in batches.
pub async fn import_articles(
    store: &dyn ArticleStore,
    schema: &CollectionSchema,
    articles: &[Article],
    batch_size: usize,
) -> Result<ImportSummary> {
    let replaced_existing = store
        .recreate_collection(schema)
        .await
        .with_context(|| format!("failed to recreate collection '{}'", schema.name))?;
    if replaced_existing {
        println!("deleted existing '{}' collection", schema.name);
    }
    println!("created '{}' collection", schema.name);

    let mut inserted = 0;
    let mut batches = 0;
    for batch in articles.chunks(batch_size.max(1)) {
        store
            .insert_batch(&schema.name, batch)
            .await
            .with_context(|| {
                format!(
                    "batch {} failed after {} objects were written",
                    batches + 1,
                    inserted
                )
            })?;
        inserted += batch.len();
        batches += 1;
        tracing::debug!(batch = batches, inserted, "batch written");
    }

    Ok(ImportSummary {
        replaced_existing,
        inserted,
        batches,
    })
}
