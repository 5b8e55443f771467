//! Retrieval-augmented answers.
//!
//! The question is run as a near-text search, the top hits' `content` is
//! joined into the prompt template, and the result goes to the
//! [`Generator`]. Only the generated text is returned.

use crate::models::ScoredArticle;
use crate::vector::{ArticleStore, Generator, NearTextQuery, VectorError};

/// Articles retrieved as context for one answer.
pub const CONTEXT_LIMIT: usize = 2;

/// Fill `{question}` and `{content}` in `template`. Substitution is a single
/// pass, so placeholder text inside the question or the articles is left
/// alone.
pub fn compose_prompt(template: &str, question: &str, hits: &[ScoredArticle]) -> String {
    let content = hits
        .iter()
        .map(|h| h.article.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    let mut out = String::with_capacity(template.len() + question.len() + content.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        if let Some(after) = tail.strip_prefix("{question}") {
            out.push_str(question);
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{content}") {
            out.push_str(&content);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}

pub async fn answer(
    store: &dyn ArticleStore,
    generator: &dyn Generator,
    collection: &str,
    template: &str,
    question: &str,
) -> Result<String, VectorError> {
    let hits = store
        .near_text(collection, &NearTextQuery::new(question, CONTEXT_LIMIT))
        .await?;
    tracing::debug!(hits = hits.len(), "retrieved context for question");
    let prompt = compose_prompt(template, question, &hits);
    generator.generate(&prompt).await
}
