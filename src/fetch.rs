//! Upstream fetch for the posts pipeline.
//!
//! One GET, no retries: a network error, a non-2xx status, or a body that is
//! not a JSON array all abort the load.

use anyhow::{bail, Context, Result};
use std::time::Duration;

pub fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .context("failed to build HTTP client")
}

/// Fetch the record list at `url`.
pub async fn fetch_records(client: &reqwest::Client, url: &str) -> Result<Vec<serde_json::Value>> {
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("request to {} failed", url))?
        .error_for_status()
        .with_context(|| format!("{} returned an error status", url))?;

    let body: serde_json::Value = response
        .json()
        .await
        .with_context(|| format!("{} did not return valid JSON", url))?;

    match body {
        serde_json::Value::Array(items) => Ok(items),
        other => bail!(
            "expected a JSON array from {}, got {}",
            url,
            json_kind(&other)
        ),
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
