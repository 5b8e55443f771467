//! Ollama client: model provisioning and text generation.
//!
//! `POST /api/pull` answers with newline-delimited JSON status objects. The
//! body is consumed as a byte stream and split into lines by
//! [`NdjsonDecoder`]; lines can straddle chunk boundaries.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;

use crate::progress::{PullProgressEvent, PullProgressReporter};
use crate::vector::{Generator, VectorError};

pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl OllamaClient {
    /// `timeout_secs` bounds `show` and `generate` requests. Pulls are only
    /// bounded by the connect timeout since a model download can take many
    /// minutes.
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Result<Self> {
        anyhow::ensure!(
            base_url.starts_with("http://") || base_url.starts_with("https://"),
            "Ollama URL must be an http(s) URL: '{}'",
            base_url
        );
        anyhow::ensure!(!model.trim().is_empty(), "missing Ollama model name");
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("failed to build Ollama HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Whether the model is already present locally.
    pub async fn has_model(&self) -> Result<bool> {
        let resp = self
            .client
            .post(self.url("/api/show"))
            .timeout(self.timeout)
            .json(&json!({ "model": self.model }))
            .send()
            .await
            .with_context(|| format!("failed to reach Ollama at {}", self.base_url))?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(false),
            s if s.is_success() => Ok(true),
            s => {
                let body = resp.text().await.unwrap_or_default();
                bail!("Ollama /api/show returned {}: {}", s, body)
            }
        }
    }

    /// Pull the model, forwarding each status line to `reporter`.
    pub async fn pull_model(&self, reporter: &dyn PullProgressReporter) -> Result<()> {
        let resp = self
            .client
            .post(self.url("/api/pull"))
            .json(&json!({ "model": self.model, "stream": true }))
            .send()
            .await
            .with_context(|| format!("failed to reach Ollama at {}", self.base_url))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("Ollama /api/pull returned {}: {}", status, body);
        }

        let mut stream = resp.bytes_stream();
        let mut decoder = NdjsonDecoder::default();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("model pull stream interrupted")?;
            for line in decoder.push(&chunk) {
                reporter.report(&parse_pull_line(&line)?);
            }
        }
        if let Some(line) = decoder.finish() {
            reporter.report(&parse_pull_line(&line)?);
        }

        reporter.report(&PullProgressEvent::Done {
            model: self.model.clone(),
        });
        tracing::info!(model = %self.model, "model pulled");
        Ok(())
    }

    /// Pull the model unless it is already present. Returns whether a pull
    /// happened.
    pub async fn ensure_model(&self, reporter: &dyn PullProgressReporter) -> Result<bool> {
        if self.has_model().await? {
            tracing::info!(model = %self.model, "model already present");
            reporter.report(&PullProgressEvent::Done {
                model: self.model.clone(),
            });
            return Ok(false);
        }
        self.pull_model(reporter).await?;
        Ok(true)
    }
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[async_trait]
impl Generator for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String, VectorError> {
        let resp = self
            .client
            .post(self.url("/api/generate"))
            .timeout(self.timeout)
            .json(&json!({ "model": self.model, "prompt": prompt, "stream": false }))
            .send()
            .await
            .map_err(|e| VectorError::Generation(format!("Ollama unreachable: {}", e)))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(VectorError::Generation(format!(
                "Ollama /api/generate returned {}: {}",
                status, body
            )));
        }
        let body: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| VectorError::Generation(format!("bad generate response: {}", e)))?;
        Ok(body.response)
    }
}

/// One line of the pull stream.
#[derive(Debug, Deserialize)]
struct PullStatus {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    completed: Option<u64>,
    #[serde(default)]
    total: Option<u64>,
    #[serde(default)]
    error: Option<String>,
}

fn parse_pull_line(line: &str) -> Result<PullProgressEvent> {
    let parsed: PullStatus = serde_json::from_str(line)
        .with_context(|| format!("malformed pull status line: {}", line))?;
    if let Some(error) = parsed.error {
        bail!("model pull failed: {}", error);
    }
    let status = parsed.status.unwrap_or_default();
    Ok(match (parsed.completed, parsed.total) {
        (Some(completed), Some(total)) => PullProgressEvent::Transfer {
            status,
            completed,
            total,
        },
        _ => PullProgressEvent::Status { status },
    })
}

/// Splits a chunked byte stream into newline-terminated lines.
#[derive(Default)]
pub struct NdjsonDecoder {
    buf: Vec<u8>,
}

impl NdjsonDecoder {
    /// Feed a chunk; returns every line it completes. Blank lines are
    /// dropped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line).trim().to_string();
            if !text.is_empty() {
                lines.push(text);
            }
        }
        lines
    }

    /// The trailing unterminated line, if any.
    pub fn finish(self) -> Option<String> {
        let text = String::from_utf8_lossy(&self.buf).trim().to_string();
        (!text.is_empty()).then_some(text)
    }
}
