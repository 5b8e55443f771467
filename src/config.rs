//! TOML configuration with environment overrides.
//!
//! Every field has a default, so a missing config file is a valid setup:
//! the defaults reproduce the docker-compose layout the pipelines were
//! written for (PostgreSQL reachable as `db`, Weaviate and Ollama on
//! localhost).
//!
//! Precedence, lowest to highest: built-in defaults, the TOML file, then
//! environment variables (`DB_USER`, `DB_PASSWORD`, `DB_HOST`, `DB_NAME`,
//! `DB_PORT`, `WEAVIATE_URL`, `OLLAMA_URL`, `FEED_BIND`).

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub posts: PostsConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub weaviate: WeaviateConfig,
    #[serde(default)]
    pub ollama: OllamaConfig,
}

/// PostgreSQL connection settings shared by `posts load` and `posts serve`.
#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_user")]
    pub user: String,
    #[serde(default = "default_db_password")]
    pub password: String,
    #[serde(default = "default_db_host")]
    pub host: String,
    #[serde(default = "default_db_name")]
    pub name: String,
    #[serde(default = "default_db_port")]
    pub port: u16,
    /// Bound on one connection attempt, and on pool acquisition in
    /// `posts serve`.
    #[serde(default = "default_db_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            user: default_db_user(),
            password: default_db_password(),
            host: default_db_host(),
            name: default_db_name(),
            port: default_db_port(),
            connect_timeout_secs: default_db_connect_timeout_secs(),
        }
    }
}

fn default_db_user() -> String {
    "user".to_string()
}
fn default_db_password() -> String {
    "password".to_string()
}
fn default_db_host() -> String {
    "db".to_string()
}
fn default_db_name() -> String {
    "mydatabase".to_string()
}
fn default_db_port() -> u16 {
    5432
}
fn default_db_connect_timeout_secs() -> u64 {
    5
}

impl DbConfig {
    /// Connection URL with the password masked, for log lines.
    pub fn display_url(&self) -> String {
        format!(
            "postgresql://{}:***@{}:{}/{}",
            self.user, self.host, self.port, self.name
        )
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PostsConfig {
    #[serde(default = "default_source_url")]
    pub source_url: String,
    #[serde(default = "default_table")]
    pub table: String,
    /// Connection attempts before `posts load` gives up on the database.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Fixed wait between connection attempts.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    /// Upstream fetch timeout.
    #[serde(default = "default_timeout_secs", alias = "timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_preview_rows")]
    pub preview_rows: usize,
}

impl Default for PostsConfig {
    fn default() -> Self {
        Self {
            source_url: default_source_url(),
            table: default_table(),
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay_secs(),
            fetch_timeout_secs: default_timeout_secs(),
            preview_rows: default_preview_rows(),
        }
    }
}

fn default_source_url() -> String {
    "https://jsonplaceholder.typicode.com/posts".to_string()
}
fn default_table() -> String {
    "posts".to_string()
}
fn default_max_retries() -> u32 {
    10
}
fn default_retry_delay_secs() -> u64 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_preview_rows() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Origins allowed by the CORS layer. Credentials are allowed, so this
    /// must be an explicit list rather than a wildcard.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            allowed_origins: default_allowed_origins(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}
fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:8080".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct WeaviateConfig {
    #[serde(default = "default_weaviate_url")]
    pub url: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_vectorizer")]
    pub vectorizer: String,
    /// Objects per `POST /v1/batch/objects` request.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Result count for `/search` and `/filter` when the request omits `limit`.
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for WeaviateConfig {
    fn default() -> Self {
        Self {
            url: default_weaviate_url(),
            collection: default_collection(),
            vectorizer: default_vectorizer(),
            batch_size: default_batch_size(),
            search_limit: default_search_limit(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_weaviate_url() -> String {
    "http://localhost:8080".to_string()
}
fn default_collection() -> String {
    "Article".to_string()
}
fn default_vectorizer() -> String {
    "text2vec-transformers".to_string()
}
fn default_batch_size() -> usize {
    100
}
fn default_search_limit() -> usize {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_url")]
    pub url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Ollama address as seen from the Weaviate container. Written into the
    /// collection's `generative-ollama` module config.
    #[serde(default = "default_ollama_url")]
    pub generative_endpoint: String,
    /// Wait before the first pull request, giving the Ollama container time
    /// to come up.
    #[serde(default = "default_pull_delay_secs")]
    pub pull_delay_secs: u64,
    #[serde(default = "default_generate_timeout_secs")]
    pub timeout_secs: u64,
    /// Prompt sent to the model by `/ask`. `{question}` and `{content}` are
    /// substituted.
    #[serde(default = "default_prompt_template")]
    pub prompt_template: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            url: default_ollama_url(),
            model: default_model(),
            generative_endpoint: default_ollama_url(),
            pull_delay_secs: default_pull_delay_secs(),
            timeout_secs: default_generate_timeout_secs(),
            prompt_template: default_prompt_template(),
        }
    }
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_model() -> String {
    "llama3:8b".to_string()
}
fn default_pull_delay_secs() -> u64 {
    5
}
fn default_generate_timeout_secs() -> u64 {
    120
}
fn default_prompt_template() -> String {
    "Answer the question using the reference documents below.\n\
     Question: {question}\n\
     ---\n\
     Reference documents:\n\
     {content}\n"
        .to_string()
}

impl Config {
    /// Apply environment overrides. `lookup` is `std::env::var` in
    /// production and a map in tests.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("DB_USER") {
            self.db.user = v;
        }
        if let Some(v) = lookup("DB_PASSWORD") {
            self.db.password = v;
        }
        if let Some(v) = lookup("DB_HOST") {
            self.db.host = v;
        }
        if let Some(v) = lookup("DB_NAME") {
            self.db.name = v;
        }
        if let Some(v) = lookup("DB_PORT") {
            self.db.port = v
                .trim()
                .parse()
                .with_context(|| format!("DB_PORT is not a valid port: '{}'", v))?;
        }
        if let Some(v) = lookup("WEAVIATE_URL") {
            self.weaviate.url = v;
        }
        if let Some(v) = lookup("OLLAMA_URL") {
            self.ollama.url = v;
        }
        if let Some(v) = lookup("FEED_BIND") {
            self.server.bind = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.posts.max_retries == 0 {
            bail!("posts.max_retries must be >= 1");
        }
        if self.db.connect_timeout_secs == 0 {
            bail!("db.connect_timeout_secs must be >= 1");
        }
        if self.posts.table.trim().is_empty() {
            bail!("posts.table must not be empty");
        }
        if self.weaviate.batch_size == 0 {
            bail!("weaviate.batch_size must be >= 1");
        }
        if self.weaviate.search_limit == 0 {
            bail!("weaviate.search_limit must be >= 1");
        }
        if !is_class_name(&self.weaviate.collection) {
            bail!(
                "weaviate.collection must start with an uppercase letter and contain only letters, digits and '_': '{}'",
                self.weaviate.collection
            );
        }
        for origin in &self.server.allowed_origins {
            if origin == "*" {
                bail!("server.allowed_origins cannot contain '*' when credentials are allowed");
            }
        }
        Ok(())
    }
}

/// Weaviate class names are GraphQL type names and are interpolated into
/// queries as-is.
fn is_class_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_uppercase())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Parse a config document without touching the environment.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    Ok(config)
}

/// Load configuration for a CLI invocation.
///
/// `None` means "no config file": defaults plus environment. An explicit
/// path that cannot be read is an error.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            parse_config(&content)?
        }
        None => Config::default(),
    };

    config.apply_env(|key| std::env::var(key).ok())?;
    config.validate()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_compose_layout() {
        let cfg = Config::default();
        assert_eq!(cfg.db.user, "user");
        assert_eq!(cfg.db.password, "password");
        assert_eq!(cfg.db.host, "db");
        assert_eq!(cfg.db.name, "mydatabase");
        assert_eq!(cfg.db.port, 5432);
        assert_eq!(cfg.posts.table, "posts");
        assert_eq!(cfg.posts.max_retries, 10);
        assert_eq!(cfg.posts.retry_delay_secs, 5);
        assert_eq!(cfg.posts.fetch_timeout_secs, 30);
        assert_eq!(cfg.db.connect_timeout_secs, 5);
        assert_eq!(cfg.weaviate.collection, "Article");
        assert_eq!(cfg.weaviate.search_limit, 2);
        assert_eq!(cfg.ollama.model, "llama3:8b");
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg = parse_config(
            r#"
[db]
host = "localhost"

[weaviate]
batch_size = 10
"#,
        )
        .unwrap();
        assert_eq!(cfg.db.host, "localhost");
        assert_eq!(cfg.db.user, "user");
        assert_eq!(cfg.weaviate.batch_size, 10);
        assert_eq!(cfg.weaviate.url, "http://localhost:8080");
        assert_eq!(cfg.server.bind, "0.0.0.0:8000");
    }

    #[test]
    fn env_overrides_file() {
        let mut cfg = parse_config("[db]\nhost = \"from-file\"\n").unwrap();
        let env: HashMap<&str, &str> = [("DB_HOST", "from-env"), ("DB_PORT", "6543")]
            .into_iter()
            .collect();
        cfg.apply_env(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(cfg.db.host, "from-env");
        assert_eq!(cfg.db.port, 6543);
        assert_eq!(cfg.db.name, "mydatabase");
    }

    #[test]
    fn bad_port_is_rejected() {
        let mut cfg = Config::default();
        let err = cfg
            .apply_env(|k| (k == "DB_PORT").then(|| "not-a-port".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("DB_PORT"));
    }

    #[test]
    fn fetch_and_connect_timeouts_are_independent() {
        let cfg = parse_config(
            "[posts]\nfetch_timeout_secs = 60\n\n[db]\nconnect_timeout_secs = 2\n",
        )
        .unwrap();
        assert_eq!(cfg.posts.fetch_timeout_secs, 60);
        assert_eq!(cfg.db.connect_timeout_secs, 2);

        let legacy = parse_config("[posts]\ntimeout_secs = 9\n").unwrap();
        assert_eq!(legacy.posts.fetch_timeout_secs, 9);
        assert_eq!(legacy.db.connect_timeout_secs, 5);
    }

    #[test]
    fn validation_rejects_zero_retries() {
        let mut cfg = Config::default();
        cfg.posts.max_retries = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validation_rejects_wildcard_origin() {
        let mut cfg = Config::default();
        cfg.server.allowed_origins = vec!["*".to_string()];
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validation_rejects_non_class_collection_names() {
        for bad in ["", "article", "Art icle", "Article{", "Art-icle"] {
            let mut cfg = Config::default();
            cfg.weaviate.collection = bad.to_string();
            assert!(cfg.validate().is_err(), "{:?} should be rejected", bad);
        }
        let mut cfg = Config::default();
        cfg.weaviate.collection = "News_2024".to_string();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn display_url_masks_password() {
        let cfg = Config::default();
        let url = cfg.db.display_url();
        assert!(!url.contains("password"));
        assert_eq!(url, "postgresql://user:***@db:5432/mydatabase");
    }
}
