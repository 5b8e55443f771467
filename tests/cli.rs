use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use axum::{routing::get, Json, Router};
use serde_json::json;
use tempfile::TempDir;

fn feed_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_feed"))
}

fn write_config(dir: &Path, source_url: &str) -> PathBuf {
    let path = dir.join("feed.toml");
    fs::write(
        &path,
        format!(
            r#"[posts]
source_url = "{}"
fetch_timeout_secs = 2
preview_rows = 2
"#,
            source_url
        ),
    )
    .unwrap();
    path
}

async fn run_feed(args: Vec<String>) -> Output {
    run_feed_with_env(args, Vec::new()).await
}

async fn run_feed_with_env(args: Vec<String>, env: Vec<(&'static str, String)>) -> Output {
    tokio::task::spawn_blocking(move || {
        Command::new(feed_binary())
            .args(&args)
            .env_remove("DB_HOST")
            .env_remove("DB_PORT")
            .env_remove("WEAVIATE_URL")
            .env_remove("OLLAMA_URL")
            .env("RUST_LOG", "warn")
            .envs(env)
            .output()
            .expect("failed to run feed binary")
    })
    .await
    .unwrap()
}

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_posts_load_dry_run_previews_without_database() {
    let app = Router::new().route(
        "/posts",
        get(|| async {
            Json(json!([
                {"userId": 1, "id": 1, "title": "first title", "body": "b1"},
                {"userId": 1, "id": 2, "title": "second title", "body": "b2"},
                {"userId": 2, "id": 3, "title": "third title", "body": "b3"}
            ]))
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path(), &format!("http://{}/posts", addr));

    let output = run_feed(vec![
        "--config".into(),
        config.display().to_string(),
        "posts".into(),
        "load".into(),
        "--dry-run".into(),
    ])
    .await;

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        output.status.success(),
        "stdout: {}\nstderr: {}",
        stdout,
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(stdout.contains("projected records: 3"), "{}", stdout);
    assert!(stdout.contains("first title"), "{}", stdout);
    assert!(stdout.contains("second title"), "{}", stdout);
    assert!(!stdout.contains("third title"), "{}", stdout);
    assert!(stdout.contains("dry-run"), "{}", stdout);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_posts_load_fails_when_upstream_unreachable() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(
        tmp.path(),
        &format!("http://127.0.0.1:{}/posts", free_port()),
    );

    let output = run_feed(vec![
        "--config".into(),
        config.display().to_string(),
        "posts".into(),
        "load".into(),
    ])
    .await;

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error"), "{}", stderr);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_posts_load_gives_up_when_database_unreachable() {
    let app = Router::new().route(
        "/posts",
        get(|| async { Json(json!([{"userId": 1, "id": 1, "title": "t", "body": "b"}])) }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("feed.toml");
    fs::write(
        &config,
        format!(
            "[posts]\nsource_url = \"http://{}/posts\"\nmax_retries = 2\nretry_delay_secs = 0\n\n[db]\nconnect_timeout_secs = 2\n",
            addr
        ),
    )
    .unwrap();

    let started = std::time::Instant::now();
    let output = run_feed_with_env(
        vec![
            "--config".into(),
            config.display().to_string(),
            "posts".into(),
            "load".into(),
        ],
        vec![
            ("DB_HOST", "127.0.0.1".to_string()),
            ("DB_PORT", free_port().to_string()),
        ],
    )
    .await;

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("gave up after 2 attempts"), "{}", stderr);
    assert!(stderr.contains("not reachable"), "{}", stderr);
    assert!(started.elapsed() < std::time::Duration::from_secs(10));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_missing_config_file_is_an_error() {
    let output = run_feed(vec![
        "--config".into(),
        "/nonexistent/feed.toml".into(),
        "posts".into(),
        "load".into(),
        "--dry-run".into(),
    ])
    .await;

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to read config file"), "{}", stderr);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_articles_load_fails_when_weaviate_unreachable() {
    let tmp = TempDir::new().unwrap();
    let config = tmp.path().join("feed.toml");
    // Nothing listens on this port, so the Weaviate readiness check fails
    // before the data file is read.
    fs::write(
        &config,
        format!(
            "[weaviate]\nurl = \"http://127.0.0.1:{}\"\ntimeout_secs = 2\n",
            free_port()
        ),
    )
    .unwrap();

    let output = run_feed(vec![
        "--config".into(),
        config.display().to_string(),
        "articles".into(),
        "load".into(),
        "--skip-pull".into(),
        "--data".into(),
        tmp.path().join("missing.json").display().to_string(),
    ])
    .await;

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("not reachable"), "{}", stderr);
}
