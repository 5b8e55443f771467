use anyhow::{Context, Result};
use sqlx::postgres::{PgConnectOptions, PgConnection, PgPool, PgPoolOptions};
use sqlx::Connection;
use std::time::Duration;

use crate::config::{Config, DbConfig};
use crate::retry::{retry, RetryPolicy, Sleeper};
use crate::store::postgres::is_connection_error;

pub fn connect_options(db: &DbConfig) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&db.host)
        .port(db.port)
        .username(&db.user)
        .password(&db.password)
        .database(&db.name)
}

fn connect_timeout(db: &DbConfig) -> Duration {
    Duration::from_secs(db.connect_timeout_secs)
}

fn pool_options(config: &Config) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(connect_timeout(&config.db))
}

/// Pool that connects on first use. The read service starts with this so
/// that an unavailable database shows up as a per-request error payload
/// instead of a startup failure.
pub fn connect_lazy(config: &Config) -> PgPool {
    pool_options(config).connect_lazy_with(connect_options(&config.db))
}

/// One connection attempt, bounded by `db.connect_timeout_secs`. The
/// connection is closed again on success.
pub async fn try_connect(db: &DbConfig) -> Result<(), sqlx::Error> {
    let options = connect_options(db);
    let attempt = PgConnection::connect_with(&options);
    let conn = match tokio::time::timeout(connect_timeout(db), attempt).await {
        Ok(conn) => conn?,
        Err(_) => {
            return Err(sqlx::Error::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("no answer within {}s", db.connect_timeout_secs),
            )))
        }
    };
    conn.close().await
}

/// Block until the database accepts connections, using the bounded fixed
/// backoff from `[posts]`. Each attempt is a single connection; the pool is
/// only built once one succeeds.
pub async fn wait_for_database(config: &Config, sleeper: &dyn Sleeper) -> Result<PgPool> {
    let policy = RetryPolicy::fixed(
        config.posts.max_retries,
        Duration::from_secs(config.posts.retry_delay_secs),
    );

    retry(&policy, sleeper, is_connection_error, |attempt| {
        tracing::info!(
            "({}/{}) connecting to {}",
            attempt,
            policy.max_attempts,
            config.db.display_url()
        );
        try_connect(&config.db)
    })
    .await
    .with_context(|| format!("database at {} is not reachable", config.db.display_url()))?;

    Ok(connect_lazy(config))
}
