//! # Database Module
//!
//! - `models`: row types (User, Snippet)
//! - `users`: the credential store
//! - `snippets`: the snippet store
//!
//! Handlers never see the pool. They talk to the [`UserStore`] and
//! [`SnippetStore`] traits, implemented here on SQLite. Each query runs under
//! a deadline; running out of time is reported as [`AppError::Transient`].

pub mod models;
pub mod snippets;
pub mod users;

pub use snippets::{SnippetStore, SqliteSnippetStore, LATEST_LIMIT};
pub use users::{SqliteUserStore, UserStore};

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::error::{AppError, AppResult};

/// Open the connection pool. Acquiring a connection shares the store deadline.
pub async fn connect(database_url: &str, acquire_timeout: Duration) -> Result<SqlitePool, sqlx::Error> {
    SqlitePoolOptions::new()
        .acquire_timeout(acquire_timeout)
        .connect(database_url)
        .await
}

/// Apply the embedded migrations from `./migrations`.
pub async fn migrate(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Run one store call under `deadline`.
pub(crate) async fn with_deadline<T, F>(deadline: Duration, call: F) -> AppResult<T>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(deadline, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(sqlx::Error::PoolTimedOut)) | Err(_) => Err(AppError::Transient),
        Ok(Err(e)) => Err(AppError::Database(e)),
    }
}

/// Timestamps are stored as fixed-width RFC 3339 strings so that comparing
/// them as text in SQL orders them in time.
pub(crate) fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Single-connection in-memory database with migrations applied.
///
/// Every SQLite `:memory:` connection is its own database, so the pool is
/// pinned to one connection that never expires.
pub async fn in_memory() -> Result<SqlitePool, anyhow::Error> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;
    migrate(&pool).await?;
    Ok(pool)
}
