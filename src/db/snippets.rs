//! # Snippet Store
//!
//! Expiry is a visibility filter: every read compares `expires_at` against
//! the current time, so an expired snippet is `NotFound` even though its row
//! is still there.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::db::{models::Snippet, timestamp, with_deadline};
use crate::error::{AppError, AppResult, FieldErrors};

/// How many snippets the home page lists.
pub const LATEST_LIMIT: i64 = 10;

/// Longest title accepted, counted in characters.
pub const MAX_TITLE_CHARS: usize = 100;

#[async_trait]
pub trait SnippetStore: Send + Sync {
    /// Store a snippet visible for `expires_in` from now. Returns its id.
    ///
    /// A blank or over-long title, blank content or a non-positive lifetime
    /// is `AppError::Validation`, keyed by the offending field.
    async fn insert(&self, title: &str, content: &str, expires_in: chrono::Duration)
        -> AppResult<i64>;

    /// A snippet that exists and has not expired.
    async fn get(&self, id: i64) -> AppResult<Snippet>;

    /// Up to `limit` live snippets, newest first.
    async fn latest(&self, limit: i64) -> AppResult<Vec<Snippet>>;
}

#[derive(Debug, Clone)]
pub struct SqliteSnippetStore {
    pool: SqlitePool,
    deadline: Duration,
}

impl SqliteSnippetStore {
    pub fn new(pool: SqlitePool, deadline: Duration) -> Self {
        Self { pool, deadline }
    }
}

#[async_trait]
impl SnippetStore for SqliteSnippetStore {
    async fn insert(
        &self,
        title: &str,
        content: &str,
        expires_in: chrono::Duration,
    ) -> AppResult<i64> {
        let mut fields = FieldErrors::new();
        if title.trim().is_empty() {
            fields.insert("title".into(), "This field cannot be blank".into());
        } else if title.chars().count() > MAX_TITLE_CHARS {
            fields.insert(
                "title".into(),
                "This field cannot be more than 100 characters long".into(),
            );
        }
        if content.trim().is_empty() {
            fields.insert("content".into(), "This field cannot be blank".into());
        }
        if expires_in <= chrono::Duration::zero() {
            fields.insert("expires".into(), "Expiry must be in the future".into());
        }
        if !fields.is_empty() {
            return Err(AppError::Validation(fields));
        }

        let created_at = Utc::now();
        let expires_at = created_at + expires_in;

        let result = with_deadline(
            self.deadline,
            sqlx::query(
                "INSERT INTO snippets (title, content, created_at, expires_at)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(title)
            .bind(content)
            .bind(timestamp(created_at))
            .bind(timestamp(expires_at))
            .execute(&self.pool),
        )
        .await?;

        let id = result.last_insert_rowid();
        tracing::debug!(snippet_id = id, expires_at = %timestamp(expires_at), "snippet stored");
        Ok(id)
    }

    async fn get(&self, id: i64) -> AppResult<Snippet> {
        with_deadline(
            self.deadline,
            sqlx::query_as::<_, Snippet>(
                "SELECT id, title, content, created_at, expires_at FROM snippets
                 WHERE id = ? AND expires_at > ?",
            )
            .bind(id)
            .bind(timestamp(Utc::now()))
            .fetch_optional(&self.pool),
        )
        .await?
        .ok_or(AppError::NotFound)
    }

    async fn latest(&self, limit: i64) -> AppResult<Vec<Snippet>> {
        with_deadline(
            self.deadline,
            sqlx::query_as::<_, Snippet>(
                "SELECT id, title, content, created_at, expires_at FROM snippets
                 WHERE expires_at > ?
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?",
            )
            .bind(timestamp(Utc::now()))
            .bind(limit)
            .fetch_all(&self.pool),
        )
        .await
    }
}
