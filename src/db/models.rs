//! # Database Models
//!
//! Row types for the `users` and `snippets` tables.
//!
//! Timestamps are kept as the RFC 3339 strings they are stored as (see
//! [`crate::db::timestamp`]); nothing in the application does date math on
//! a row after it has been read.

use serde::Serialize;

/// A registered account.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,

    /// Display name given at signup.
    pub name: String,

    /// Stored lower-cased; unique regardless of case.
    pub email: String,

    /// Argon2id PHC string. Never serialized.
    #[serde(skip_serializing)]
    pub hashed_password: String,

    pub created_at: String,
}

/// A text snippet with an expiry date.
///
/// Rows are never deleted on expiry; the store filters them out instead.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Snippet {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub created_at: String,
    pub expires_at: String,
}
