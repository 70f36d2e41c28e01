//! # Error Handling
//!
//! Application-wide error type and its mapping onto HTTP responses.
//!
//! User-correctable errors (validation, credentials) carry enough detail for
//! the caller to re-render a form. Store and internal errors are logged here
//! with full detail and reach the client only as a generic message.
//!
//! ## Status Mapping
//! | Variant | Status |
//! |---|---|
//! | `Validation`, `DuplicateEmail`, `InvalidCredentials` | 422 |
//! | `NotFound` | 404 |
//! | `CsrfMismatch` | 400 |
//! | `Unauthenticated` | 401 |
//! | `Transient` | 503 with `Retry-After: 1` |
//! | `Database`, `Session`, `Internal` | 500 |
//!
//! Most handlers never build a response for a failure themselves. They
//! return `AppResult<T>`, use `?` on store and session calls, and this
//! module turns whatever comes out into the right status.

use std::collections::BTreeMap;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::session::SessionError;

/// Per-field validation messages, keyed by form field name.
///
/// A `BTreeMap` keeps the serialized order stable for clients and tests.
pub type FieldErrors = BTreeMap<String, String>;

/// Application-wide error type
///
/// Each variant corresponds to one entry of the error taxonomy. Handlers
/// return `AppResult<T>` and let `IntoResponse` pick the status code.
///
/// ## The `#[from]` attribute
/// `thiserror` generates a `From` impl for each `#[from]` field, which is
/// what lets `?` convert a library error on the spot:
/// ```ignore
/// let row = sqlx::query("SELECT 1").fetch_one(&pool).await?;
/// // sqlx::Error became AppError::Database here
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// Form input failed validation. Field-scoped, shown back to the user.
    #[error("Validation failed")]
    Validation(FieldErrors),

    /// Resource absent or expired. Both look identical from the outside.
    #[error("Not found")]
    NotFound,

    /// Signup with an email that is already registered.
    #[error("Email address is already in use")]
    DuplicateEmail,

    /// Wrong password or unknown email. Never distinguish the two.
    #[error("Email or password is incorrect")]
    InvalidCredentials,

    /// Submitted CSRF token does not match the session's.
    #[error("CSRF token mismatch")]
    CsrfMismatch,

    /// The route requires a logged-in user.
    #[error("Authentication required")]
    Unauthenticated,

    /// A store call exceeded its deadline. Safe to retry.
    #[error("Store operation timed out")]
    Transient,

    /// Database errors (SQLx library errors)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Session manager failures. In practice a value that does not
    /// round-trip through JSON; stale tokens are absorbed by the handle.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Unexpected errors that shouldn't normally occur
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// The HTTP status this error is surfaced as.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::DuplicateEmail | AppError::InvalidCredentials => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::CsrfMismatch => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Transient => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Database(_) | AppError::Session(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match &self {
            AppError::Validation(fields) => json!({
                "error": self.to_string(),
                "fields": fields,
            }),
            AppError::Database(e) => {
                // Detail stays in the log, the client gets the status text.
                tracing::error!(error = ?e, "database error");
                json!({ "error": "Internal Server Error" })
            }
            AppError::Session(e) => {
                tracing::error!(error = %e, "session error");
                json!({ "error": "Internal Server Error" })
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                json!({ "error": "Internal Server Error" })
            }
            AppError::Transient => {
                tracing::warn!("store deadline exceeded");
                json!({ "error": "Service temporarily unavailable, please retry" })
            }
            AppError::CsrfMismatch => json!({ "error": "Bad Request" }),
            _ => json!({ "error": self.to_string() }),
        };

        let mut response = (status, Json(body)).into_response();
        if status == StatusCode::SERVICE_UNAVAILABLE {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, header::HeaderValue::from_static("1"));
        }
        response
    }
}

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convert a `validator` report into field-addressable messages.
///
/// Only the first message per field is kept; forms show one line per input.
pub fn field_errors(errors: &validator::ValidationErrors) -> FieldErrors {
    errors
        .field_errors()
        .into_iter()
        .filter_map(|(field, errs)| {
            errs.first().map(|e| {
                let message = e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string());
                (field.to_string(), message)
            })
        })
        .collect()
}
