//! # Authentication
//!
//! - `password`: Argon2id hashing
//! - `types`: the signup, login and password-change forms
//! - `flow`: signup, login, logout and password change against the
//!   credential store and the session
//!
//! ## Request authentication state
//! `Anonymous --login--> Authenticated --logout / session expiry--> Anonymous`
//!
//! The `authenticate` middleware resolves the state once per request and
//! stores it in request extensions; handlers read it with the [`AuthState`]
//! or [`CurrentUser`] extractors.

pub mod flow;
pub mod password;
pub mod types;

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Anonymous,
    Authenticated(i64),
}

impl AuthState {
    pub fn user_id(&self) -> Option<i64> {
        match self {
            AuthState::Authenticated(id) => Some(*id),
            AuthState::Anonymous => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated(_))
    }
}

impl<S> FromRequestParts<S> for AuthState
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<AuthState>()
            .copied()
            .unwrap_or(AuthState::Anonymous))
    }
}

/// Id of the logged-in user; rejects anonymous requests.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub i64);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        AuthState::from_request_parts(parts, state)
            .await?
            .user_id()
            .map(CurrentUser)
            .ok_or(AppError::Unauthenticated)
    }
}
