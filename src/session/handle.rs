use std::sync::Arc;

use axum::{extract::FromRequestParts, http::request::Parts};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::Mutex;

use super::{SessionError, SessionManager};
use crate::error::AppError;

/// What happened to the token during this request.
///
/// The session-attach stage uses it to decide whether a `Set-Cookie` header
/// is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenChange {
    /// The client's token is still current.
    Unchanged,
    /// A token the client does not have yet: fresh session or rotation.
    Issued,
}

#[derive(Debug)]
struct Current {
    token: String,
    change: TokenChange,
}

/// Request-scoped view of one session.
///
/// Created by the session-attach middleware, stored in request extensions
/// and pulled into handlers as an extractor. Clones share the same current
/// token, so a rotation done by a handler is visible to the middleware when
/// the response travels back out.
#[derive(Debug, Clone)]
pub struct Session {
    manager: Arc<SessionManager>,
    current: Arc<Mutex<Current>>,
}

impl Session {
    pub(super) fn existing(manager: Arc<SessionManager>, token: String) -> Self {
        Self::with_change(manager, token, TokenChange::Unchanged)
    }

    pub(super) fn issued(manager: Arc<SessionManager>, token: String) -> Self {
        Self::with_change(manager, token, TokenChange::Issued)
    }

    fn with_change(manager: Arc<SessionManager>, token: String, change: TokenChange) -> Self {
        Self {
            manager,
            current: Arc::new(Mutex::new(Current { token, change })),
        }
    }

    pub async fn token(&self) -> String {
        self.current.lock().await.token.clone()
    }

    pub async fn change(&self) -> TokenChange {
        self.current.lock().await.change
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, SessionError> {
        let mut current = self.current.lock().await;
        match self.manager.get(&current.token, key).await {
            Err(SessionError::Unknown) => {
                self.rebind(&mut current);
                self.manager.get(&current.token, key).await
            }
            other => other,
        }
    }

    pub async fn insert<T: Serialize>(&self, key: &str, value: T) -> Result<(), SessionError> {
        let mut current = self.current.lock().await;
        match self.manager.put(&current.token, key, &value).await {
            Err(SessionError::Unknown) => {
                self.rebind(&mut current);
                self.manager.put(&current.token, key, &value).await
            }
            other => other,
        }
    }

    pub async fn remove(&self, key: &str) -> Result<(), SessionError> {
        let mut current = self.current.lock().await;
        match self.manager.remove(&current.token, key).await {
            // Nothing to remove from a session that no longer exists.
            Err(SessionError::Unknown) => {
                self.rebind(&mut current);
                Ok(())
            }
            other => other,
        }
    }

    pub async fn pop<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, SessionError> {
        let mut current = self.current.lock().await;
        match self.manager.pop(&current.token, key).await {
            Err(SessionError::Unknown) => {
                self.rebind(&mut current);
                self.manager.pop(&current.token, key).await
            }
            other => other,
        }
    }

    pub async fn update<T, F>(&self, key: &str, mut f: F) -> Result<T, SessionError>
    where
        T: Serialize + DeserializeOwned + Clone,
        F: FnMut(Option<T>) -> T,
    {
        let mut current = self.current.lock().await;
        match self.manager.update(&current.token, key, &mut f).await {
            Err(SessionError::Unknown) => {
                self.rebind(&mut current);
                self.manager.update(&current.token, key, &mut f).await
            }
            other => other,
        }
    }

    /// Rotate the token, keeping the data. Call on every change of
    /// authentication state.
    ///
    /// If the token was already rotated or destroyed by a concurrent request,
    /// there is no data left to carry over and the handle moves to a fresh
    /// session, which is a new token all the same.
    pub async fn renew_token(&self) -> Result<(), SessionError> {
        let mut current = self.current.lock().await;
        match self.manager.renew_token(&current.token).await {
            Ok(token) => {
                current.token = token;
                current.change = TokenChange::Issued;
                Ok(())
            }
            Err(SessionError::Unknown) => {
                self.rebind(&mut current);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// End the session and continue the request on a fresh one that holds
    /// only a new CSRF token.
    pub async fn destroy(&self) {
        let mut current = self.current.lock().await;
        self.manager.destroy(&current.token).await;
        current.token = self.manager.create_with_csrf();
        current.change = TokenChange::Issued;
    }

    /// The token was valid when the request started but another request on
    /// the same cookie has since rotated or destroyed it. Continue on a fresh
    /// anonymous session, just as `load` would for that token now.
    fn rebind(&self, current: &mut Current) {
        tracing::debug!("session token went stale mid-request, continuing on a fresh session");
        current.token = self.manager.create_with_csrf();
        current.change = TokenChange::Issued;
    }
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| AppError::Internal("session layer is not installed".to_string()))
    }
}
