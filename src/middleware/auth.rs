use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::auth::AuthState;
use crate::error::AppResult;
use crate::session::{Session, AUTHENTICATED_USER_ID, FLASH, REDIRECT_AFTER_LOGIN};
use crate::state::AppState;

pub const LOGIN_PATH: &str = "/user/login";
pub const LOGIN_REQUIRED_FLASH: &str = "Please log in to continue.";

/// Resolve who is making the request.
///
/// A session naming a user that no longer exists is destroyed and the
/// request continues anonymously on a fresh session.
pub async fn authenticate(
    State(state): State<AppState>,
    session: Session,
    mut request: Request,
    next: Next,
) -> AppResult<Response> {
    let auth = match session.get::<i64>(AUTHENTICATED_USER_ID).await? {
        None => AuthState::Anonymous,
        Some(user_id) => {
            if state.users.exists(user_id).await? {
                AuthState::Authenticated(user_id)
            } else {
                tracing::info!(user_id, "session names a deleted user, discarding it");
                session.destroy().await;
                AuthState::Anonymous
            }
        }
    };

    request.extensions_mut().insert(auth);
    Ok(next.run(request).await)
}

/// Gate for protected routes.
///
/// Anonymous requests are sent to the login form with a flash message; for
/// GET requests the path is remembered so login can return to it.
/// Authenticated pages are never cached.
pub async fn require_authentication(
    auth: AuthState,
    session: Session,
    request: Request,
    next: Next,
) -> AppResult<Response> {
    if !auth.is_authenticated() {
        if request.method() == Method::GET {
            session
                .insert(REDIRECT_AFTER_LOGIN, request.uri().path())
                .await?;
        }
        session.insert(FLASH, LOGIN_REQUIRED_FLASH).await?;
        return Ok(Redirect::to(LOGIN_PATH).into_response());
    }

    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    Ok(response)
}
