use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use cookie::{Cookie, SameSite};

use crate::error::AppError;
use crate::session::{
    generate_token, Session, SessionError, TokenChange, COOKIE_NAME, CSRF_TOKEN,
};
use crate::state::AppState;

/// Resolve the session for this request and hand it down explicitly.
///
/// The session travels in request extensions (see the [`Session`]
/// extractor). Every session gets a CSRF token on first sight. On the way
/// out, a token the client does not hold yet is sent in `Set-Cookie`.
pub async fn load_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let presented = session_token(request.headers());
    let session = state.sessions.load(presented.as_deref()).await;

    if let Err(e) = ensure_csrf_token(&session).await {
        return AppError::from(e).into_response();
    }

    request.extensions_mut().insert(session.clone());
    let mut response = next.run(request).await;

    if session.change().await == TokenChange::Issued {
        let cookie = session_cookie(session.token().await, state.config.session_cookie_secure);
        match HeaderValue::from_str(&cookie.to_string()) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => {
                return AppError::Internal(format!("unencodable session cookie: {e}")).into_response();
            }
        }
    }
    response
}

/// Give the session a CSRF token unless it already has one.
async fn ensure_csrf_token(session: &Session) -> Result<String, SessionError> {
    session
        .update(CSRF_TOKEN, |token: Option<String>| {
            token.unwrap_or_else(generate_token)
        })
        .await
}

/// The `session` cookie value, if the request carries one.
pub(crate) fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == COOKIE_NAME)
        .map(|cookie| cookie.value().to_string())
}

fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build()
}
