use axum::{
    body::{self, Body},
    extract::Request,
    http::{header, HeaderMap, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::AppError;
use crate::session::{Session, CSRF_TOKEN};

/// Form field carrying the token in HTML forms.
pub const FORM_FIELD: &str = "csrf_token";
/// Header carrying the token for non-form clients.
pub const HEADER: &str = "x-csrf-token";

/// Largest form body inspected for the token.
const BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Reject state-changing requests whose token does not match the session's.
///
/// Runs before authentication, so a rejected request touches neither store.
/// The body is buffered to read the form field and handed on unchanged.
pub async fn verify_csrf(request: Request, next: Next) -> Response {
    if !is_state_changing(request.method()) {
        return next.run(request).await;
    }

    let Some(session) = request.extensions().get::<Session>().cloned() else {
        return AppError::Internal("session layer is not installed".to_string()).into_response();
    };
    let expected: Option<String> = match session.get(CSRF_TOKEN).await {
        Ok(token) => token,
        Err(e) => return AppError::from(e).into_response(),
    };

    let (parts, body) = request.into_parts();
    let bytes = match body::to_bytes(body, BODY_LIMIT).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(error = %e, "unreadable request body");
            return AppError::CsrfMismatch.into_response();
        }
    };

    let submitted = header_token(&parts.headers).or_else(|| form_token(&parts.headers, &bytes));
    let valid = match (expected.as_deref(), submitted.as_deref()) {
        (Some(expected), Some(submitted)) => tokens_match(expected, submitted),
        _ => false,
    };
    if !valid {
        tracing::warn!(method = %parts.method, path = %parts.uri.path(), "csrf token mismatch");
        return AppError::CsrfMismatch.into_response();
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

fn is_state_changing(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    )
}

fn header_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn form_token(headers: &HeaderMap, body: &[u8]) -> Option<String> {
    let is_form = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/x-www-form-urlencoded"));
    if !is_form {
        return None;
    }

    serde_urlencoded::from_bytes::<Vec<(String, String)>>(body)
        .ok()?
        .into_iter()
        .find(|(name, _)| name == FORM_FIELD)
        .map(|(_, value)| value)
}

/// Compare without an early exit, so timing does not reveal the matching
/// prefix length.
fn tokens_match(expected: &str, submitted: &str) -> bool {
    let (a, b) = (expected.as_bytes(), submitted.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |diff, (x, y)| diff | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn form_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        headers
    }

    #[test]
    fn safe_methods_are_not_checked() {
        assert!(!is_state_changing(&Method::GET));
        assert!(!is_state_changing(&Method::HEAD));
        assert!(!is_state_changing(&Method::OPTIONS));
        assert!(is_state_changing(&Method::POST));
        assert!(is_state_changing(&Method::DELETE));
    }

    #[test]
    fn token_read_from_form_body() {
        let body = b"title=Hi&csrf_token=abc%2B123&content=x";
        assert_eq!(form_token(&form_headers(), body).as_deref(), Some("abc+123"));
    }

    #[test]
    fn form_field_ignored_for_other_content_types() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        assert!(form_token(&headers, b"csrf_token=abc").is_none());
    }

    #[test]
    fn token_read_from_header() {
        let mut headers = HeaderMap::new();
        headers.insert(HEADER, HeaderValue::from_static("xyz"));
        assert_eq!(header_token(&headers).as_deref(), Some("xyz"));
    }

    #[test]
    fn comparison() {
        assert!(tokens_match("abcdef", "abcdef"));
        assert!(!tokens_match("abcdef", "abcdeg"));
        assert!(!tokens_match("abcdef", "abcde"));
        assert!(!tokens_match("abc", ""));
    }
}
