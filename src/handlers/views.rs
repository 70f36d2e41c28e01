//! # Page Rendering
//!
//! Handlers never build response bodies themselves. They pick a [`Page`] and
//! hand it to [`render`] together with the per-request [`TemplateData`].
//! The page is serialized as JSON tagged with its name; a template engine
//! would consume exactly the same view-model.

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Datelike, Utc};
use serde::Serialize;

use crate::auth::{
    types::{LoginForm, PasswordUpdateForm, SignupForm},
    AuthState,
};
use crate::db::models::{Snippet, User};
use crate::error::{AppError, FieldErrors};
use crate::handlers::snippets::SnippetForm;
use crate::session::{Session, CSRF_TOKEN, FLASH};

/// Data every page carries.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateData {
    pub current_year: i32,
    /// Shown once: reading it removes it from the session.
    pub flash: Option<String>,
    pub is_authenticated: bool,
    pub csrf_token: String,
}

impl TemplateData {
    pub async fn new(session: &Session, auth: AuthState) -> Result<Self, AppError> {
        Ok(Self {
            current_year: Utc::now().year(),
            flash: session.pop(FLASH).await?,
            is_authenticated: auth.is_authenticated(),
            csrf_token: session.get(CSRF_TOKEN).await?.unwrap_or_default(),
        })
    }
}

impl<S> FromRequestParts<S> for TemplateData
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state).await?;
        let auth = AuthState::from_request_parts(parts, state).await?;
        TemplateData::new(&session, auth).await
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Page {
    Home {
        snippets: Vec<Snippet>,
    },
    About,
    SnippetView {
        snippet: Snippet,
    },
    SnippetCreate {
        form: SnippetForm,
        field_errors: FieldErrors,
    },
    Signup {
        form: SignupForm,
        field_errors: FieldErrors,
    },
    Login {
        form: LoginForm,
        field_errors: FieldErrors,
        non_field_errors: Vec<String>,
    },
    Account {
        user: User,
    },
    PasswordUpdate {
        form: PasswordUpdateForm,
        field_errors: FieldErrors,
    },
}

#[derive(Debug, Serialize)]
struct Rendered {
    #[serde(flatten)]
    data: TemplateData,
    page: Page,
}

pub fn render(status: StatusCode, data: TemplateData, page: Page) -> Response {
    (status, Json(Rendered { data, page })).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    fn data() -> TemplateData {
        TemplateData {
            current_year: 2024,
            flash: Some("hello".into()),
            is_authenticated: false,
            csrf_token: "tok".into(),
        }
    }

    #[tokio::test]
    async fn page_is_tagged_with_its_name() {
        let response = render(StatusCode::OK, data(), Page::About);
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["page"]["name"], "about");
        assert_eq!(json["flash"], "hello");
        assert_eq!(json["csrf_token"], "tok");
    }

    #[tokio::test]
    async fn passwords_never_reach_the_page() {
        let form = SignupForm {
            name: "Alice".into(),
            email: "alice@example.com".into(),
            password: "password123".into(),
            password_confirmation: "password123".into(),
        };
        let page = Page::Signup {
            form,
            field_errors: FieldErrors::new(),
        };
        let response = render(StatusCode::UNPROCESSABLE_ENTITY, data(), page);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(body.contains("alice@example.com"));
        assert!(!body.contains("password123"));
    }
}
