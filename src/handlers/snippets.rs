//! # Snippet Handlers
//!
//! Home page, about page, viewing a snippet and the create form.

use std::borrow::Cow;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::auth::AuthState;
use crate::db::LATEST_LIMIT;
use crate::error::{field_errors, AppError, AppResult, FieldErrors};
use crate::handlers::views::{render, Page, TemplateData};
use crate::session::{Session, FLASH};
use crate::state::AppState;

/// Lifetimes offered by the create form, in days.
pub const EXPIRY_CHOICES: [i64; 3] = [1, 7, 365];

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SnippetForm {
    #[validate(
        custom(function = "not_blank"),
        length(max = 100, message = "This field cannot be more than 100 characters long")
    )]
    pub title: String,

    #[validate(custom(function = "not_blank"))]
    pub content: String,

    /// Days until the snippet expires. Kept as the raw submitted text so a
    /// non-number is reported as a field error like any other bad choice.
    pub expires: String,
}

impl Default for SnippetForm {
    fn default() -> Self {
        Self {
            title: String::new(),
            content: String::new(),
            expires: "365".to_string(),
        }
    }
}

impl SnippetForm {
    /// Check every field and return the snippet's lifetime.
    pub fn check(&self) -> Result<chrono::Duration, FieldErrors> {
        let mut errors = self
            .validate()
            .err()
            .map(|e| field_errors(&e))
            .unwrap_or_default();

        let days = self
            .expires
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|days| EXPIRY_CHOICES.contains(days));
        if days.is_none() {
            errors.insert(
                "expires".into(),
                "This field must equal 1, 7 or 365".into(),
            );
        }

        match days {
            Some(days) if errors.is_empty() => Ok(chrono::Duration::days(days)),
            _ => Err(errors),
        }
    }
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank")
            .with_message(Cow::Borrowed("This field cannot be blank")));
    }
    Ok(())
}

/// GET /
pub async fn home(State(state): State<AppState>, data: TemplateData) -> AppResult<Response> {
    let snippets = state.snippets.latest(LATEST_LIMIT).await?;
    Ok(render(StatusCode::OK, data, Page::Home { snippets }))
}

/// GET /about
pub async fn about(data: TemplateData) -> Response {
    render(StatusCode::OK, data, Page::About)
}

/// GET /snippet/view/{id}
///
/// Ids that are not positive integers are as absent as expired snippets.
pub async fn snippet_view(
    State(state): State<AppState>,
    Path(id): Path<String>,
    data: TemplateData,
) -> AppResult<Response> {
    let id = parse_id(&id).ok_or(AppError::NotFound)?;
    let snippet = state.snippets.get(id).await?;
    Ok(render(StatusCode::OK, data, Page::SnippetView { snippet }))
}

/// GET /snippet/create
pub async fn snippet_create(data: TemplateData) -> Response {
    render(
        StatusCode::OK,
        data,
        Page::SnippetCreate {
            form: SnippetForm::default(),
            field_errors: FieldErrors::new(),
        },
    )
}

/// POST /snippet/create
pub async fn snippet_create_post(
    State(state): State<AppState>,
    session: Session,
    auth: AuthState,
    Form(form): Form<SnippetForm>,
) -> AppResult<Response> {
    let expires_in = match form.check() {
        Ok(expires_in) => expires_in,
        Err(field_errors) => {
            let data = TemplateData::new(&session, auth).await?;
            return Ok(render(
                StatusCode::UNPROCESSABLE_ENTITY,
                data,
                Page::SnippetCreate { form, field_errors },
            ));
        }
    };

    let id = state
        .snippets
        .insert(form.title.trim(), &form.content, expires_in)
        .await?;
    tracing::info!(snippet_id = id, user_id = ?auth.user_id(), "snippet created");

    session.insert(FLASH, "Snippet successfully created!").await?;
    Ok(Redirect::to(&format!("/snippet/view/{id}")).into_response())
}

fn parse_id(raw: &str) -> Option<i64> {
    raw.parse::<i64>().ok().filter(|id| *id >= 1)
}
