//! # User Handlers
//!
//! Signup, login, logout and the account pages. The flows themselves live
//! in [`crate::auth::flow`]; these handlers turn their outcomes into either
//! a redirect or the form page again with the problems filled in.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form,
};

use crate::auth::{
    flow,
    types::{LoginForm, PasswordUpdateForm, SignupForm},
    AuthState, CurrentUser,
};
use crate::error::{AppError, AppResult, FieldErrors};
use crate::handlers::views::{render, Page, TemplateData};
use crate::middleware::auth::LOGIN_PATH;
use crate::session::{Session, FLASH};
use crate::state::AppState;

pub async fn signup(data: TemplateData) -> Response {
    render(
        StatusCode::OK,
        data,
        Page::Signup {
            form: SignupForm::default(),
            field_errors: FieldErrors::new(),
        },
    )
}

pub async fn signup_post(
    State(state): State<AppState>,
    session: Session,
    auth: AuthState,
    Form(form): Form<SignupForm>,
) -> AppResult<Response> {
    let form = form.normalized();

    let field_errors = match flow::signup(state.users.as_ref(), &form).await {
        Ok(user_id) => {
            tracing::info!(user_id, "user signed up");
            session
                .insert(FLASH, "Your signup was successful. Please log in.")
                .await?;
            return Ok(Redirect::to(LOGIN_PATH).into_response());
        }
        Err(AppError::Validation(fields)) => fields,
        Err(AppError::DuplicateEmail) => {
            FieldErrors::from([("email".to_string(), "Email address is already in use".to_string())])
        }
        Err(e) => return Err(e),
    };

    let data = TemplateData::new(&session, auth).await?;
    Ok(render(
        StatusCode::UNPROCESSABLE_ENTITY,
        data,
        Page::Signup { form, field_errors },
    ))
}

pub async fn login(data: TemplateData) -> Response {
    render(
        StatusCode::OK,
        data,
        Page::Login {
            form: LoginForm::default(),
            field_errors: FieldErrors::new(),
            non_field_errors: Vec::new(),
        },
    )
}

pub async fn login_post(
    State(state): State<AppState>,
    session: Session,
    auth: AuthState,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    let form = form.normalized();

    let (field_errors, non_field_errors) =
        match flow::login(state.users.as_ref(), &session, &form).await {
            Ok(outcome) => return Ok(Redirect::to(&outcome.redirect_to).into_response()),
            Err(AppError::Validation(fields)) => (fields, Vec::new()),
            Err(e @ AppError::InvalidCredentials) => {
                tracing::info!("failed login attempt");
                (FieldErrors::new(), vec![e.to_string()])
            }
            Err(e) => return Err(e),
        };

    let data = TemplateData::new(&session, auth).await?;
    Ok(render(
        StatusCode::UNPROCESSABLE_ENTITY,
        data,
        Page::Login {
            form,
            field_errors,
            non_field_errors,
        },
    ))
}

pub async fn logout_post(session: Session, CurrentUser(user_id): CurrentUser) -> AppResult<Response> {
    flow::logout(&session).await?;
    tracing::info!(user_id, "user logged out");
    Ok(Redirect::to("/").into_response())
}

pub async fn account_view(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    data: TemplateData,
) -> AppResult<Response> {
    let user = state.users.get(user_id).await?;
    Ok(render(StatusCode::OK, data, Page::Account { user }))
}

pub async fn password_update(data: TemplateData) -> Response {
    render(
        StatusCode::OK,
        data,
        Page::PasswordUpdate {
            form: PasswordUpdateForm::default(),
            field_errors: FieldErrors::new(),
        },
    )
}

pub async fn password_update_post(
    State(state): State<AppState>,
    session: Session,
    CurrentUser(user_id): CurrentUser,
    auth: AuthState,
    Form(form): Form<PasswordUpdateForm>,
) -> AppResult<Response> {
    let field_errors =
        match flow::change_password(state.users.as_ref(), &session, user_id, &form).await {
            Ok(()) => {
                tracing::info!(user_id, "password changed");
                return Ok(Redirect::to("/account/view").into_response());
            }
            Err(AppError::Validation(fields)) => fields,
            Err(AppError::InvalidCredentials) => FieldErrors::from([(
                "current_password".to_string(),
                "Current password is incorrect".to_string(),
            )]),
            Err(e) => return Err(e),
        };

    let data = TemplateData::new(&session, auth).await?;
    Ok(render(
        StatusCode::UNPROCESSABLE_ENTITY,
        data,
        Page::PasswordUpdate { form, field_errors },
    ))
}
