//! # Auth Flow
//!
//! Signup, login, logout and password change. Each one validates its form,
//! calls the credential store, and moves the session between the anonymous
//! and authenticated states. Every change of authentication state rotates the
//! session token so a token planted before login is worthless after it.

use validator::Validate;

use crate::auth::types::{LoginForm, PasswordUpdateForm, SignupForm};
use crate::db::UserStore;
use crate::error::{field_errors, AppError, AppResult};
use crate::session::{Session, AUTHENTICATED_USER_ID, FLASH, REDIRECT_AFTER_LOGIN};

/// Where a successful login lands when no other page was requested.
pub const DEFAULT_LOGIN_REDIRECT: &str = "/snippet/create";

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user_id: i64,
    /// The rotated session token now carrying the authenticated state.
    pub token: String,
    pub redirect_to: String,
}

/// Validate and create an account.
///
/// Field problems come back as `Validation`; a taken email as
/// `DuplicateEmail`. The caller decides how to show either.
pub async fn signup(users: &dyn UserStore, form: &SignupForm) -> AppResult<i64> {
    form.validate()
        .map_err(|e| AppError::Validation(field_errors(&e)))?;

    users.insert(&form.name, &form.email, &form.password).await
}

pub async fn login(
    users: &dyn UserStore,
    session: &Session,
    form: &LoginForm,
) -> AppResult<LoginOutcome> {
    form.validate()
        .map_err(|e| AppError::Validation(field_errors(&e)))?;

    let user_id = users.authenticate(&form.email, &form.password).await?;

    session.renew_token().await?;
    session.insert(AUTHENTICATED_USER_ID, user_id).await?;

    let redirect_to = session
        .pop::<String>(REDIRECT_AFTER_LOGIN)
        .await?
        .filter(|path| is_local_path(path))
        .unwrap_or_else(|| DEFAULT_LOGIN_REDIRECT.to_string());

    tracing::info!(user_id, "user logged in");

    Ok(LoginOutcome {
        user_id,
        token: session.token().await,
        redirect_to,
    })
}

pub async fn logout(session: &Session) -> AppResult<()> {
    session.remove(AUTHENTICATED_USER_ID).await?;
    session.renew_token().await?;
    session
        .insert(FLASH, "You've been logged out successfully!")
        .await?;
    Ok(())
}

pub async fn change_password(
    users: &dyn UserStore,
    session: &Session,
    user_id: i64,
    form: &PasswordUpdateForm,
) -> AppResult<()> {
    form.validate()
        .map_err(|e| AppError::Validation(field_errors(&e)))?;

    users
        .update_password(user_id, &form.current_password, &form.new_password)
        .await?;

    session.renew_token().await?;
    session
        .insert(FLASH, "Your password has been updated!")
        .await?;
    Ok(())
}

/// Only same-site absolute paths; `//host` would leave the site.
fn is_local_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//") && !path.starts_with("/\\")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{in_memory, SqliteUserStore};
    use crate::session::SessionManager;
    use assert_matches::assert_matches;
    use std::sync::Arc;
    use std::time::Duration;

    async fn setup() -> (SqliteUserStore, Arc<SessionManager>) {
        let pool = in_memory().await.unwrap();
        (
            SqliteUserStore::new(pool, Duration::from_secs(30)),
            Arc::new(SessionManager::new(Duration::from_secs(60))),
        )
    }

    fn alice_signup() -> SignupForm {
        SignupForm {
            name: "Alice".into(),
            email: "alice@example.com".into(),
            password: "password123".into(),
            password_confirmation: "password123".into(),
        }
    }

    fn alice_login(password: &str) -> LoginForm {
        LoginForm {
            email: "alice@example.com".into(),
            password: password.into(),
        }
    }

    #[tokio::test]
    async fn alice_signs_up_and_logs_in() {
        let (users, sessions) = setup().await;
        let user_id = signup(&users, &alice_signup()).await.unwrap();

        let session = sessions.load(None).await;
        let pre_login = session.token().await;

        let outcome = login(&users, &session, &alice_login("password123")).await.unwrap();
        assert_eq!(outcome.user_id, user_id);
        assert_ne!(outcome.token, pre_login);
        assert_eq!(outcome.redirect_to, DEFAULT_LOGIN_REDIRECT);
        assert_eq!(
            sessions.get::<i64>(&outcome.token, AUTHENTICATED_USER_ID).await.unwrap(),
            Some(user_id)
        );
        assert!(sessions.get::<i64>(&pre_login, AUTHENTICATED_USER_ID).await.is_err());

        let other = sessions.load(None).await;
        assert_matches!(
            login(&users, &other, &alice_login("wrongpass")).await,
            Err(AppError::InvalidCredentials)
        );
    }

    #[tokio::test]
    async fn signup_rejects_duplicate_email() {
        let (users, _) = setup().await;
        signup(&users, &alice_signup()).await.unwrap();
        assert_matches!(signup(&users, &alice_signup()).await, Err(AppError::DuplicateEmail));
    }

    #[tokio::test]
    async fn login_honours_remembered_path() {
        let (users, sessions) = setup().await;
        signup(&users, &alice_signup()).await.unwrap();

        let session = sessions.load(None).await;
        session.insert(REDIRECT_AFTER_LOGIN, "/account/view").await.unwrap();

        let outcome = login(&users, &session, &alice_login("password123")).await.unwrap();
        assert_eq!(outcome.redirect_to, "/account/view");
    }

    #[tokio::test]
    async fn logout_returns_to_anonymous_with_new_token() {
        let (users, sessions) = setup().await;
        signup(&users, &alice_signup()).await.unwrap();
        let session = sessions.load(None).await;
        let outcome = login(&users, &session, &alice_login("password123")).await.unwrap();

        logout(&session).await.unwrap();

        let after = session.token().await;
        assert_ne!(after, outcome.token);
        assert_eq!(session.get::<i64>(AUTHENTICATED_USER_ID).await.unwrap(), None);
        assert_eq!(
            session.get::<String>(FLASH).await.unwrap().as_deref(),
            Some("You've been logged out successfully!")
        );
    }

    #[test]
    fn only_local_paths_are_followed() {
        assert!(is_local_path("/snippet/view/1"));
        assert!(!is_local_path("//evil.example"));
        assert!(!is_local_path("https://evil.example"));
    }
}
