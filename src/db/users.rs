//! # Credential Store
//!
//! User records and password checks. Plaintext passwords only ever exist in
//! memory on their way into Argon2; they are never stored or logged.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::auth::password;
use crate::db::{models::User, timestamp, with_deadline};
use crate::error::{AppError, AppResult, FieldErrors};

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Create an account. Fails with `DuplicateEmail` if the email (in any
    /// letter case) is taken.
    async fn insert(&self, name: &str, email: &str, password: &str) -> AppResult<i64>;

    /// The id of the account matching these credentials.
    ///
    /// Unknown email and wrong password both yield `InvalidCredentials`.
    async fn authenticate(&self, email: &str, password: &str) -> AppResult<i64>;

    async fn get(&self, id: i64) -> AppResult<User>;

    async fn exists(&self, id: i64) -> AppResult<bool>;

    /// Replace the password after re-checking the current one.
    async fn update_password(&self, id: i64, current: &str, new: &str) -> AppResult<()>;
}

#[derive(Debug, Clone)]
pub struct SqliteUserStore {
    pool: SqlitePool,
    deadline: Duration,
}

impl SqliteUserStore {
    pub fn new(pool: SqlitePool, deadline: Duration) -> Self {
        Self { pool, deadline }
    }

    async fn hashed_password_by_email(&self, email: &str) -> AppResult<Option<(i64, String)>> {
        with_deadline(
            self.deadline,
            sqlx::query_as::<_, (i64, String)>("SELECT id, hashed_password FROM users WHERE email = ?")
                .bind(email)
                .fetch_optional(&self.pool),
        )
        .await
    }

    async fn hashed_password_by_id(&self, id: i64) -> AppResult<Option<String>> {
        with_deadline(
            self.deadline,
            sqlx::query_scalar::<_, String>("SELECT hashed_password FROM users WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool),
        )
        .await
    }
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn insert(&self, name: &str, email: &str, password: &str) -> AppResult<i64> {
        let name = name.trim();
        let email = normalize_email(email);

        let mut fields = FieldErrors::new();
        for (field, value) in [("name", name), ("email", email.as_str()), ("password", password)] {
            if value.trim().is_empty() {
                fields.insert(field.to_string(), "This field cannot be blank".to_string());
            }
        }
        if !fields.is_empty() {
            return Err(AppError::Validation(fields));
        }

        let hashed_password = hash(password.to_string()).await?;

        let result = with_deadline(
            self.deadline,
            sqlx::query(
                "INSERT INTO users (name, email, hashed_password, created_at)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(name)
            .bind(&email)
            .bind(&hashed_password)
            .bind(timestamp(Utc::now()))
            .execute(&self.pool),
        )
        .await;

        match result {
            Ok(done) => {
                let id = done.last_insert_rowid();
                tracing::info!(user_id = id, "user created");
                Ok(id)
            }
            Err(AppError::Database(sqlx::Error::Database(e))) if e.is_unique_violation() => {
                Err(AppError::DuplicateEmail)
            }
            Err(e) => Err(e),
        }
    }

    async fn authenticate(&self, email: &str, password: &str) -> AppResult<i64> {
        let email = normalize_email(email);

        let Some((id, hashed_password)) = self.hashed_password_by_email(&email).await? else {
            let password = password.to_string();
            tokio::task::spawn_blocking(move || password::verify_against_dummy(&password))
                .await
                .map_err(|e| AppError::Internal(format!("password task failed: {e}")))?;
            return Err(AppError::InvalidCredentials);
        };

        if verify(password.to_string(), hashed_password).await? {
            Ok(id)
        } else {
            Err(AppError::InvalidCredentials)
        }
    }

    async fn get(&self, id: i64) -> AppResult<User> {
        with_deadline(
            self.deadline,
            sqlx::query_as::<_, User>(
                "SELECT id, name, email, hashed_password, created_at FROM users WHERE id = ?",
            )
            .bind(id)
            .fetch_optional(&self.pool),
        )
        .await?
        .ok_or(AppError::NotFound)
    }

    async fn exists(&self, id: i64) -> AppResult<bool> {
        let found = with_deadline(
            self.deadline,
            sqlx::query_scalar::<_, i64>("SELECT EXISTS(SELECT 1 FROM users WHERE id = ?)")
                .bind(id)
                .fetch_one(&self.pool),
        )
        .await?;
        Ok(found != 0)
    }

    async fn update_password(&self, id: i64, current: &str, new: &str) -> AppResult<()> {
        let hashed_password = self
            .hashed_password_by_id(id)
            .await?
            .ok_or(AppError::NotFound)?;

        if !verify(current.to_string(), hashed_password).await? {
            return Err(AppError::InvalidCredentials);
        }

        let hashed_password = hash(new.to_string()).await?;
        with_deadline(
            self.deadline,
            sqlx::query("UPDATE users SET hashed_password = ? WHERE id = ?")
                .bind(&hashed_password)
                .bind(id)
                .execute(&self.pool),
        )
        .await?;

        tracing::info!(user_id = id, "password updated");
        Ok(())
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

async fn hash(password: String) -> AppResult<String> {
    tokio::task::spawn_blocking(move || password::hash_password(&password))
        .await
        .map_err(|e| AppError::Internal(format!("password task failed: {e}")))?
        .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))
}

async fn verify(password: String, hashed_password: String) -> AppResult<bool> {
    tokio::task::spawn_blocking(move || password::verify_password(&password, &hashed_password))
        .await
        .map_err(|e| AppError::Internal(format!("password task failed: {e}")))?
        .map_err(|e| AppError::Internal(format!("stored password hash is unreadable: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::in_memory;
    use assert_matches::assert_matches;

    async fn store() -> (SqliteUserStore, SqlitePool) {
        let pool = in_memory().await.unwrap();
        (SqliteUserStore::new(pool.clone(), Duration::from_secs(30)), pool)
    }

    async fn user_count(pool: &SqlitePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn insert_then_authenticate() {
        let (users, _) = store().await;
        let id = users
            .insert("Alice", "alice@example.com", "password123")
            .await
            .unwrap();

        assert_eq!(users.authenticate("alice@example.com", "password123").await.unwrap(), id);
        assert_eq!(users.authenticate("  ALICE@example.com ", "password123").await.unwrap(), id);
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_look_the_same() {
        let (users, _) = store().await;
        users.insert("Alice", "alice@example.com", "password123").await.unwrap();

        let wrong = users.authenticate("alice@example.com", "wrongpass").await;
        let unknown = users.authenticate("bob@example.com", "password123").await;

        assert_matches!(wrong, Err(AppError::InvalidCredentials));
        assert_matches!(unknown, Err(AppError::InvalidCredentials));
    }

    #[tokio::test]
    async fn duplicate_email_in_any_case_creates_nothing() {
        let (users, pool) = store().await;
        users.insert("Alice", "alice@example.com", "password123").await.unwrap();

        let again = users.insert("Alicia", "Alice@Example.com", "another-pass").await;
        assert_matches!(again, Err(AppError::DuplicateEmail));
        assert_eq!(user_count(&pool).await, 1);
    }

    #[tokio::test]
    async fn blank_fields_are_rejected() {
        let (users, pool) = store().await;
        let result = users.insert("  ", "", "secret-pass").await;
        assert_matches!(result, Err(AppError::Validation(fields)) => {
            assert!(fields.contains_key("name"));
            assert!(fields.contains_key("email"));
        });
        assert_eq!(user_count(&pool).await, 0);
    }

    #[tokio::test]
    async fn password_is_not_stored_in_plaintext() {
        let (users, _) = store().await;
        let id = users.insert("Alice", "alice@example.com", "password123").await.unwrap();
        let user = users.get(id).await.unwrap();
        assert_ne!(user.hashed_password, "password123");
        assert!(user.hashed_password.starts_with("$argon2id$"));
    }

    #[tokio::test]
    async fn get_and_exists() {
        let (users, _) = store().await;
        let id = users.insert("Alice", "alice@example.com", "password123").await.unwrap();

        assert_eq!(users.get(id).await.unwrap().name, "Alice");
        assert!(users.exists(id).await.unwrap());
        assert!(!users.exists(id + 1).await.unwrap());
        assert_matches!(users.get(id + 1).await, Err(AppError::NotFound));
    }

    #[tokio::test]
    async fn update_password_checks_current() {
        let (users, _) = store().await;
        let id = users.insert("Alice", "alice@example.com", "password123").await.unwrap();

        assert_matches!(
            users.update_password(id, "not-it", "new-password").await,
            Err(AppError::InvalidCredentials)
        );

        users.update_password(id, "password123", "new-password").await.unwrap();
        assert_matches!(
            users.authenticate("alice@example.com", "password123").await,
            Err(AppError::InvalidCredentials)
        );
        assert_eq!(users.authenticate("alice@example.com", "new-password").await.unwrap(), id);
    }
}
