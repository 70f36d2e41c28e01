//! # Application State
//!
//! Resources shared by every request: the two stores, the session manager
//! and the configuration. Axum clones the state for each request; every field
//! is behind an `Arc`, so a clone only bumps reference counts.
//!
//! ## Stores as Trait Objects
//! Handlers only see `Arc<dyn UserStore>` and `Arc<dyn SnippetStore>`. The
//! server plugs in the SQLite implementations. Tests plug in wrappers that
//! count calls, through [`AppState::with_stores`], without touching any
//! handler.
//!
//! ## Thread Safety
//! The stores are `Send + Sync` by trait bound. The session manager does its
//! own locking per record, so no field here needs an outer `Mutex`.

use std::sync::Arc;

use anyhow::Result;

use crate::config::Config;
use crate::db::{self, SnippetStore, SqliteSnippetStore, SqliteUserStore, UserStore};
use crate::session::SessionManager;

/// Shared application state, handed to handlers through `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    /// Credential store
    pub users: Arc<dyn UserStore>,

    /// Snippet store
    pub snippets: Arc<dyn SnippetStore>,

    /// Server-side sessions. The only mutable per-user state.
    pub sessions: Arc<SessionManager>,

    pub config: Arc<Config>,
}

impl AppState {
    /// Connect to the database, apply migrations and build the stores.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or a migration fails.
    pub async fn new(config: &Config) -> Result<Self> {
        let pool = db::connect(&config.database_url, config.store_timeout).await?;
        db::migrate(&pool).await?;
        tracing::info!("database migrations applied");

        Ok(Self::with_stores(
            config.clone(),
            Arc::new(SqliteUserStore::new(pool.clone(), config.store_timeout)),
            Arc::new(SqliteSnippetStore::new(pool, config.store_timeout)),
        ))
    }

    /// Assemble state around already-built stores.
    pub fn with_stores(
        config: Config,
        users: Arc<dyn UserStore>,
        snippets: Arc<dyn SnippetStore>,
    ) -> Self {
        Self {
            users,
            snippets,
            sessions: Arc::new(SessionManager::new(config.session_idle_timeout)),
            config: Arc::new(config),
        }
    }
}
