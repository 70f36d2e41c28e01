//! # Configuration Management
//!
//! Configuration comes from the environment (and a `.env` file in
//! development). Nothing is read from disk after startup: [`Config`] is
//! built once in `main` and shared read-only through the app state.
//!
//! ## Environment Variables
//! - `HOST`: Server bind address (default: 127.0.0.1)
//! - `PORT`: Server port (default: 4000)
//! - `DATABASE_URL`: SQLite database connection string
//! - `SESSION_IDLE_TIMEOUT_SECS`: Sliding session lifetime (default: 12 hours)
//! - `SESSION_COOKIE_SECURE`: Mark the session cookie `Secure` (default: false)
//! - `STORE_TIMEOUT_MS`: Deadline for every store call (default: 5000)
//! - `STATIC_DIR`: Directory served under `/static` (default: static)
//! - `SHUTDOWN_TIMEOUT_SECS`: Grace period for in-flight requests (default: 10)
//!
//! ## Parsing Rules
//! Durations are whole numbers in the unit the variable name states. Booleans
//! are `true` or `false`. Surrounding whitespace is ignored, so
//! `PORT=" 4000 "` works.

use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration
///
/// Every field is public and plain data. `Clone` is needed because the
/// state keeps its own copy behind an `Arc` while `main` keeps using the
/// original for the listener and the shutdown timer.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host/IP address to bind to
    /// "127.0.0.1" listens on loopback only, "0.0.0.0" on every interface
    pub host: String,

    /// Server port number
    pub port: u16,

    /// SQLite database connection URL
    /// Format: "sqlite:filename.db?mode=rwc"
    pub database_url: String,

    /// How long a session survives without being used.
    pub session_idle_timeout: Duration,

    /// Whether the session cookie carries the `Secure` attribute.
    /// Enable whenever the server sits behind TLS.
    pub session_cookie_secure: bool,

    /// Deadline applied to each store call and to pool acquisition.
    pub store_timeout: Duration,

    /// Directory of static assets.
    pub static_dir: String,

    /// How long in-flight requests may run after a shutdown signal before
    /// the process exits anyway.
    pub shutdown_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4000,
            database_url: "sqlite:snippetbox.db?mode=rwc".to_string(),
            session_idle_timeout: Duration::from_secs(12 * 60 * 60),
            session_cookie_secure: false,
            store_timeout: Duration::from_millis(5000),
            static_dir: "static".to_string(),
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Unset variables fall back to [`Config::default`]. A variable that is
    /// set but unparsable is an error rather than a silent default.
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists (dotenvy doesn't error if file missing)
        dotenvy::dotenv().ok();

        let defaults = Config::default();

        Ok(Config {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: parse_var("PORT")?.unwrap_or(defaults.port),
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            session_idle_timeout: parse_var("SESSION_IDLE_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.session_idle_timeout),
            session_cookie_secure: parse_var("SESSION_COOKIE_SECURE")?
                .unwrap_or(defaults.session_cookie_secure),
            store_timeout: parse_var("STORE_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.store_timeout),
            static_dir: env::var("STATIC_DIR").unwrap_or(defaults.static_dir),
            shutdown_timeout: parse_var("SHUTDOWN_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.shutdown_timeout),
        })
    }

    /// Get the socket address to bind the server to
    ///
    /// Example: "127.0.0.1:4000"
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Read and parse one variable. Unset is `Ok(None)`; set but malformed is an
/// error naming the variable.
fn parse_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("invalid value for {name}: {raw:?}")),
        Err(_) => Ok(None),
    }
}
