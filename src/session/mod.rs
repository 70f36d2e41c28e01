//! # Sessions
//!
//! Server-side session state keyed by an opaque token. The client only ever
//! holds the token (in the `session` cookie); the data stays here.
//!
//! - `manager`: the token → record map, expiry, token rotation
//! - `handle`: the request-scoped [`Session`] handed to handlers
//!
//! Expiry is a sliding idle timeout: every successful access pushes the
//! deadline forward. An expired session behaves exactly like a missing one.

mod handle;
mod manager;

pub use handle::{Session, TokenChange};
pub use manager::SessionManager;

use base64::prelude::*;
use rand::RngCore;
use thiserror::Error;

/// Name of the cookie carrying the session token.
pub const COOKIE_NAME: &str = "session";

/// Session key holding the logged-in user's id.
pub const AUTHENTICATED_USER_ID: &str = "authenticatedUserID";
/// Session key holding the per-session CSRF token.
pub const CSRF_TOKEN: &str = "csrfToken";
/// Session key holding the one-shot flash message.
pub const FLASH: &str = "flash";
/// Session key remembering where to go after the login form.
pub const REDIRECT_AFTER_LOGIN: &str = "redirectPathAfterLogin";

#[derive(Debug, Error)]
pub enum SessionError {
    /// The token is unknown, expired, or was rotated away.
    #[error("unknown or expired session token")]
    Unknown,

    #[error("session value could not be converted: {0}")]
    Serde(#[from] serde_json::Error),
}

/// 256 bits from the OS-seeded thread RNG, base64url without padding.
pub(crate) fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    BASE64_URL_SAFE_NO_PAD.encode(bytes)
}
