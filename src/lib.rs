//! # Snippetbox
//!
//! A small web application for sharing text snippets that expire. Users sign
//! up with email and password; only logged-in users may create snippets,
//! anyone may read them until they expire.
//!
//! ## Request flow
//! Every request passes the middleware pipeline in [`middleware`] before a
//! handler in [`handlers`] runs. Handlers read the session and the
//! authentication state from extractors and talk to the stores in [`db`].

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod session;
pub mod state;
