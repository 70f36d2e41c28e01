//! # HTTP Request Handlers
//!
//! One handler per route. Handlers receive everything explicitly through
//! extractors: shared state, the request's [`Session`](crate::session::Session),
//! its [`AuthState`](crate::auth::AuthState) and the form body.
//!
//! ## Submodules
//! - `health`: `/ping`
//! - `snippets`: home, about, viewing and creating snippets
//! - `users`: signup, login, logout and the account pages
//! - `views`: the `Page` view-models and the single rendering boundary
//!
//! ## Handler Pattern
//! GET handlers render a page. POST handlers either redirect with `303 See
//! Other` after a state change, or render the form again with `422` and the
//! field problems.

pub mod health;
pub mod snippets;
pub mod users;
pub mod views;
