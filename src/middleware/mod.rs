//! # Middleware Module
//!
//! Every request passes through the same ordered pipeline before it reaches
//! a handler. Each stage is a plain `(request, next) -> response` function
//! and may answer on its own without calling `next`.
//!
//! ## Order
//! 1. `recover`: a span naming the request, then `CatchPanicLayer` turning a
//!    panic anywhere below into a generic 500
//! 2. `secure_headers`: security headers on every response
//! 3. `log_request`: method, path, protocol and remote address
//! 4. `load_session`: session handle into request extensions, `Set-Cookie` out
//! 5. `verify_csrf`: state-changing requests need the session's token
//! 6. `authenticate`: `AuthState` into request extensions
//!
//! `require_authentication` is not part of the global pipeline; the router
//! installs it on protected routes only, after all of the above.

pub mod auth;
pub mod csrf;
pub mod headers;
pub mod logging;
pub mod recover;
pub mod session;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    Router,
};
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;

use crate::state::AppState;

pub use auth::{authenticate, require_authentication};
pub use csrf::verify_csrf;
pub use headers::secure_headers;
pub use logging::log_request;
pub use session::load_session;

/// Wrap `router` in the global pipeline. `ServiceBuilder` runs the first
/// layer outermost.
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    router.layer(
        ServiceBuilder::new()
            .layer(from_fn(recover::request_span))
            .layer(CatchPanicLayer::custom(recover::panic_response))
            .layer(from_fn(secure_headers))
            .layer(from_fn(log_request))
            .layer(from_fn_with_state(state.clone(), load_session))
            .layer(from_fn(verify_csrf))
            .layer(from_fn_with_state(state, authenticate)),
    )
}
