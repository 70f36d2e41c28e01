//! # Routes
//!
//! Protected routes get `require_authentication` as a route layer, so it runs
//! after the global pipeline and only when one of them matched.

use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use tower_http::services::ServeDir;

use crate::handlers::{health, snippets, users};
use crate::middleware::{self, require_authentication};
use crate::state::AppState;

pub fn routes(state: &AppState) -> Router<AppState> {
    let protected = Router::new()
        .route(
            "/snippet/create",
            get(snippets::snippet_create).post(snippets::snippet_create_post),
        )
        .route("/user/logout", post(users::logout_post))
        .route("/account/view", get(users::account_view))
        .route(
            "/account/password/update",
            get(users::password_update).post(users::password_update_post),
        )
        .route_layer(from_fn(require_authentication));

    Router::new()
        .route("/", get(snippets::home))
        .route("/about", get(snippets::about))
        .route("/ping", get(health::ping))
        .route("/snippet/view/{id}", get(snippets::snippet_view))
        .route("/user/signup", get(users::signup).post(users::signup_post))
        .route("/user/login", get(users::login).post(users::login_post))
        .merge(protected)
        .nest_service("/static", ServeDir::new(&state.config.static_dir))
}

/// Put `routes` behind the global middleware pipeline and attach the state.
pub fn build(routes: Router<AppState>, state: AppState) -> Router {
    middleware::apply(routes, state.clone()).with_state(state)
}

/// The complete application.
pub fn app(state: AppState) -> Router {
    build(routes(&state), state)
}
