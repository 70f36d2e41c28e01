#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use tower::ServiceExt;

use snippetbox::config::Config;
use snippetbox::db::{
    self,
    models::{Snippet, User},
    SnippetStore, SqliteSnippetStore, SqliteUserStore, UserStore,
};
use snippetbox::error::AppResult;
use snippetbox::router;
use snippetbox::state::AppState;

pub const PASSWORD: &str = "pa$$word123";

/// Counts every call made through either store.
#[derive(Debug, Default)]
pub struct StoreCalls(AtomicUsize);

impl StoreCalls {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct CountingUsers {
    inner: SqliteUserStore,
    calls: Arc<StoreCalls>,
}

#[async_trait]
impl UserStore for CountingUsers {
    async fn insert(&self, name: &str, email: &str, password: &str) -> AppResult<i64> {
        self.calls.hit();
        self.inner.insert(name, email, password).await
    }

    async fn authenticate(&self, email: &str, password: &str) -> AppResult<i64> {
        self.calls.hit();
        self.inner.authenticate(email, password).await
    }

    async fn get(&self, id: i64) -> AppResult<User> {
        self.calls.hit();
        self.inner.get(id).await
    }

    async fn exists(&self, id: i64) -> AppResult<bool> {
        self.calls.hit();
        self.inner.exists(id).await
    }

    async fn update_password(&self, id: i64, current: &str, new: &str) -> AppResult<()> {
        self.calls.hit();
        self.inner.update_password(id, current, new).await
    }
}

pub struct CountingSnippets {
    inner: SqliteSnippetStore,
    calls: Arc<StoreCalls>,
}

#[async_trait]
impl SnippetStore for CountingSnippets {
    async fn insert(
        &self,
        title: &str,
        content: &str,
        expires_in: chrono::Duration,
    ) -> AppResult<i64> {
        self.calls.hit();
        self.inner.insert(title, content, expires_in).await
    }

    async fn get(&self, id: i64) -> AppResult<Snippet> {
        self.calls.hit();
        self.inner.get(id).await
    }

    async fn latest(&self, limit: i64) -> AppResult<Vec<Snippet>> {
        self.calls.hit();
        self.inner.latest(limit).await
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub pool: sqlx::SqlitePool,
    pub calls: Arc<StoreCalls>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_routes(router::routes).await
    }

    /// Build the app around custom routes, still behind the full pipeline.
    pub async fn with_routes(routes: impl FnOnce(&AppState) -> Router<AppState>) -> Self {
        let pool = db::in_memory().await.unwrap();
        let config = Config::default();
        let calls = Arc::new(StoreCalls::default());

        let state = AppState::with_stores(
            config.clone(),
            Arc::new(CountingUsers {
                inner: SqliteUserStore::new(pool.clone(), config.store_timeout),
                calls: Arc::clone(&calls),
            }),
            Arc::new(CountingSnippets {
                inner: SqliteSnippetStore::new(pool.clone(), config.store_timeout),
                calls: Arc::clone(&calls),
            }),
        );
        let router = router::build(routes(&state), state.clone());

        Self {
            router,
            state,
            pool,
            calls,
        }
    }

    pub fn client(&self) -> Client {
        Client {
            router: self.router.clone(),
            cookie: None,
        }
    }

    /// Create an account straight through the store.
    pub async fn user(&self, name: &str, email: &str) -> i64 {
        self.state.users.insert(name, email, PASSWORD).await.unwrap()
    }
}

#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    pub fn text(&self) -> String {
        String::from_utf8(self.body.to_vec()).unwrap()
    }

    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
    }

    /// Value of the `session` cookie set by this response, if any.
    pub fn session_cookie(&self) -> Option<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(|value| cookie::Cookie::parse(value.to_string()).ok())
            .find(|cookie| cookie.name() == "session")
            .map(|cookie| cookie.value().to_string())
    }
}

/// A browser-like client: keeps the session cookie between requests.
#[derive(Clone)]
pub struct Client {
    router: Router,
    pub cookie: Option<String>,
}

impl Client {
    pub async fn get(&mut self, path: &str) -> TestResponse {
        let request = self.request("GET", path).body(Body::empty()).unwrap();
        self.send(request).await
    }

    /// POST a form. The fields are sent exactly as given.
    pub async fn post_form(&mut self, path: &str, fields: &[(&str, &str)]) -> TestResponse {
        let body = serde_urlencoded::to_string(fields).unwrap();
        let request = self
            .request("POST", path)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    /// POST a form with the session's CSRF token added.
    pub async fn submit(&mut self, path: &str, fields: &[(&str, &str)]) -> TestResponse {
        let token = self.csrf_token().await;
        let mut fields = fields.to_vec();
        fields.push(("csrf_token", token.as_str()));
        self.post_form(path, &fields).await
    }

    /// The CSRF token of the current session, read from a rendered page.
    ///
    /// Rendering a page consumes any pending flash message.
    pub async fn csrf_token(&mut self) -> String {
        let page = self.get("/about").await;
        page.json()["csrf_token"].as_str().unwrap().to_string()
    }

    pub async fn signup(&mut self, name: &str, email: &str, password: &str) -> TestResponse {
        self.submit(
            "/user/signup",
            &[
                ("name", name),
                ("email", email),
                ("password", password),
                ("password_confirmation", password),
            ],
        )
        .await
    }

    pub async fn login(&mut self, email: &str, password: &str) -> TestResponse {
        self.submit("/user/login", &[("email", email), ("password", password)])
            .await
    }

    fn request(&self, method: &str, path: &str) -> axum::http::request::Builder {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(cookie) = &self.cookie {
            builder = builder.header(header::COOKIE, format!("session={cookie}"));
        }
        builder
    }

    async fn send(&mut self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let (parts, body) = response.into_parts();
        let response = TestResponse {
            status: parts.status,
            headers: parts.headers,
            body: body.collect().await.unwrap().to_bytes(),
        };
        if let Some(cookie) = response.session_cookie() {
            self.cookie = Some(cookie);
        }
        response
    }
}

/// Long enough for a one-second snippet lifetime to run out.
pub const PAST_ONE_SECOND: Duration = Duration::from_millis(1500);
