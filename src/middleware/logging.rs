use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    extract::{ConnectInfo, Request},
    middleware::Next,
    response::Response,
};

/// Record who asked for what. Only the path is logged; query strings and
/// headers may carry secrets.
pub async fn log_request(request: Request, next: Next) -> Response {
    let remote_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "-".to_string());
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    tracing::info!(
        ip = %remote_addr,
        proto = ?request.version(),
        %method,
        %path,
        "received request"
    );

    let started = Instant::now();
    let response = next.run(request).await;

    tracing::debug!(
        %method,
        %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "sent response"
    );
    response
}
