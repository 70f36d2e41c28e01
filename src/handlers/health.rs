//! # Health Check Handler
//!
//! Liveness check for load balancers and monitoring. Touches neither store,
//! so it answers even while the database is unavailable.

/// GET /ping
pub async fn ping() -> &'static str {
    "OK"
}
