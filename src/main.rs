//! # Snippetbox Server
//!
//! Entry point: logging, configuration, state, the session reaper and the
//! HTTP server with graceful shutdown.
//!
//! ## Startup Sequence
//! 1. Install the `tracing` subscriber (`RUST_LOG` wins over the default filter)
//! 2. Load [`Config`] from the environment
//! 3. Open the database and run migrations ([`AppState::new`])
//! 4. Start the background task that sweeps expired sessions
//! 5. Bind the listener and serve until SIGINT or SIGTERM
//!
//! ## Shutdown
//! On a signal the server stops accepting connections and waits for
//! in-flight requests. If they take longer than `SHUTDOWN_TIMEOUT_SECS` the
//! process exits regardless.

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use snippetbox::config::Config;
use snippetbox::router;
use snippetbox::state::AppState;

/// How often expired sessions are swept out of memory.
const REAP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG overrides the default filter
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,snippetbox=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    tracing::info!(
        host = %config.host,
        port = config.port,
        database_url = %config.database_url,
        session_idle_timeout_secs = config.session_idle_timeout.as_secs(),
        store_timeout_ms = config.store_timeout.as_millis() as u64,
        "configuration loaded"
    );

    let state = AppState::new(&config).await?;
    tracing::info!("application state initialized");

    let reaper = Arc::clone(&state.sessions).spawn_reaper(REAP_INTERVAL);

    let app = router::app(state);

    let bind_addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "starting server");

    let stopping = Arc::new(Notify::new());
    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown({
        let stopping = Arc::clone(&stopping);
        async move {
            shutdown_signal().await;
            stopping.notify_one();
        }
    })
    .into_future();

    // In-flight requests get `shutdown_timeout` to finish once a signal arrives.
    tokio::select! {
        result = server => result?,
        () = async {
            stopping.notified().await;
            tokio::time::sleep(config.shutdown_timeout).await;
        } => {
            tracing::warn!(
                timeout_secs = config.shutdown_timeout.as_secs(),
                "in-flight requests did not finish in time, exiting anyway"
            );
        }
    }

    reaper.abort();
    tracing::info!("graceful shutdown complete");
    Ok(())
}

/// Wait for SIGINT or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}
