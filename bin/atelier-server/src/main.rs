//! atelier-server – entry point.
//!
//! Startup order:
//! 1. Layer `.env` files into the environment and parse configuration.
//! 2. Initialise structured tracing (JSON or pretty, stdout or rolling file).
//! 3. Open the SQLite database and run pending migrations.
//! 4. Create the bootstrap admin and apply the retrieval seed file.
//! 5. Wire the model layer into the shared state.
//! 6. Build the Axum router and serve with graceful shutdown.

mod auth;
mod config;
mod entities;
mod error;
mod middleware;
mod routes;
mod schemas;
mod state;
mod studio;
mod telemetry;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::Config;
use crate::entities::SqliteStore;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Configuration ───────────────────────────────────────────────────────
    let dotenv_files = config::load_dotenv();
    let cfg = Config::from_env();

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    // Dropping the guard would lose buffered log lines.
    let _log_guard = telemetry::init(&cfg);
    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %cfg.environment,
        "atelier-server starting"
    );
    for file in &dotenv_files {
        info!(path = %file.display(), "loaded dotenv file");
    }
    cfg.validate()?;

    // ── 3. Database ────────────────────────────────────────────────────────────
    let store = SqliteStore::connect(&cfg.database_url).await?;
    info!(database_url = %cfg.database_url, "database ready");

    // ── 4. Bootstrap admin + retrieval documents ───────────────────────────────
    auth::bootstrap_admin(&cfg, &store).await?;
    studio::knowledge::seed_documents(&store, cfg.rag_seed_path.as_deref()).await?;

    // ── 5. Shared application state ────────────────────────────────────────────
    let state = Arc::new(AppState::build(cfg.clone(), store)?);

    // ── 6. HTTP server with graceful shutdown ──────────────────────────────────
    let app = routes::build(Arc::clone(&state));
    let addr: SocketAddr = cfg.bind_address.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("atelier-server stopped");
    Ok(())
}

/// Returns a future that resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received; starting graceful shutdown");
}
