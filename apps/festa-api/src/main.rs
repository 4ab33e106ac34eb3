//! # Festa API server
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Client ───► HTTP (8080) ───► LedgerService ───► SQLite                │
//! │                                     │                                   │
//! │                                     ▼                                   │
//! │                              Projector task                             │
//! │                              (live stats)                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::error::Error;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use festa_api::{router, AppState};
use festa_db::Database;
use festa_ledger::{JwtManager, LedgerConfig, LedgerService};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    info!("Starting Festa API server...");

    let config = LedgerConfig::load(None)?;
    info!(
        db_path = %config.database.path.display(),
        bind = %config.server.bind_address(),
        "Configuration loaded"
    );

    let db = Database::new(config.db_config()).await?;
    info!("Database ready");

    let (service, projector_task) = LedgerService::start(db.clone(), &config);
    let jwt = JwtManager::new(&config.auth.jwt_secret, config.auth.token_lifetime_secs);
    let app = router(AppState::new(service.clone(), jwt));

    let addr = config.server.bind_address();
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Drain queued projector events before the pool closes.
    service.shutdown().await?;
    projector_task.await?;
    db.close().await;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
