pub mod api;
pub mod config;
pub mod core_state;
pub mod db;
pub mod matching;
pub mod models;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;
use crate::core_state::CoreState;

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Core(#[from] core_state::CoreError),
    #[error(transparent)]
    Startup(#[from] api::StartupError),
}

/// Process entry point: wire state, scheduler and HTTP server, then run
/// until Ctrl-C or SIGTERM.
pub async fn run() -> Result<(), RunError> {
    // A missing .env is normal.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = ServerConfig::from_env();
    let core = Arc::new(CoreState::open(&config)?);

    let scheduler = matching::background::start_processing_scheduler(
        Arc::clone(&core),
        config.startup_delay,
        config.process_interval,
    );
    let mut server = api::start_api_server(Arc::clone(&core), &config).await?;

    shutdown_signal().await;
    tracing::info!("Shutdown requested");

    server.shutdown();
    scheduler.join().await;
    server.wait().await;

    tracing::info!("{} stopped", config::APP_NAME);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
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
}
