//! linebatch coordinator - Main entry point

use anyhow::Result;
use linebatch_common::logging::{init_logging, LogConfig};
use std::{net::SocketAddr, time::Duration};
use tokio::signal;
use tracing::info;

use linebatch_server::{api, config::Config, coordinator::Coordinator};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging with configuration from environment
    let log_config = LogConfig::builder()
        .log_file_prefix("linebatch-server")
        .filter_directives("linebatch_server=debug,tower_http=debug")
        .build();

    // Merge with environment variables (they take precedence)
    let log_config = log_config.clone().merge_env().unwrap_or(log_config);

    let _log_guard = init_logging(&log_config)?;

    info!("Starting linebatch coordinator");

    // Load configuration
    let config = Config::load()?;
    info!(
        dataset = %config.dataset.path.display(),
        state_dir = %config.state.dir.display(),
        batch_size = config.dataset.batch_size,
        "Configuration loaded - server will bind to {}:{}",
        config.server.host,
        config.server.port
    );

    // Index scan can take minutes on the full dataset
    let coordinator = {
        let config = config.clone();
        tokio::task::spawn_blocking(move || Coordinator::open(&config)).await??
    };

    let app = api::router(coordinator);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(config.server.shutdown_timeout_secs))
        .await?;

    info!("Server shut down gracefully");

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal(timeout_secs: u64) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }

    // State is flushed per request, so there is nothing to persist here
    info!("Waiting up to {} seconds for connections to close", timeout_secs);
    tokio::time::sleep(Duration::from_secs(timeout_secs.min(5))).await;
}
