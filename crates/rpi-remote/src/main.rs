//! rpi-remote entry point.
//!
//! Loads configuration from the environment and serves HTTP until Ctrl-C or
//! SIGTERM.

use rpi_remote::{http, AgentConfig, Dispatcher};
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing - logs go to stderr
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("rpi_remote=info".parse()?))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = AgentConfig::from_env()?;
    tracing::info!(?config, "Configuration loaded");

    if config.token.is_none() {
        tracing::warn!(
            "RPI_REMOTE_TOKEN is not set: any client reaching {} can run commands",
            config.http_addr
        );
    }

    let dispatcher = Dispatcher::from_config(&config);

    http::serve(dispatcher, config.http_addr, shutdown_signal()).await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
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

    tracing::info!("Received shutdown signal");
}
