//! Skerry server entry point.
//!
//! Connects to the container engine, serves the HTTP control plane and
//! removes every sandbox on Ctrl-C when auto-cleanup is enabled.

use skerry_core::SandboxManager;
use skerry_runtime::DockerRuntime;
use skerry_server::{http, ServerConfig, SkerryServer};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("skerry=info".parse()?))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting Skerry server");

    // Load configuration from environment
    let config = ServerConfig::from_env();
    tracing::info!(?config, "Configuration loaded");
    config.validate()?;

    let runtime = DockerRuntime::connect(config.docker_host.as_deref()).await?;
    tracing::info!("Container engine reachable");

    let manager = Arc::new(SandboxManager::new(
        config.manager_config()?,
        Arc::new(runtime),
    )?);
    let server = SkerryServer::new(Arc::clone(&manager));

    let (shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(1);

    let http_server = server.clone();
    let http_addr = config.http_addr;
    let http_handle = tokio::spawn(async move {
        let shutdown = async move {
            let _ = shutdown_rx.recv().await;
        };

        if let Err(e) = http::serve(http_server, http_addr, shutdown).await {
            tracing::error!(error = %e, "HTTP server error");
        }
    });
    tracing::info!(http_addr = %config.http_addr, "Server ready");

    // Wait for shutdown signal
    signal::ctrl_c().await?;
    tracing::info!("Received shutdown signal, cleaning up...");

    let _ = shutdown_tx.send(());
    let _ = http_handle.await;

    if config.auto_cleanup {
        server.close_all().await;
        manager.cleanup_all().await;
        tracing::info!("All sandboxes cleaned up");
    } else {
        server.detach_all().await;
        tracing::info!(
            sandboxes = manager.count(),
            "Auto-cleanup disabled, leaving sandboxes running"
        );
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}
