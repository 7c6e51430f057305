use std::net::SocketAddr;

use anyhow::{Context, Result};
use tokio::net::TcpListener;

use crate::config::Config;
use crate::endpoints;
use crate::service::ContentService;

/// Starts the HTTP server based on loaded config.
pub fn run(config: Config) -> Result<()> {
    let megs = 1024 * 1024;
    let web_pool = tokio::runtime::Builder::new_multi_thread()
        .thread_name("procache-web")
        .enable_all()
        .thread_stack_size(8 * megs)
        .build()?;

    let service = ContentService::create(config.clone()).context("failed to create service")?;
    let socket = config
        .bind
        .parse::<SocketAddr>()
        .with_context(|| format!("invalid bind address `{}`", config.bind))?;

    web_pool.block_on(async move {
        let listener = TcpListener::bind(socket)
            .await
            .with_context(|| format!("failed to bind {socket}"))?;
        tracing::info!("Starting HTTP server on {}", socket);

        axum::serve(listener, endpoints::create_app(service))
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("HTTP server failed")
    })?;

    tracing::info!("System shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(
            error = &e as &dyn std::error::Error,
            "Failed to listen for shutdown signal",
        );
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
