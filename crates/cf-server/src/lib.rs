//! cf-server: HTTP API for media lookup, proxying, conversion and archiving.
//!
//! This crate ties cf-core and cf-av into a running server application. It
//! provides:
//!
//! - Remote fetching that streams upstream bodies to files or responses
//! - The clip/audio conversion orchestrator with guaranteed scratch cleanup
//! - Best-effort zip archiving of many remote assets into one stream
//! - Axum routes, request-id tracing, static UI serving
//! - Graceful shutdown via signal handling

pub mod archive;
pub mod context;
pub mod convert;
pub mod error;
pub mod fetch;
pub mod middleware;
pub mod resolver;
pub mod router;
pub mod routes;

use std::net::SocketAddr;

use cf_core::config::Config;

use crate::context::AppContext;

/// Start the clipforge server.
///
/// Builds the [`AppContext`] from `config`, binds the listener and serves
/// until a shutdown signal is received.
pub async fn start(config: Config) -> cf_core::Result<()> {
    for warning in config.validate() {
        tracing::warn!("Config warning: {warning}");
    }

    let ctx = AppContext::from_config(config.clone())?;
    for info in ctx.tools.check_all() {
        if info.available {
            tracing::info!(
                "Tool found: {} ({})",
                info.name,
                info.version.as_deref().unwrap_or("unknown version")
            );
        } else {
            tracing::warn!("Tool not found: {}", info.name);
        }
    }
    tracing::info!(
        "Scratch directory: {}",
        ctx.converter.scratch().root().display()
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| cf_core::Error::Internal(format!("Invalid server address: {e}")))?;

    let app = router::build_router(ctx, config.server.static_dir.clone());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| cf_core::Error::Internal(format!("Failed to bind to {addr}: {e}")))?;
    tracing::info!("Listening on {}", listener.local_addr().unwrap_or(addr));

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
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
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
