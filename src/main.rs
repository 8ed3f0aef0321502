//! guiapi server entry point.
//!
//! Serves the demo components over the action channel, page routes and the
//! WebSocket update stream.

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use guiapi::api;
use guiapi::app_state::AppState;
use guiapi::config::{GuiConfig, LogFormat};
use guiapi::demo::{self, ReportOptions};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = GuiConfig::from_env().context("loading configuration")?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
    }
    tracing::info!(addr = %config.listen_addr, "starting guiapi");

    let registry = demo::build_registry(ReportOptions::default())
        .context("registering demo components")?;
    tracing::info!(
        actions = registry.action_names().len(),
        pages = registry.pages().len(),
        streams = registry.stream_names().len(),
        "registry built"
    );

    let shutdown = CancellationToken::new();
    let app = api::build_app(AppState::new(registry, shutdown.clone()), &config)
        .context("mounting routes")?;

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    tokio::spawn(wait_for_ctrl_c(shutdown.clone()));
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .context("serving")?;

    tracing::info!("server stopped");
    Ok(())
}

/// Cancels `shutdown` on Ctrl-C. Open streams observe it through their
/// child tokens and close normally.
async fn wait_for_ctrl_c(shutdown: CancellationToken) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for ctrl-c");
        return;
    }
    tracing::info!("shutdown requested");
    shutdown.cancel();
}
