//! Render API server

use anyhow::Context;
use clap::Parser;
use render_api::browser::BrowserController;
use render_api::render::RetryOrchestrator;
use render_api::{server, telemetry, ServerConfig, ServerState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::parse();

    telemetry::init(config.log_filter()).map_err(anyhow::Error::msg)?;

    let addr = config.bind_addr().context("invalid HOST/PORT")?;
    let auth = config.auth_config();
    if !auth.is_enabled() {
        tracing::warn!("AUTH_TOKEN not set; /render is open to anyone who can reach it");
    }

    let engine = BrowserController::with_config(config.browser_config());
    let state = ServerState::new(RetryOrchestrator::new(engine), auth);

    server::serve(addr, state, shutdown_signal())
        .await
        .with_context(|| format!("server on {addr} failed"))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
