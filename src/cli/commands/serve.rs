use anyhow::Context;
use tracing::info;

use crate::app::{router, AppState};
use crate::cli::utils::build_services;
use crate::config::AppConfig;

pub async fn handle(config: AppConfig, memory: bool) -> anyhow::Result<()> {
    info!("Starting Finance Tracker API in {:?} mode", config.environment);

    let services = build_services(&config, memory).await?;
    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let app = router(AppState::new(config, services));

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    info!("Listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
