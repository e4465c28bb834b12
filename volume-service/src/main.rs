use anyhow::Result;
use std::{net::SocketAddr, sync::Arc};
use volume_service::{
    config::AppConfig,
    http::{self, AppState},
    metrics_server, observability,
    store::PgReadingStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    // Load configuration
    let cfg = AppConfig::load()?;

    // Start metrics server if configured
    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    let store = PgReadingStore::connect(cfg.database_url()?, &cfg.database, cfg.server.utc_offset()?).await?;
    let state = AppState::new(Arc::new(store), &cfg)?;
    let app = http::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.server.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, populate = cfg.populate.enabled, "volume service listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("volume service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
