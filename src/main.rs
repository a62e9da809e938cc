use rbac_engine::{
    api::create_router,
    config::Config,
    engine::PolicyEngine,
    observability::{init_tracing, HealthChecker},
};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;
    config.validate()?;

    init_tracing(&config.observability);

    tracing::info!("Starting RBAC policy engine");
    tracing::info!(server = ?config.server, audit_mode = ?config.audit.mode, "Configuration loaded");

    let engine = PolicyEngine::connect(&config).await?;

    let health_checker = Arc::new(HealthChecker::new(engine.pool()));
    let app = create_router(health_checker, config.observability.metrics_enabled);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Ops listener on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    engine.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
