use anyhow::Context;
use oxichat::bootstrap;
use oxichat::config::Config;
use oxichat::infrastructure::http::build_router;
use oxichat::infrastructure::observability;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::from_env().context("failed to load configuration")?;

    let _observability = observability::init(&config)?;
    tracing::info!("Configuration loaded for {}", config.service_name);

    // Build application state (and start background services)
    let state = bootstrap::build_app_state(&config);

    // Build router
    let app = build_router(state);

    // Start server
    let addr = config.server_address();
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
