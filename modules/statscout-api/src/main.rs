use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use statscout_api::{app, AppState};
use statscout_common::Config;
use statscout_engine::build_orchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("statscout=info".parse()?))
        .init();

    let config = Config::from_env();
    config.log_redacted();

    let state = Arc::new(AppState {
        orchestrator: build_orchestrator(&config)?,
    });

    let addr = format!("{}:{}", config.api_host, config.api_port);
    info!("StatScout control server starting on {addr}");
    info!("Dashboard available at http://{addr}/");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}
