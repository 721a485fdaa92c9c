mod events;
mod problem;
mod router;
mod session;
mod sweeper;
mod telemetry;

use std::{net::SocketAddr, sync::Arc};

use tracing::info;

use rackview_api::WarehouseClient;
use rackview_util::{load_env_file, AppConfig};

use crate::session::SessionRegistry;
use crate::sweeper::SessionSweeper;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_env_file();
    let config = AppConfig::from_env()?;

    telemetry::init_tracing(&config)?;
    let metrics = telemetry::init_metrics()?;

    let http = reqwest::Client::builder()
        .timeout(config.warehouse_api.timeout)
        .build()?;
    let client = WarehouseClient::new(
        config.warehouse_api.base_url.clone(),
        config.warehouse_api.token.clone(),
        http,
    );
    info!(stage = "app", api = %config.warehouse_api.base_url, "warehouse client configured");

    let sessions = SessionRegistry::new(Arc::new(client));
    SessionSweeper::new(
        sessions.clone(),
        config.session_ttl,
        config.session_sweep_interval,
    )
    .spawn();
    let state = router::AppState::new(metrics, sessions, config.sse_heartbeat);

    let addr: SocketAddr = config.bind_addr;
    info!(stage = "app", %addr, env = %config.environment.as_str(), "starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router::app_router(state))
        .await
        .map_err(|err| err.into())
}
