mod config;
mod error;
mod handlers;
mod rpc;
mod scene;

use config::ServiceConfig;
use handlers::SceneService;
use rpc::RpcClient;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = ServiceConfig::from_env();

    info!("Scene service starting: {}", config.service_id);
    info!("  Broker: {}", config.broker_addr);
    info!("  Device managers: {}", config.device_manager_routes.join(", "));
    info!("  Max parallel commands: {}", config.max_parallel_commands);

    let transport = Arc::new(RpcClient::connect(&config));
    let service = Arc::new(SceneService::new(&config, transport));

    let listener = TcpListener::bind(&config.listen_addr).await?;
    info!("Listening for scene requests on {}", config.listen_addr);

    rpc::serve(listener, service).await
}
