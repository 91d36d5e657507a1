mod config;
mod router;
mod session;
mod store;

use config::ManagerConfig;
use router::Router;
use session::PeerSession;
use std::sync::Arc;
use store::DeviceStore;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = ManagerConfig::from_env();

    let store = match &config.seed_path {
        Some(path) => DeviceStore::load_seed(path)?,
        None => DeviceStore::new(),
    };
    info!("Device manager {} on route {}: {} devices", config.manager_id, config.route, store.len().await);

    let router = Arc::new(Router::new(config.route.clone(), Arc::new(store)));
    let sender_id: Arc<str> = Arc::from(config.manager_id.as_str());

    let listener = TcpListener::bind(&config.listen_addr).await?;
    info!("Listening on {}", config.listen_addr);

    loop {
        let (socket, addr) = listener.accept().await?;
        info!("Connection from: {}", addr);

        let router = router.clone();
        let sender_id = sender_id.clone();
        tokio::spawn(async move {
            match PeerSession::new(socket, addr).run(router, sender_id).await {
                Ok(()) => info!("Client disconnected: {}", addr),
                Err(e) => warn!("Dropping {}: {}", addr, e),
            }
        });
    }
}
