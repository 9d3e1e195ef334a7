use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use qlens::config::Config;
use qlens::dashboard::start_dashboard_server;
use qlens::store::{RespStore, StoreClient};
use qlens::QlensEngine;

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("🚀 qlens v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "📦 Store {}:{} (db {}), queue prefix '{}'",
        config.store.host,
        config.store.port,
        config.store.db,
        config.queues.prefix
    );

    // Connects lazily: the dashboard stays up while the store is down
    let store: Arc<dyn StoreClient> = Arc::new(RespStore::new(config.store.clone()));
    let engine = QlensEngine::new(&config, store);
    engine.start_background_tasks(&config);

    if let Err(e) = start_dashboard_server(engine, &config.server.addr()).await {
        tracing::error!("Dashboard server failed: {}", e);
        std::process::exit(1);
    }
}
