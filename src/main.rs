//! MarketMind entrypoint
//!
//! Boots the store from disk, wires the reactive subscriptions,
//! starts the market feed and runs until Ctrl-C.

use anyhow::Result;
use marketmind::config::AppConfig;
use marketmind::market::MarketFeed;
use marketmind::persistence::KvStore;
use marketmind::store::Store;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load()?;
    info!("🚀 MarketMind starting");
    info!("{}", config.digest());

    let kv = KvStore::open(&config.persistence.data_dir)?;
    let store = Arc::new(Store::with_persistence(kv));
    store.wire_subscriptions();

    let feed = Arc::new(MarketFeed::new(&config, Arc::clone(&store))?);
    feed.start().await;
    info!("✅ Market feed running");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    feed.destroy();
    store.persist();
    info!("💾 State saved");
    Ok(())
}
