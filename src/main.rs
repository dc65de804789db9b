use std::path::{Path, PathBuf};
use std::sync::Arc;

use crypto_portfolio::api::{build_router, AppState};
use crypto_portfolio::config::AppConfig;
use crypto_portfolio::exchange::registry::ExchangeRegistry;
use crypto_portfolio::portfolio::PortfolioAggregator;
use crypto_portfolio::storage::SnapshotStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = AppConfig::load()?;
    let store = SnapshotStore::open(Path::new(config.database.path.as_ref()))?;
    let registry = Arc::new(ExchangeRegistry::new(config.clone()));
    let aggregator = PortfolioAggregator::new(registry);

    let state = Arc::new(AppState {
        aggregator,
        store,
        exchanges: config.exchanges.clone(),
        comparative_dir: PathBuf::from(config.history.comparative_dir.as_ref()),
    });

    let addr = format!("{}:{}", config.api.host, config.api.port);
    log::info!("listening on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}
