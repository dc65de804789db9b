use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::config::AppConfig;
use crate::error::ExchangeError;

use super::data::binance::BinanceExchange;
use super::data::coinbase::CoinbaseExchange;
use super::data::kraken::KrakenExchange;
use super::domain::exchange::{Exchange, ExchangeName};

/// Seam the aggregator is injected with; implemented by the registry and by
/// test doubles.
pub trait ExchangeProvider: Send + Sync {
    fn create(&self, name: ExchangeName) -> Arc<dyn Exchange>;
}

/// Maps an exchange name to a shared adapter instance.
///
/// At most one adapter (and thus one vendor client, with its connection pool
/// and rate-limit counters) exists per exchange per process: construction is
/// create-if-absent under a mutex and does no I/O, so the lock is never held
/// across a network call.
pub struct ExchangeRegistry {
    config: AppConfig,
    adapters: Mutex<HashMap<ExchangeName, Arc<dyn Exchange>>>,
}

impl ExchangeRegistry {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            adapters: Mutex::new(HashMap::new()),
        }
    }

    /// Parse a symbolic name and create its adapter. Unrecognized names fail
    /// with `UnknownExchange`.
    pub fn create_by_name(&self, name: &str) -> Result<Arc<dyn Exchange>, ExchangeError> {
        let parsed: ExchangeName = name
            .parse()
            .map_err(|_| ExchangeError::UnknownExchange(name.to_string()))?;
        Ok(self.create(parsed))
    }

    fn build(&self, name: ExchangeName) -> Arc<dyn Exchange> {
        match name {
            ExchangeName::Binance => Arc::new(BinanceExchange::new(&self.config.binance)),
            ExchangeName::Kraken => Arc::new(KrakenExchange::new(&self.config.kraken)),
            ExchangeName::Coinbase => Arc::new(CoinbaseExchange::new(&self.config.coinbase)),
        }
    }
}

impl ExchangeProvider for ExchangeRegistry {
    fn create(&self, name: ExchangeName) -> Arc<dyn Exchange> {
        let mut adapters = self.adapters.lock().expect("registry mutex poisoned");
        if let Some(adapter) = adapters.get(&name) {
            return Arc::clone(adapter);
        }
        let adapter = self.build(name);
        adapters.insert(name, Arc::clone(&adapter));
        adapter
    }
}
