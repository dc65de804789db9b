use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;

use crate::error::ExchangeError;
use crate::exchange::domain::exchange::{
    AccountDetails, Exchange, ExchangeName, DUST_THRESHOLD,
};
use crate::exchange::domain::portfolio::PortfolioLine;
use crate::exchange::registry::ExchangeProvider;

/// Sentinel for "no reliable price" inside a spot price map.
const PRICE_UNAVAILABLE: f64 = -1.0;

/// Bounded fan-out for spot lookups within one exchange, sized for vendor
/// rate limits.
const SPOT_CONCURRENCY: usize = 3;

const CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Joins per-exchange balances with spot prices into one merged portfolio.
///
/// Failures degrade gracefully: a failed spot lookup leaves that line without
/// a valuation, a failed exchange contributes nothing, and neither aborts the
/// remaining work.
pub struct PortfolioAggregator {
    provider: Arc<dyn ExchangeProvider>,
    call_timeout: Duration,
}

impl PortfolioAggregator {
    pub fn new(provider: Arc<dyn ExchangeProvider>) -> Self {
        Self {
            provider,
            call_timeout: CALL_TIMEOUT,
        }
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Output order: exchange processing order, then the vendor's balance
    /// order within each exchange.
    pub async fn aggregate(&self, exchanges: &[ExchangeName]) -> Vec<PortfolioLine> {
        let mut merged = Vec::new();
        for &name in exchanges {
            match self.aggregate_exchange(name).await {
                Ok(mut lines) => merged.append(&mut lines),
                Err(e) => log::error!("{name}: skipping exchange in aggregation: {e}"),
            }
        }
        merged
    }

    async fn aggregate_exchange(
        &self,
        name: ExchangeName,
    ) -> Result<Vec<PortfolioLine>, ExchangeError> {
        let adapter = self.provider.create(name);

        let details = tokio::time::timeout(
            self.call_timeout,
            adapter.account_details(false, true, DUST_THRESHOLD),
        )
        .await
        .map_err(|_| ExchangeError::VendorCall(format!("{name}: account details timed out")))??;

        let AccountDetails::Portfolio { mut lines, assets } = details else {
            return Err(ExchangeError::VendorCall(format!(
                "{name}: expected portfolio account details"
            )));
        };

        let spots = self.spot_prices(&adapter, &assets).await;

        for line in &mut lines {
            let symbol = format!("{}{}", line.asset, adapter.usd_quote());
            line.amount_usd = match spots.get(&symbol) {
                Some(&price) if price > 0.0 => Some(price * line.quantity),
                _ => None,
            };
        }
        Ok(lines)
    }

    /// Build the per-exchange spot price map, one lookup per distinct asset.
    /// A failed or timed-out lookup records the unavailable sentinel.
    async fn spot_prices(
        &self,
        adapter: &Arc<dyn Exchange>,
        assets: &[String],
    ) -> HashMap<String, f64> {
        let quote = adapter.usd_quote();
        let interval = adapter.default_spot_interval();
        let timeout = self.call_timeout;

        futures::stream::iter(assets.iter().cloned())
            .map(|asset| {
                let adapter = Arc::clone(adapter);
                async move {
                    let price = match tokio::time::timeout(
                        timeout,
                        adapter.spot_pair(&asset, quote, interval),
                    )
                    .await
                    {
                        Ok(price) if price > 0.0 => price,
                        Ok(_) => PRICE_UNAVAILABLE,
                        Err(_) => {
                            log::warn!("{}: spot lookup for {asset} timed out", adapter.name());
                            PRICE_UNAVAILABLE
                        }
                    };
                    (format!("{asset}{quote}"), price)
                }
            })
            .buffer_unordered(SPOT_CONCURRENCY)
            .collect()
            .await
    }
}
