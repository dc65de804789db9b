//! Deterministic exchange doubles for aggregation and chunking tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crypto_portfolio::error::ExchangeError;
use crypto_portfolio::exchange::domain::exchange::{
    portfolio_from_balances, AccountDetails, Exchange, ExchangeName, OrderReceipt,
};
use crypto_portfolio::exchange::domain::ohlc::OhlcEntry;
use crypto_portfolio::exchange::registry::ExchangeProvider;

/// Scripted adapter: fixed balances in vendor order, a spot price table, an
/// optional account failure, and hourly candles with an optional gap range.
pub struct MockExchange {
    pub name: ExchangeName,
    pub balances: Vec<(String, f64)>,
    pub spot_prices: HashMap<String, f64>,
    pub fail_account: bool,
    pub candle_gap: Option<(DateTime<Utc>, DateTime<Utc>)>,
    pub cap_candles: bool,
    pub account_delay: Option<std::time::Duration>,
    pub spot_delays: HashMap<String, std::time::Duration>,
    pub ticker_calls: AtomicUsize,
}

impl MockExchange {
    pub fn new(name: ExchangeName) -> Self {
        Self {
            name,
            balances: Vec::new(),
            spot_prices: HashMap::new(),
            fail_account: false,
            candle_gap: None,
            cap_candles: false,
            account_delay: None,
            spot_delays: HashMap::new(),
            ticker_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_balance(mut self, asset: &str, amount: f64) -> Self {
        self.balances.push((asset.to_string(), amount));
        self
    }

    pub fn with_spot(mut self, asset: &str, price: f64) -> Self {
        self.spot_prices.insert(asset.to_string(), price);
        self
    }

    pub fn failing_account(mut self) -> Self {
        self.fail_account = true;
        self
    }

    pub fn with_candle_gap(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.candle_gap = Some((from, to));
        self
    }

    /// Truncate each candle response at `max_candles_per_call`, the way
    /// vendors enforce their per-call limit.
    pub fn capping_candles(mut self) -> Self {
        self.cap_candles = true;
        self
    }

    pub fn with_account_delay(mut self, delay: std::time::Duration) -> Self {
        self.account_delay = Some(delay);
        self
    }

    pub fn with_spot_delay(mut self, asset: &str, delay: std::time::Duration) -> Self {
        self.spot_delays.insert(asset.to_string(), delay);
        self
    }
}

#[async_trait::async_trait]
impl Exchange for MockExchange {
    fn name(&self) -> ExchangeName {
        self.name
    }

    fn usd_quote(&self) -> &'static str {
        "USDT"
    }

    fn default_spot_interval(&self) -> &'static str {
        "1h"
    }

    fn interval_seconds(&self, interval: &str) -> Option<i64> {
        match interval {
            "1h" => Some(3600),
            _ => None,
        }
    }

    fn max_candles_per_call(&self) -> i64 {
        10
    }

    async fn account_details(
        &self,
        all_details: bool,
        flag_portfolio: bool,
        min_balance: f64,
    ) -> Result<AccountDetails, ExchangeError> {
        if !all_details && !flag_portfolio {
            return Err(ExchangeError::InvalidOption);
        }
        if let Some(delay) = self.account_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_account {
            return Err(ExchangeError::VendorCall("mock account outage".into()));
        }
        if all_details {
            return Ok(AccountDetails::All(
                self.balances.iter().cloned().collect(),
            ));
        }
        Ok(portfolio_from_balances(
            self.name,
            self.balances.clone(),
            min_balance,
        ))
    }

    async fn spot_pair(&self, base: &str, _quote: &str, _interval: &str) -> f64 {
        if let Some(delay) = self.spot_delays.get(base) {
            tokio::time::sleep(*delay).await;
        }
        if base == "USDT" {
            return 1.0;
        }
        self.spot_prices.get(base).copied().unwrap_or(0.0)
    }

    async fn ticker_data(
        &self,
        _symbol: &str,
        interval: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Option<Vec<OhlcEntry>> {
        self.ticker_calls.fetch_add(1, Ordering::SeqCst);
        let seconds = self.interval_seconds(interval)?;

        let mut entries = Vec::new();
        let mut t = start;
        while t <= end {
            let in_gap = self
                .candle_gap
                .is_some_and(|(from, to)| t >= from && t <= to);
            if !in_gap {
                entries.push(OhlcEntry {
                    timestamp: t,
                    open: 100.0,
                    high: 101.0,
                    low: 99.0,
                    close: 100.5,
                    volume: 1.0,
                });
            }
            t += Duration::seconds(seconds);
        }
        if self.cap_candles {
            entries.truncate(self.max_candles_per_call() as usize);
        }
        Some(entries)
    }

    async fn available_pairs(&self) -> Vec<String> {
        Vec::new()
    }

    async fn execute_order(
        &self,
        _quantity: f64,
        _pair: &str,
        _buy: bool,
        _order_type: &str,
    ) -> Result<OrderReceipt, ExchangeError> {
        Err(ExchangeError::NotImplemented("mock order execution"))
    }
}

#[derive(Default)]
pub struct MockProvider {
    exchanges: HashMap<ExchangeName, Arc<MockExchange>>,
}

impl MockProvider {
    pub fn with(mut self, exchange: Arc<MockExchange>) -> Self {
        self.exchanges.insert(exchange.name, exchange);
        self
    }
}

impl ExchangeProvider for MockProvider {
    fn create(&self, name: ExchangeName) -> Arc<dyn Exchange> {
        Arc::clone(self.exchanges.get(&name).expect("unscripted exchange")) as Arc<dyn Exchange>
    }
}
