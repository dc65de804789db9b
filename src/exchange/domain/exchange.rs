use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::error::ExchangeError;

use super::ohlc::OhlcEntry;
use super::portfolio::PortfolioLine;

/// Balances below this magnitude are excluded from portfolio output.
pub const DUST_THRESHOLD: f64 = 0.1;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    serde::Serialize,
    serde::Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ExchangeName {
    Binance,
    Kraken,
    Coinbase,
}

/// Account-detail fetch result: either the raw per-asset balance map, or the
/// dust-filtered portfolio view plus the distinct asset list.
#[derive(Debug, Clone)]
pub enum AccountDetails {
    All(HashMap<String, f64>),
    Portfolio {
        lines: Vec<PortfolioLine>,
        assets: Vec<String>,
    },
}

#[derive(Debug, Clone)]
pub struct OrderReceipt {
    pub client_order_id: String,
    pub pair: String,
    pub raw: serde_json::Value,
}

/// Uniform capability set over heterogeneous vendor trading APIs.
///
/// Contracts (kept identical across vendors):
/// - `account_details`: exactly one of `all_details`/`flag_portfolio` must be
///   set; vendor failures are re-raised.
/// - `spot_pair`: 1.0 for the vendor's stablecoin-to-itself case, 0.0 on any
///   failure. Never errors, so one missing pair cannot abort an aggregation.
/// - `ticker_data`: one capped vendor call; `None` on invalid interval,
///   vendor error or empty response. Callers treat `None` as "skip".
/// - `available_pairs`: empty on vendor error.
#[async_trait::async_trait]
pub trait Exchange: Send + Sync {
    fn name(&self) -> ExchangeName;

    /// The vendor's USD-equivalent quote asset ("USDT" or "USD").
    fn usd_quote(&self) -> &'static str;

    /// Interval used for latest-price lookups during aggregation.
    fn default_spot_interval(&self) -> &'static str;

    /// Seconds per candle for a vendor-valid interval, `None` otherwise.
    fn interval_seconds(&self, interval: &str) -> Option<i64>;

    /// Vendor cap on candles returned by a single call.
    fn max_candles_per_call(&self) -> i64;

    async fn account_details(
        &self,
        all_details: bool,
        flag_portfolio: bool,
        min_balance: f64,
    ) -> Result<AccountDetails, ExchangeError>;

    async fn spot_pair(&self, base: &str, quote: &str, interval: &str) -> f64;

    async fn ticker_data(
        &self,
        symbol: &str,
        interval: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Option<Vec<OhlcEntry>>;

    async fn available_pairs(&self) -> Vec<String>;

    async fn execute_order(
        &self,
        quantity: f64,
        pair: &str,
        buy: bool,
        order_type: &str,
    ) -> Result<OrderReceipt, ExchangeError>;
}

/// Filter a raw balance map down to portfolio lines, preserving the vendor's
/// iteration order. Lines carry no valuation yet; the aggregator joins spot
/// prices afterwards.
pub fn portfolio_from_balances(
    name: ExchangeName,
    balances: impl IntoIterator<Item = (String, f64)>,
    min_balance: f64,
) -> AccountDetails {
    let lines: Vec<PortfolioLine> = balances
        .into_iter()
        .filter(|(_, amount)| *amount > min_balance)
        .map(|(asset, amount)| PortfolioLine {
            asset,
            quantity: amount,
            exchange: name,
            amount_usd: None,
        })
        .collect();
    let assets = lines.iter().map(|line| line.asset.clone()).collect();
    AccountDetails::Portfolio { lines, assets }
}
