use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::config::binance_config::BinanceConfig;
use crate::error::ExchangeError;
use crate::exchange::domain::exchange::{
    portfolio_from_balances, AccountDetails, Exchange, ExchangeName, OrderReceipt,
};
use crate::exchange::domain::ohlc::OhlcEntry;

use super::value_to_f64;

const REST_ENDPOINT: &str = "https://api.binance.com";
const MAX_CANDLES: i64 = 1000;

/// Binance REST adapter. Signed endpoints use an HMAC-SHA256 hex signature
/// over the query string, sent alongside the `X-MBX-APIKEY` header.
pub struct BinanceExchange {
    http: reqwest::Client,
    api_key: Box<str>,
    secret_key: Box<str>,
}

#[derive(serde::Deserialize)]
struct AccountResponse {
    balances: Vec<BalanceEntry>,
}

#[derive(serde::Deserialize)]
struct BalanceEntry {
    asset: String,
    free: String,
}

#[derive(serde::Deserialize)]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

#[derive(serde::Deserialize)]
struct SymbolInfo {
    symbol: String,
    status: Option<String>,
}

impl BinanceExchange {
    pub fn new(config: &BinanceConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            secret_key: config.secret_key.clone(),
        }
    }

    fn sign(&self, query: &str) -> Result<String, ExchangeError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret_key.as_bytes())
            .map_err(|e| ExchangeError::VendorCall(format!("invalid binance secret: {e}")))?;
        mac.update(query.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    async fn fetch_balances(&self) -> Result<Vec<(String, f64)>, ExchangeError> {
        let query = format!("timestamp={}", Utc::now().timestamp_millis());
        let signature = self.sign(&query)?;
        let url = format!("{REST_ENDPOINT}/api/v3/account?{query}&signature={signature}");

        let response: AccountResponse = self
            .http
            .get(&url)
            .header("X-MBX-APIKEY", self.api_key.as_ref())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response
            .balances
            .into_iter()
            .filter_map(|entry| {
                entry
                    .free
                    .parse::<f64>()
                    .ok()
                    .map(|free| (entry.asset, free))
            })
            .collect())
    }

    async fn fetch_klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: i64,
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<Vec<OhlcEntry>, ExchangeError> {
        let mut request = self
            .http
            .get(format!("{REST_ENDPOINT}/api/v3/klines"))
            .query(&[("symbol", symbol), ("interval", interval)])
            .query(&[("limit", limit)]);
        if let Some((start, end)) = range {
            request = request
                .query(&[("startTime", start.timestamp_millis())])
                .query(&[("endTime", end.timestamp_millis())]);
        }

        let rows: Vec<serde_json::Value> = request
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(parse_klines(&rows))
    }
}

/// Klines come as positional arrays:
/// [open_time_ms, open, high, low, close, volume, close_time, ...].
fn parse_klines(rows: &[serde_json::Value]) -> Vec<OhlcEntry> {
    rows.iter()
        .filter_map(|row| {
            let cells = row.as_array()?;
            let timestamp = Utc.timestamp_millis_opt(cells.first()?.as_i64()?).single()?;
            Some(OhlcEntry {
                timestamp,
                open: value_to_f64(cells.get(1)?)?,
                high: value_to_f64(cells.get(2)?)?,
                low: value_to_f64(cells.get(3)?)?,
                close: value_to_f64(cells.get(4)?)?,
                volume: value_to_f64(cells.get(5)?)?,
            })
        })
        .collect()
}

#[async_trait::async_trait]
impl Exchange for BinanceExchange {
    fn name(&self) -> ExchangeName {
        ExchangeName::Binance
    }

    fn usd_quote(&self) -> &'static str {
        "USDT"
    }

    fn default_spot_interval(&self) -> &'static str {
        "1m"
    }

    fn interval_seconds(&self, interval: &str) -> Option<i64> {
        match interval {
            "1m" => Some(60),
            "3m" => Some(180),
            "5m" => Some(300),
            "15m" => Some(900),
            "30m" => Some(1800),
            "1h" => Some(3600),
            "2h" => Some(7200),
            "4h" => Some(14400),
            "6h" => Some(21600),
            "8h" => Some(28800),
            "12h" => Some(43200),
            "1d" => Some(86400),
            "3d" => Some(259200),
            "1w" => Some(604800),
            _ => None,
        }
    }

    fn max_candles_per_call(&self) -> i64 {
        MAX_CANDLES
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

        let balances = self.fetch_balances().await?;
        if all_details {
            return Ok(AccountDetails::All(
                balances.into_iter().collect::<HashMap<_, _>>(),
            ));
        }
        Ok(portfolio_from_balances(self.name(), balances, min_balance))
    }

    async fn spot_pair(&self, base: &str, quote: &str, interval: &str) -> f64 {
        if base == "USDT" {
            return 1.0;
        }
        let symbol = format!("{base}{quote}");
        match self.fetch_klines(&symbol, interval, 1, None).await {
            Ok(entries) => entries.last().map(|entry| entry.close).unwrap_or(0.0),
            Err(e) => {
                log::warn!("binance: cannot get symbol {symbol}: {e}");
                0.0
            }
        }
    }

    async fn ticker_data(
        &self,
        symbol: &str,
        interval: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Option<Vec<OhlcEntry>> {
        if self.interval_seconds(interval).is_none() {
            log::error!("binance: invalid interval {interval}");
            return None;
        }
        match self
            .fetch_klines(symbol, interval, MAX_CANDLES, Some((start, end)))
            .await
        {
            Ok(entries) if !entries.is_empty() => Some(entries),
            Ok(_) => None,
            Err(e) => {
                log::error!("binance: error retrieving ticker data for {symbol}: {e}");
                None
            }
        }
    }

    async fn available_pairs(&self) -> Vec<String> {
        let result: Result<ExchangeInfo, ExchangeError> = async {
            Ok(self
                .http
                .get(format!("{REST_ENDPOINT}/api/v3/exchangeInfo"))
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?)
        }
        .await;

        match result {
            Ok(info) => info
                .symbols
                .into_iter()
                .filter(|s| s.status.as_deref().unwrap_or("TRADING") == "TRADING")
                .map(|s| s.symbol)
                .collect(),
            Err(e) => {
                log::error!("binance: error getting available pairs: {e}");
                Vec::new()
            }
        }
    }

    async fn execute_order(
        &self,
        _quantity: f64,
        _pair: &str,
        _buy: bool,
        _order_type: &str,
    ) -> Result<OrderReceipt, ExchangeError> {
        Err(ExchangeError::NotImplemented("binance order execution"))
    }
}
