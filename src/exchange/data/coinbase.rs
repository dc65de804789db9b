use std::collections::HashMap;

use chrono::{DateTime, Duration, TimeZone, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::config::coinbase_config::CoinbaseConfig;
use crate::error::ExchangeError;
use crate::exchange::domain::exchange::{
    portfolio_from_balances, AccountDetails, Exchange, ExchangeName, OrderReceipt,
};
use crate::exchange::domain::ohlc::OhlcEntry;

use super::value_to_f64;

const REST_ENDPOINT: &str = "https://api.coinbase.com";
const MAX_CANDLES: i64 = 300;

/// Coinbase Advanced Trade REST adapter. Requests carry CB-ACCESS headers
/// with a hex HMAC-SHA256 signature over `timestamp + method + path + body`
/// (path without query parameters).
pub struct CoinbaseExchange {
    http: reqwest::Client,
    api_key: Box<str>,
    secret_key: Box<str>,
}

#[derive(serde::Deserialize)]
struct AccountsResponse {
    accounts: Vec<AccountEntry>,
}

#[derive(serde::Deserialize)]
struct AccountEntry {
    available_balance: AvailableBalance,
}

#[derive(serde::Deserialize)]
struct AvailableBalance {
    value: String,
    currency: String,
}

#[derive(serde::Deserialize)]
struct CandlesResponse {
    #[serde(default)]
    candles: Vec<serde_json::Value>,
}

#[derive(serde::Deserialize)]
struct ProductsResponse {
    products: Vec<ProductEntry>,
}

#[derive(serde::Deserialize)]
struct ProductEntry {
    product_id: String,
}

/// Candlestick granularities, keyed by their duration in seconds.
fn granularity(interval: &str) -> Option<(&'static str, i64)> {
    match interval {
        "60" => Some(("ONE_MINUTE", 60)),
        "300" => Some(("FIVE_MINUTE", 300)),
        "900" => Some(("FIFTEEN_MINUTE", 900)),
        "3600" => Some(("ONE_HOUR", 3600)),
        "21600" => Some(("SIX_HOUR", 21600)),
        "86400" => Some(("ONE_DAY", 86400)),
        _ => None,
    }
}

impl CoinbaseExchange {
    pub fn new(config: &CoinbaseConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            secret_key: config.secret_key.clone(),
        }
    }

    fn access_headers(
        &self,
        method: &str,
        path: &str,
        body: &str,
    ) -> Result<Vec<(&'static str, String)>, ExchangeError> {
        let timestamp = Utc::now().timestamp();
        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret_key.as_bytes())
            .map_err(|e| ExchangeError::VendorCall(format!("invalid coinbase secret: {e}")))?;
        mac.update(format!("{timestamp}{method}{path}{body}").as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        Ok(vec![
            ("CB-ACCESS-KEY", self.api_key.to_string()),
            ("CB-ACCESS-SIGN", signature),
            ("CB-ACCESS-TIMESTAMP", timestamp.to_string()),
        ])
    }

    async fn signed_get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ExchangeError> {
        let mut request = self.http.get(format!("{REST_ENDPOINT}{path}"));
        for (name, value) in self.access_headers("GET", path, "")? {
            request = request.header(name, value);
        }
        if !query.is_empty() {
            request = request.query(query);
        }
        Ok(request
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }

    async fn fetch_candles(
        &self,
        symbol: &str,
        granularity_name: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<OhlcEntry>, ExchangeError> {
        let path = format!("/api/v3/brokerage/products/{symbol}/candles");
        let response: CandlesResponse = self
            .signed_get(
                &path,
                &[
                    ("start", start.timestamp().to_string()),
                    ("end", end.timestamp().to_string()),
                    ("granularity", granularity_name.to_string()),
                ],
            )
            .await?;

        let mut entries = parse_candles(&response.candles);
        // Coinbase returns candles newest-first.
        entries.sort_by_key(|entry| entry.timestamp);
        Ok(entries)
    }
}

/// Candles are keyed objects: {start, low, high, open, close, volume},
/// with `start` as a unix-seconds string.
fn parse_candles(rows: &[serde_json::Value]) -> Vec<OhlcEntry> {
    rows.iter()
        .filter_map(|row| {
            let seconds = value_to_f64(row.get("start")?)? as i64;
            let timestamp = Utc.timestamp_opt(seconds, 0).single()?;
            Some(OhlcEntry {
                timestamp,
                open: value_to_f64(row.get("open")?)?,
                high: value_to_f64(row.get("high")?)?,
                low: value_to_f64(row.get("low")?)?,
                close: value_to_f64(row.get("close")?)?,
                volume: value_to_f64(row.get("volume")?)?,
            })
        })
        .collect()
}

#[async_trait::async_trait]
impl Exchange for CoinbaseExchange {
    fn name(&self) -> ExchangeName {
        ExchangeName::Coinbase
    }

    fn usd_quote(&self) -> &'static str {
        "USD"
    }

    /// Intervals are candle durations in seconds.
    fn default_spot_interval(&self) -> &'static str {
        "60"
    }

    fn interval_seconds(&self, interval: &str) -> Option<i64> {
        granularity(interval).map(|(_, seconds)| seconds)
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

        let response: AccountsResponse = self
            .signed_get("/api/v3/brokerage/accounts", &[])
            .await?;
        let balances: Vec<(String, f64)> = response
            .accounts
            .into_iter()
            .filter_map(|account| {
                account
                    .available_balance
                    .value
                    .parse::<f64>()
                    .ok()
                    .map(|value| (account.available_balance.currency, value))
            })
            .collect();

        if all_details {
            return Ok(AccountDetails::All(
                balances.into_iter().collect::<HashMap<_, _>>(),
            ));
        }
        Ok(portfolio_from_balances(self.name(), balances, min_balance))
    }

    async fn spot_pair(&self, base: &str, quote: &str, interval: &str) -> f64 {
        if base == "USDT" && quote == "USD" {
            return 1.0;
        }
        let Some((granularity_name, seconds)) = granularity(interval) else {
            log::error!("coinbase: invalid interval {interval}");
            return 0.0;
        };

        let symbol = format!("{base}-{quote}");
        let end = Utc::now();
        let start = end - Duration::seconds(seconds * 10);
        match self.fetch_candles(&symbol, granularity_name, start, end).await {
            Ok(entries) => entries.last().map(|entry| entry.close).unwrap_or(0.0),
            Err(e) => {
                log::warn!("coinbase: error getting data for symbol {symbol}: {e}");
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
        let Some((granularity_name, _)) = granularity(interval) else {
            log::error!("coinbase: invalid interval {interval}");
            return None;
        };
        match self.fetch_candles(symbol, granularity_name, start, end).await {
            Ok(entries) if !entries.is_empty() => Some(entries),
            Ok(_) => None,
            Err(e) => {
                log::error!("coinbase: error retrieving ticker data for {symbol}: {e}");
                None
            }
        }
    }

    async fn available_pairs(&self) -> Vec<String> {
        match self
            .signed_get::<ProductsResponse>("/api/v3/brokerage/products", &[])
            .await
        {
            Ok(response) => response
                .products
                .into_iter()
                .map(|product| product.product_id)
                .collect(),
            Err(e) => {
                log::error!("coinbase: error getting available pairs: {e}");
                Vec::new()
            }
        }
    }

    async fn execute_order(
        &self,
        quantity: f64,
        pair: &str,
        buy: bool,
        order_type: &str,
    ) -> Result<OrderReceipt, ExchangeError> {
        match order_type {
            "market" => {}
            "limit" => {
                return Err(ExchangeError::NotImplemented(
                    "limit orders require a price parameter",
                ))
            }
            other => return Err(ExchangeError::UnsupportedOrderType(other.to_string())),
        }

        let side = if buy { "buy" } else { "sell" };
        let client_order_id = format!("{pair}_{side}_{}", Utc::now().timestamp());
        let body = serde_json::json!({
            "client_order_id": client_order_id,
            "product_id": pair,
            "side": if buy { "BUY" } else { "SELL" },
            "order_configuration": {
                "market_market_ioc": { "base_size": quantity.to_string() }
            }
        });

        let path = "/api/v3/brokerage/orders";
        let body_text = body.to_string();
        let mut request = self.http.post(format!("{REST_ENDPOINT}{path}"));
        for (name, value) in self.access_headers("POST", path, &body_text)? {
            request = request.header(name, value);
        }
        let raw: serde_json::Value = request
            .header("Content-Type", "application/json")
            .body(body_text)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if raw.get("success").and_then(|v| v.as_bool()) == Some(false) {
            return Err(ExchangeError::VendorCall(format!(
                "coinbase: order rejected: {}",
                raw.get("error_response").unwrap_or(&serde_json::Value::Null)
            )));
        }
        log::info!("coinbase: order executed: {client_order_id}");

        Ok(OrderReceipt {
            client_order_id,
            pair: pair.to_string(),
            raw,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn adapter() -> CoinbaseExchange {
        CoinbaseExchange::new(&CoinbaseConfig {
            api_key: "key".into(),
            secret_key: "secret".into(),
        })
    }

    #[tokio::test]
    async fn account_details_requires_a_flag() {
        let result = adapter().account_details(false, false, 0.1).await;
        assert!(matches!(result, Err(ExchangeError::InvalidOption)));
    }

    #[tokio::test]
    async fn usdt_to_usd_spot_is_exactly_one() {
        assert_eq!(adapter().spot_pair("USDT", "USD", "60").await, 1.0);
    }

    #[tokio::test]
    async fn invalid_interval_is_a_soft_failure() {
        assert_eq!(adapter().spot_pair("BTC", "USD", "61").await, 0.0);
        let now = Utc::now();
        assert!(adapter().ticker_data("BTC-USD", "61", now, now).await.is_none());
    }

    #[tokio::test]
    async fn limit_orders_are_not_implemented() {
        let result = adapter().execute_order(1.0, "BTC-USD", true, "limit").await;
        assert!(matches!(result, Err(ExchangeError::NotImplemented(_))));
    }

    #[tokio::test]
    async fn unknown_order_type_is_rejected() {
        let result = adapter()
            .execute_order(1.0, "BTC-USD", true, "stop_loss")
            .await;
        assert!(matches!(
            result,
            Err(ExchangeError::UnsupportedOrderType(kind)) if kind == "stop_loss"
        ));
    }

    #[test]
    fn granularity_table_matches_vendor_seconds() {
        assert_eq!(granularity("60"), Some(("ONE_MINUTE", 60)));
        assert_eq!(granularity("86400"), Some(("ONE_DAY", 86400)));
        assert_eq!(granularity("120"), None);
    }

    #[test]
    fn parses_keyed_candles() {
        let rows = vec![json!({
            "start": "1700000000",
            "low": "36900.5",
            "high": "37100.0",
            "open": "37000.1",
            "close": "37050.2",
            "volume": "12.5"
        })];
        let entries = parse_candles(&rows);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].timestamp.timestamp(), 1_700_000_000);
        assert_eq!(entries[0].close, 37050.2);
    }
}
