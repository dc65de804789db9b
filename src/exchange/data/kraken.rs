use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256, Sha512};

use crate::config::kraken_config::KrakenConfig;
use crate::error::ExchangeError;
use crate::exchange::domain::exchange::{
    portfolio_from_balances, AccountDetails, Exchange, ExchangeName, OrderReceipt,
};
use crate::exchange::domain::ohlc::OhlcEntry;

use super::value_to_f64;

const REST_ENDPOINT: &str = "https://api.kraken.com";
const MAX_CANDLES: i64 = 720;

/// Kraken REST adapter. Private endpoints sign
/// `path + SHA256(nonce + postdata)` with HMAC-SHA512 under the
/// base64-decoded secret, and send the base64 signature as `API-Sign`.
pub struct KrakenExchange {
    http: reqwest::Client,
    api_key: Box<str>,
    secret_key: Box<str>,
}

#[derive(serde::Deserialize)]
struct KrakenResponse<T> {
    #[serde(default)]
    error: Vec<String>,
    result: Option<T>,
}

impl<T> KrakenResponse<T> {
    fn into_result(self) -> Result<T, ExchangeError> {
        if !self.error.is_empty() {
            return Err(ExchangeError::VendorCall(self.error.join("; ")));
        }
        self.result
            .ok_or_else(|| ExchangeError::VendorCall("kraken: empty result".into()))
    }
}

/// Kraken reports some assets under legacy aliases. ZUSD is treated as the
/// USDT-equivalent so fiat balances still get a unit valuation.
fn normalize_asset(symbol: String) -> String {
    match symbol.as_str() {
        "XXBT" => "BTC".to_string(),
        "XETH" => "ETH".to_string(),
        "XXRP" => "XRP".to_string(),
        "XLTC" => "LTC".to_string(),
        "ZUSD" => "USDT".to_string(),
        _ => symbol,
    }
}

impl KrakenExchange {
    pub fn new(config: &KrakenConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            secret_key: config.secret_key.clone(),
        }
    }

    fn sign(&self, path: &str, nonce: u64, postdata: &str) -> Result<String, ExchangeError> {
        let digest = Sha256::digest(format!("{nonce}{postdata}").as_bytes());
        let mut message = path.as_bytes().to_vec();
        message.extend_from_slice(&digest);

        let secret = BASE64
            .decode(self.secret_key.as_ref())
            .map_err(|e| ExchangeError::VendorCall(format!("invalid kraken secret: {e}")))?;
        let mut mac = Hmac::<Sha512>::new_from_slice(&secret)
            .map_err(|e| ExchangeError::VendorCall(format!("invalid kraken secret: {e}")))?;
        mac.update(&message);
        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }

    async fn query_private<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, ExchangeError> {
        let nonce = Utc::now().timestamp_millis() as u64;
        let postdata = format!("nonce={nonce}");
        let signature = self.sign(path, nonce, &postdata)?;

        let response: KrakenResponse<T> = self
            .http
            .post(format!("{REST_ENDPOINT}{path}"))
            .header("API-Key", self.api_key.as_ref())
            .header("API-Sign", signature)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(postdata)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response.into_result()
    }

    async fn fetch_ohlc(
        &self,
        symbol: &str,
        interval: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<OhlcEntry>, ExchangeError> {
        let mut request = self
            .http
            .get(format!("{REST_ENDPOINT}/0/public/OHLC"))
            .query(&[("pair", symbol), ("interval", interval)]);
        if let Some(since) = since {
            request = request.query(&[("since", since.timestamp())]);
        }

        let response: KrakenResponse<serde_json::Value> = request
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let result = response.into_result()?;
        let rows = result
            .as_object()
            .and_then(|object| {
                object
                    .iter()
                    .find(|(key, _)| key.as_str() != "last")
                    .and_then(|(_, value)| value.as_array())
            })
            .ok_or_else(|| ExchangeError::VendorCall(format!("kraken: no OHLC for {symbol}")))?;

        Ok(parse_ohlc_rows(rows))
    }
}

/// Rows are positional: [time, open, high, low, close, vwap, volume, count].
/// Volume sits at index 6, after the vwap column.
fn parse_ohlc_rows(rows: &[serde_json::Value]) -> Vec<OhlcEntry> {
    rows.iter()
        .filter_map(|row| {
            let cells = row.as_array()?;
            let timestamp = Utc.timestamp_opt(cells.first()?.as_i64()?, 0).single()?;
            Some(OhlcEntry {
                timestamp,
                open: value_to_f64(cells.get(1)?)?,
                high: value_to_f64(cells.get(2)?)?,
                low: value_to_f64(cells.get(3)?)?,
                close: value_to_f64(cells.get(4)?)?,
                volume: value_to_f64(cells.get(6)?)?,
            })
        })
        .collect()
}

#[async_trait::async_trait]
impl Exchange for KrakenExchange {
    fn name(&self) -> ExchangeName {
        ExchangeName::Kraken
    }

    fn usd_quote(&self) -> &'static str {
        "USD"
    }

    fn default_spot_interval(&self) -> &'static str {
        "1"
    }

    /// Kraken intervals are minutes.
    fn interval_seconds(&self, interval: &str) -> Option<i64> {
        match interval {
            "1" => Some(60),
            "5" => Some(300),
            "15" => Some(900),
            "30" => Some(1800),
            "60" => Some(3600),
            "240" => Some(14400),
            "1440" => Some(86400),
            "10080" => Some(604800),
            "21600" => Some(1296000),
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

        let raw: HashMap<String, String> = self.query_private("/0/private/Balance").await?;
        let balances: Vec<(String, f64)> = raw
            .into_iter()
            .filter_map(|(symbol, amount)| {
                amount
                    .parse::<f64>()
                    .ok()
                    .map(|amount| (normalize_asset(symbol), amount))
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
        if base == "USDT" {
            return 1.0;
        }
        let symbol = format!("{base}{quote}");
        match self.fetch_ohlc(&symbol, interval, None).await {
            Ok(entries) => entries.last().map(|entry| entry.close).unwrap_or(0.0),
            Err(e) => {
                log::warn!("kraken: error getting data for symbol {symbol}: {e}");
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
            log::error!("kraken: invalid interval {interval}");
            return None;
        }
        match self.fetch_ohlc(symbol, interval, Some(start)).await {
            Ok(entries) => {
                // The OHLC endpoint only supports `since`; trim to the window.
                let entries: Vec<OhlcEntry> = entries
                    .into_iter()
                    .filter(|entry| entry.timestamp >= start && entry.timestamp <= end)
                    .collect();
                if entries.is_empty() {
                    None
                } else {
                    Some(entries)
                }
            }
            Err(e) => {
                log::error!("kraken: error retrieving ticker data for {symbol}: {e}");
                None
            }
        }
    }

    async fn available_pairs(&self) -> Vec<String> {
        let result: Result<serde_json::Value, ExchangeError> = async {
            let response: KrakenResponse<serde_json::Value> = self
                .http
                .get(format!("{REST_ENDPOINT}/0/public/AssetPairs"))
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            response.into_result()
        }
        .await;

        match result {
            Ok(pairs) => pairs
                .as_object()
                .map(|object| object.keys().cloned().collect())
                .unwrap_or_default(),
            Err(e) => {
                log::error!("kraken: error getting available pairs: {e}");
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
        Err(ExchangeError::NotImplemented("kraken order execution"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn adapter() -> KrakenExchange {
        KrakenExchange::new(&KrakenConfig {
            api_key: "key".into(),
            secret_key: "a2V5X3NlY3JldA==".into(),
        })
    }

    #[tokio::test]
    async fn account_details_requires_a_flag() {
        let result = adapter().account_details(false, false, 0.1).await;
        assert!(matches!(result, Err(ExchangeError::InvalidOption)));
    }

    #[tokio::test]
    async fn stablecoin_spot_is_exactly_one() {
        assert_eq!(adapter().spot_pair("USDT", "USD", "1").await, 1.0);
    }

    #[tokio::test]
    async fn invalid_interval_yields_no_ticker_data() {
        let now = Utc::now();
        assert!(adapter().ticker_data("XBTUSD", "7", now, now).await.is_none());
    }

    #[test]
    fn normalizes_legacy_asset_aliases() {
        assert_eq!(normalize_asset("XXBT".into()), "BTC");
        assert_eq!(normalize_asset("XETH".into()), "ETH");
        assert_eq!(normalize_asset("ZUSD".into()), "USDT");
        assert_eq!(normalize_asset("SOL".into()), "SOL");
    }

    #[test]
    fn parses_ohlc_rows_with_vwap_column() {
        let rows = vec![json!([
            1700000000i64,
            "37000.1",
            "37100.0",
            "36900.5",
            "37050.2",
            "37010.0",
            "12.5",
            42
        ])];
        let entries = parse_ohlc_rows(&rows);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].close, 37050.2);
        // volume comes from index 6, not the vwap at index 5
        assert_eq!(entries[0].volume, 12.5);
    }

    #[test]
    fn error_payload_becomes_vendor_call_error() {
        let response: KrakenResponse<serde_json::Value> = serde_json::from_value(json!({
            "error": ["EGeneral:Invalid arguments"],
            "result": {}
        }))
        .unwrap();
        assert!(matches!(
            response.into_result(),
            Err(ExchangeError::VendorCall(_))
        ));
    }

    // Signature test vector from Kraken's REST authentication docs.
    #[test]
    fn signature_matches_documented_vector() {
        let kraken = KrakenExchange::new(&KrakenConfig {
            api_key: "key".into(),
            secret_key:
                "kQH5HW/8p1uGOVjbgWA7FunAmGO8lsSUXNsu3eow76sz84Q18fWxnyRzBHCd3pd5nE9qa99HAZtuZuj6F1huXg=="
                    .into(),
        });
        let signature = kraken
            .sign(
                "/0/private/AddOrder",
                1616492376594,
                "nonce=1616492376594&ordertype=limit&pair=XBTUSD&price=37500&type=buy&volume=1.25",
            )
            .unwrap();
        assert_eq!(
            signature,
            "4/dpxb3iT4tp/ZCVEwSnEsLxx0bqyhLpdfOpc6fn7OR8+UClSV5n9E6aSS8MPtnRfp32bAb0nmbRn6H8ndwLUQ=="
        );
    }
}
