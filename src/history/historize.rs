//! Bulk historization of tickers for backtest feature engineering.
//!
//! Each ticker is fetched over the requested range (chunked per vendor
//! limits) and written out as an OHLC CSV plus a feature CSV with the
//! technical indicators. Tickers run on a bounded worker pool to respect
//! vendor rate limits; a failing ticker is logged and never aborts the rest.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::StreamExt;

use crate::exchange::domain::exchange::Exchange;
use crate::exchange::domain::ohlc::OhlcEntry;

use super::chunker::fetch_range;
use super::indicators;

/// Max concurrent vendor fetches.
const MAX_WORKERS: usize = 3;

#[derive(serde::Serialize)]
struct FeatureRow {
    timestamp: DateTime<Utc>,
    close: f64,
    sma_20: Option<f64>,
    ema_20: f64,
    rsi_14: Option<f64>,
    macd: f64,
    macd_signal: f64,
    macd_histogram: f64,
    bb_upper: Option<f64>,
    bb_middle: Option<f64>,
    bb_lower: Option<f64>,
    atr_14: Option<f64>,
    stochastic_k: Option<f64>,
    obv: f64,
}

pub async fn historize_tickers(
    adapter: Arc<dyn Exchange>,
    tickers: &[String],
    interval: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    out_dir: &Path,
) {
    futures::stream::iter(tickers.iter().cloned())
        .for_each_concurrent(MAX_WORKERS, |ticker| {
            let adapter = Arc::clone(&adapter);
            let out_dir = out_dir.to_path_buf();
            let interval = interval.to_string();
            async move {
                log::info!("starting {ticker}");
                let entries =
                    fetch_range(adapter.as_ref(), &ticker, &interval, start, end).await;
                if entries.is_empty() {
                    log::warn!("{ticker}: no history retrieved, skipping");
                    return;
                }
                if let Err(e) = write_csvs(&out_dir, &ticker, &entries) {
                    log::error!("{ticker}: issue when historizing: {e}");
                } else {
                    log::info!("{ticker}: historized {} candles", entries.len());
                }
            }
        })
        .await;
    log::info!("all tickers processed");
}

fn write_csvs(out_dir: &Path, ticker: &str, entries: &[OhlcEntry]) -> anyhow::Result<()> {
    std::fs::create_dir_all(out_dir)?;
    let safe_ticker = ticker.replace('/', "-");

    let mut writer = csv::Writer::from_path(out_dir.join(format!("{safe_ticker}.csv")))?;
    for entry in entries {
        writer.serialize(entry)?;
    }
    writer.flush()?;

    let mut writer =
        csv::Writer::from_path(out_dir.join(format!("{safe_ticker}_features.csv")))?;
    for row in feature_rows(entries) {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

fn feature_rows(entries: &[OhlcEntry]) -> Vec<FeatureRow> {
    let closes: Vec<f64> = entries.iter().map(|entry| entry.close).collect();
    let sma_20 = indicators::sma(&closes, 20);
    let ema_20 = indicators::ema(&closes, 20);
    let rsi_14 = indicators::rsi(&closes, 14);
    let (macd, macd_signal, macd_histogram) = indicators::macd(&closes);
    let (bb_upper, bb_middle, bb_lower) = indicators::bollinger(&closes, 20, 2.0);
    let atr_14 = indicators::atr(entries, 14);
    let stochastic_k = indicators::stochastic_k(entries, 14);
    let obv = indicators::obv(entries);

    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| FeatureRow {
            timestamp: entry.timestamp,
            close: entry.close,
            sma_20: sma_20[i],
            ema_20: ema_20[i],
            rsi_14: rsi_14[i],
            macd: macd[i],
            macd_signal: macd_signal[i],
            macd_histogram: macd_histogram[i],
            bb_upper: bb_upper[i],
            bb_middle: bb_middle[i],
            bb_lower: bb_lower[i],
            atr_14: atr_14[i],
            stochastic_k: stochastic_k[i],
            obv: obv[i],
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entries(n: i64) -> Vec<OhlcEntry> {
        (0..n)
            .map(|i| OhlcEntry {
                timestamp: Utc.timestamp_opt(1_700_000_000 + i * 86400, 0).unwrap(),
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.0 + (i % 3) as f64,
                volume: 10.0,
            })
            .collect()
    }

    #[test]
    fn feature_rows_align_with_input() {
        let entries = entries(30);
        let rows = feature_rows(&entries);
        assert_eq!(rows.len(), 30);
        assert!(rows[5].sma_20.is_none());
        assert!(rows[25].sma_20.is_some());
        assert_eq!(rows[0].timestamp, entries[0].timestamp);
    }

    #[test]
    fn writes_ohlc_and_feature_csvs() {
        let dir = tempfile::tempdir().unwrap();
        write_csvs(dir.path(), "BTC-USD", &entries(25)).unwrap();

        let ohlc = std::fs::read_to_string(dir.path().join("BTC-USD.csv")).unwrap();
        assert_eq!(ohlc.lines().count(), 26); // header + 25 rows
        assert!(ohlc.lines().next().unwrap().contains("close"));

        let features =
            std::fs::read_to_string(dir.path().join("BTC-USD_features.csv")).unwrap();
        assert!(features.lines().next().unwrap().contains("rsi_14"));
        assert_eq!(features.lines().count(), 26);
    }
}
