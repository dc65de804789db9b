use chrono::{DateTime, Duration, Utc};

use crate::exchange::domain::exchange::Exchange;
use crate::exchange::domain::ohlc::OhlcEntry;

/// Fetch OHLC history for `[start, end]`, split into vendor-compliant
/// sub-windows.
///
/// Vendor APIs cap the candles returned per call, so each window covers at
/// most `max_candles_per_call` candle open times, endpoints inclusive.
/// Windows are consecutive and non-overlapping: the next window starts one
/// interval after the previous window's end, so boundary candles never
/// duplicate. A window with no data is logged and skipped; it never aborts
/// the remaining windows. An invalid interval yields an empty result.
pub async fn fetch_range(
    adapter: &dyn Exchange,
    symbol: &str,
    interval: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<OhlcEntry> {
    let Some(seconds) = adapter.interval_seconds(interval) else {
        log::error!(
            "{}: invalid interval {interval} for {symbol}",
            adapter.name()
        );
        return Vec::new();
    };
    // Inclusive endpoints: a window of n-1 intervals holds n candles.
    let window = Duration::seconds(seconds * (adapter.max_candles_per_call() - 1));
    let step = Duration::seconds(seconds);

    let mut merged: Vec<OhlcEntry> = Vec::new();
    let mut cursor = start;
    while cursor <= end {
        let window_end = (cursor + window).min(end);
        match adapter.ticker_data(symbol, interval, cursor, window_end).await {
            Some(entries) if !entries.is_empty() => {
                for entry in entries {
                    if entry.timestamp < cursor || entry.timestamp > window_end {
                        continue;
                    }
                    // Guard against vendors repeating the boundary candle.
                    if merged
                        .last()
                        .map_or(true, |last| entry.timestamp > last.timestamp)
                    {
                        merged.push(entry);
                    }
                }
            }
            _ => log::warn!(
                "{}: no data for {symbol} window {cursor}..{window_end}, skipping",
                adapter.name()
            ),
        }
        cursor = window_end + step;
    }
    merged
}
