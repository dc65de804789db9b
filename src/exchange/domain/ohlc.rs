use chrono::{DateTime, Utc};

/// One candle, UTC second precision. Merged sequences are ordered by
/// timestamp ascending with no duplicates.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OhlcEntry {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}
