//! Comparative price feed: two reference equity series served side by side
//! by the HTTP API.

use std::path::Path;

use anyhow::Context;

const STOCK_1: &str = "AAPL.csv";
const STOCK_2: &str = "TSLA.csv";

/// Payload for `/test_comparative`: `{"stock-1": [[date, adj_close], ...],
/// "stock-2": [...]}`.
pub fn comparative_series(data_dir: &Path) -> anyhow::Result<serde_json::Value> {
    let stock1 = read_adj_close(&data_dir.join(STOCK_1))?;
    let stock2 = read_adj_close(&data_dir.join(STOCK_2))?;
    Ok(serde_json::json!({
        "stock-1": stock1,
        "stock-2": stock2,
    }))
}

fn read_adj_close(path: &Path) -> anyhow::Result<Vec<(String, f64)>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("cannot open {}", path.display()))?;

    let headers = reader.headers()?.clone();
    let date_idx = headers
        .iter()
        .position(|h| h == "Date")
        .context("missing Date column")?;
    let close_idx = headers
        .iter()
        .position(|h| h == "Adj Close")
        .context("missing Adj Close column")?;

    let mut series = Vec::new();
    for record in reader.records() {
        let record = record?;
        let date = record.get(date_idx).unwrap_or_default().to_string();
        let close: f64 = record
            .get(close_idx)
            .unwrap_or_default()
            .parse()
            .with_context(|| format!("bad Adj Close value on {date}"))?;
        series.push((date, close));
    }
    Ok(series)
}
