pub mod binance;
pub mod coinbase;
pub mod kraken;

/// Vendors are inconsistent about numeric encoding (bare numbers vs quoted
/// strings), sometimes within one payload.
pub(crate) fn value_to_f64(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
