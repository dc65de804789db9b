use super::exchange::ExchangeName;

/// One row per held asset in the merged portfolio view.
///
/// `amount_usd` is `None` when no reliable spot price was found; `quantity`
/// always reflects the exchange-reported free balance.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PortfolioLine {
    pub asset: String,
    pub quantity: f64,
    pub exchange: ExchangeName,
    pub amount_usd: Option<f64>,
}
