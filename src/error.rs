/// Error taxonomy for exchange operations.
///
/// Soft failures (spot prices, ticker windows, pair listings) never surface
/// here; they are signaled by sentinel return values so that one bad asset
/// cannot abort a portfolio-wide pass. Account detail fetches and order
/// placement re-raise, since a missing balance cannot be silently defaulted.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    #[error("unknown exchange: {0}")]
    UnknownExchange(String),

    #[error("please select an option (all_details or flag_portfolio)")]
    InvalidOption,

    #[error("vendor call failed: {0}")]
    VendorCall(String),

    #[error("unsupported order type: {0}")]
    UnsupportedOrderType(String),

    #[error("not implemented: {0}")]
    NotImplemented(&'static str),
}

impl From<reqwest::Error> for ExchangeError {
    fn from(err: reqwest::Error) -> Self {
        ExchangeError::VendorCall(err.to_string())
    }
}
