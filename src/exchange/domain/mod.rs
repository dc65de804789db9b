pub mod exchange;
pub mod ohlc;
pub mod portfolio;
