pub mod api_config;
pub mod app_config;
pub mod binance_config;
pub mod coinbase_config;
pub mod database_config;
pub mod history_config;
pub mod kraken_config;

pub use app_config::AppConfig;
