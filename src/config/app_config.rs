use config::Config;

use crate::exchange::domain::exchange::ExchangeName;

/// Process-wide configuration, loaded once at startup from `Config.toml`.
/// A missing key is a startup-fatal deserialize error.
#[derive(serde::Deserialize, Debug, Clone)]
pub struct AppConfig {
    pub binance: super::binance_config::BinanceConfig,
    pub kraken: super::kraken_config::KrakenConfig,
    pub coinbase: super::coinbase_config::CoinbaseConfig,
    pub database: super::database_config::DatabaseConfig,
    pub api: super::api_config::ApiConfig,
    pub history: super::history_config::HistoryConfig,
    /// Exchanges included in portfolio aggregation.
    pub exchanges: Vec<ExchangeName>,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let config = Config::builder()
            .add_source(config::File::with_name("Config"))
            .build()?
            .try_deserialize()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    const SAMPLE: &str = r#"
        exchanges = ["binance", "coinbase"]

        [binance]
        api_key = "k"
        secret_key = "s"

        [kraken]
        api_key = "k"
        secret_key = "s"

        [coinbase]
        api_key = "k"
        secret_key = "s"

        [database]
        path = "snapshots.db"

        [api]
        host = "127.0.0.1"
        port = 8000

        [history]
        comparative_dir = "comparative"
    "#;

    #[test]
    fn deserializes_full_config() {
        let config: AppConfig = Config::builder()
            .add_source(config::File::from_str(SAMPLE, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.api.port, 8000);
        assert_eq!(
            config.exchanges,
            vec![ExchangeName::Binance, ExchangeName::Coinbase]
        );
    }

    #[test]
    fn missing_key_is_fatal() {
        let without_kraken = SAMPLE.replace("[kraken]", "[kraken_disabled]");
        let result: Result<AppConfig, _> = Config::builder()
            .add_source(config::File::from_str(&without_kraken, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize();

        assert!(result.is_err());
    }
}
