#[derive(serde::Deserialize, Debug, Clone)]
pub struct CoinbaseConfig {
    pub api_key: Box<str>,
    pub secret_key: Box<str>,
}
