#[derive(serde::Deserialize, Debug, Clone)]
pub struct ApiConfig {
    pub host: Box<str>,
    pub port: u16,
}
