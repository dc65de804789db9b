#[derive(serde::Deserialize, Debug, Clone)]
pub struct DatabaseConfig {
    /// Path to the sqlite snapshot database.
    pub path: Box<str>,
}
