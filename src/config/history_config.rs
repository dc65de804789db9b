#[derive(serde::Deserialize, Debug, Clone)]
pub struct HistoryConfig {
    /// Directory holding the comparative price series CSVs.
    pub comparative_dir: Box<str>,
}
