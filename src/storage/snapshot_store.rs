use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

use crate::exchange::domain::exchange::ExchangeName;
use crate::exchange::domain::portfolio::PortfolioLine;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(String),
    #[error("corrupt snapshot record: {0}")]
    Corrupt(String),
}

impl From<r2d2::Error> for StorageError {
    fn from(err: r2d2::Error) -> Self {
        StorageError::Database(err.to_string())
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::Database(err.to_string())
    }
}

/// A persisted, timestamped copy of one exchange's portfolio state.
/// Immutable once stored.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PortfolioSnapshot {
    pub exchange: ExchangeName,
    pub timestamp: DateTime<Utc>,
    pub portfolio: Vec<PortfolioLine>,
}

/// Append-only snapshot store. The portfolio is kept as one JSON document
/// per row, queried by exchange and optional inclusive time range.
#[derive(Clone)]
pub struct SnapshotStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SnapshotStore {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let manager = SqliteConnectionManager::file(path);
        Self::from_manager(manager, 4)
    }

    pub fn in_memory() -> Result<Self, StorageError> {
        Self::from_manager(SqliteConnectionManager::memory(), 1)
    }

    fn from_manager(
        manager: SqliteConnectionManager,
        pool_size: u32,
    ) -> Result<Self, StorageError> {
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(|e| StorageError::Database(e.to_string()))?;
        let store = Self { pool };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<(), StorageError> {
        let conn = self.pool.get()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS snapshots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                exchange TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                portfolio TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_snapshots_exchange_timestamp
                ON snapshots(exchange, timestamp);",
        )?;
        Ok(())
    }

    /// Append a snapshot of `portfolio` with the current UTC timestamp.
    pub fn save(
        &self,
        exchange: ExchangeName,
        portfolio: &[PortfolioLine],
    ) -> Result<PortfolioSnapshot, StorageError> {
        let timestamp = Utc::now();
        let document = serde_json::to_string(portfolio)
            .map_err(|e| StorageError::Corrupt(e.to_string()))?;

        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO snapshots (exchange, timestamp, portfolio) VALUES (?1, ?2, ?3)",
            params![exchange.to_string(), timestamp.timestamp(), document],
        )?;

        Ok(PortfolioSnapshot {
            exchange,
            timestamp,
            portfolio: portfolio.to_vec(),
        })
    }

    /// Snapshots for `exchange`, filtered by an optional inclusive time
    /// range, oldest first. No pagination.
    pub fn query(
        &self,
        exchange: ExchangeName,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<PortfolioSnapshot>, StorageError> {
        let conn = self.pool.get()?;
        let mut statement = conn.prepare(
            "SELECT exchange, timestamp, portfolio FROM snapshots
             WHERE exchange = ?1
               AND timestamp >= ?2
               AND timestamp <= ?3
             ORDER BY timestamp ASC",
        )?;

        let start = start.map(|t| t.timestamp()).unwrap_or(i64::MIN);
        let end = end.map(|t| t.timestamp()).unwrap_or(i64::MAX);

        let rows = statement.query_map(
            params![exchange.to_string(), start, end],
            |row| {
                let exchange: String = row.get(0)?;
                let timestamp: i64 = row.get(1)?;
                let portfolio: String = row.get(2)?;
                Ok((exchange, timestamp, portfolio))
            },
        )?;

        let mut snapshots = Vec::new();
        for row in rows {
            let (exchange, timestamp, portfolio) = row?;
            let exchange: ExchangeName = exchange
                .parse()
                .map_err(|_| StorageError::Corrupt(format!("bad exchange tag {exchange}")))?;
            let timestamp = Utc
                .timestamp_opt(timestamp, 0)
                .single()
                .ok_or_else(|| StorageError::Corrupt(format!("bad timestamp {timestamp}")))?;
            let portfolio: Vec<PortfolioLine> = serde_json::from_str(&portfolio)
                .map_err(|e| StorageError::Corrupt(e.to_string()))?;
            snapshots.push(PortfolioSnapshot {
                exchange,
                timestamp,
                portfolio,
            });
        }
        Ok(snapshots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn line(asset: &str, quantity: f64, amount_usd: Option<f64>) -> PortfolioLine {
        PortfolioLine {
            asset: asset.into(),
            quantity,
            exchange: ExchangeName::Coinbase,
            amount_usd,
        }
    }

    #[test]
    fn round_trips_a_snapshot_within_range() {
        let store = SnapshotStore::in_memory().unwrap();
        let portfolio = vec![line("BTC", 0.5, Some(30_000.0)), line("USD", 100.0, None)];
        let saved = store.save(ExchangeName::Coinbase, &portfolio).unwrap();

        let results = store
            .query(
                ExchangeName::Coinbase,
                Some(saved.timestamp - Duration::hours(1)),
                Some(saved.timestamp + Duration::hours(1)),
            )
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].portfolio, portfolio);
        assert_eq!(results[0].timestamp.timestamp(), saved.timestamp.timestamp());
    }

    #[test]
    fn range_excluding_the_timestamp_returns_nothing() {
        let store = SnapshotStore::in_memory().unwrap();
        let saved = store
            .save(ExchangeName::Kraken, &[line("ETH", 2.0, Some(6000.0))])
            .unwrap();

        let results = store
            .query(
                ExchangeName::Kraken,
                Some(saved.timestamp - Duration::hours(2)),
                Some(saved.timestamp - Duration::hours(1)),
            )
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn query_filters_by_exchange() {
        let store = SnapshotStore::in_memory().unwrap();
        store
            .save(ExchangeName::Binance, &[line("BTC", 1.0, None)])
            .unwrap();

        assert!(store.query(ExchangeName::Kraken, None, None).unwrap().is_empty());
        assert_eq!(store.query(ExchangeName::Binance, None, None).unwrap().len(), 1);
    }

    #[test]
    fn open_range_returns_everything_oldest_first() {
        let store = SnapshotStore::in_memory().unwrap();
        store
            .save(ExchangeName::Coinbase, &[line("BTC", 1.0, None)])
            .unwrap();
        store
            .save(ExchangeName::Coinbase, &[line("ETH", 2.0, None)])
            .unwrap();

        let results = store.query(ExchangeName::Coinbase, None, None).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].timestamp <= results[1].timestamp);
    }
}
