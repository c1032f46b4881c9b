//! Usage Odometer
//!
//! Cumulative cost and token totals kept in a small key/value store that
//! outlives the process. Totals only grow, except on an explicit reset.

use crate::error::AppError;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

pub const KEY_TOTAL_USD: &str = "ai_sql_total_usd";
pub const KEY_TOTAL_TOKENS: &str = "ai_sql_total_tokens";

/// Minimal persistence interface for the odometer
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>, AppError>;
    fn set(&mut self, key: &str, value: String) -> Result<(), AppError>;
}

#[derive(Debug, Default)]
pub struct MemoryKv {
    values: HashMap<String, String>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKv {
    fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), AppError> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}

/// SQLite-backed key/value table
pub struct SqliteKv {
    conn: Connection,
}

impl SqliteKv {
    /// Open or create the database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS odometer (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;

        debug!("Opened odometer store at {}", path.display());
        Ok(Self { conn })
    }
}

impl KeyValueStore for SqliteKv {
    fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let value: Option<SqlValue> = self
            .conn
            .query_row(
                "SELECT value FROM odometer WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        Ok(match value {
            None | Some(SqlValue::Null) => None,
            Some(SqlValue::Text(text)) => Some(text),
            Some(SqlValue::Integer(i)) => Some(i.to_string()),
            Some(SqlValue::Real(f)) => Some(f.to_string()),
            Some(SqlValue::Blob(_)) => {
                warn!("Ignoring binary odometer value for {}", key);
                None
            }
        })
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), AppError> {
        self.conn.execute(
            "INSERT INTO odometer (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }
}

/// Totals as read from the store
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OdometerReading {
    pub total_usd: f64,
    pub total_tokens: u64,
}

type SharedStore = Arc<Mutex<Box<dyn KeyValueStore>>>;

/// Store access runs on the blocking pool; the mutex serializes
/// accumulate and reset.
pub struct Odometer {
    store: SharedStore,
}

impl Odometer {
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryKv::new()))
    }

    pub async fn read(&self) -> Result<OdometerReading, AppError> {
        self.with_store(|store| Self::read_locked(&**store)).await
    }

    /// Add one call's cost and tokens. Negative or non-finite costs add zero.
    pub async fn accumulate(
        &self,
        cost_usd: f64,
        total_tokens: u64,
    ) -> Result<OdometerReading, AppError> {
        let delta_usd = if cost_usd.is_finite() && cost_usd > 0.0 {
            cost_usd
        } else {
            0.0
        };

        self.with_store(move |store| {
            let current = Self::read_locked(&**store)?;
            let next = OdometerReading {
                total_usd: current.total_usd + delta_usd,
                total_tokens: current.total_tokens.saturating_add(total_tokens),
            };
            Self::write_locked(&mut **store, &next)?;

            debug!(
                "Odometer +${:.6} / +{} tokens -> ${:.6} / {} tokens",
                delta_usd, total_tokens, next.total_usd, next.total_tokens
            );
            Self::read_locked(&**store)
        })
        .await
    }

    pub async fn reset(&self) -> Result<OdometerReading, AppError> {
        self.with_store(|store| {
            let zero = OdometerReading::default();
            Self::write_locked(&mut **store, &zero)?;

            info!("Odometer reset");
            Ok(zero)
        })
        .await
    }

    async fn with_store<T, F>(&self, op: F) -> Result<T, AppError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Box<dyn KeyValueStore>) -> Result<T, AppError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || {
            let mut guard = store
                .lock()
                .map_err(|_| AppError::Internal("odometer store lock poisoned".to_string()))?;
            op(&mut guard)
        })
        .await
        .map_err(|e| AppError::Internal(format!("odometer task failed: {}", e)))?
    }

    fn read_locked(store: &dyn KeyValueStore) -> Result<OdometerReading, AppError> {
        let total_usd = match store.get(KEY_TOTAL_USD)? {
            None => 0.0,
            Some(raw) => match raw.trim().parse::<f64>() {
                Ok(v) if v.is_finite() && v >= 0.0 => v,
                _ => {
                    warn!("Ignoring unreadable odometer value {}={:?}", KEY_TOTAL_USD, raw);
                    0.0
                }
            },
        };

        let total_tokens = match store.get(KEY_TOTAL_TOKENS)? {
            None => 0,
            Some(raw) => raw.trim().parse::<u64>().unwrap_or_else(|_| {
                warn!("Ignoring unreadable odometer value {}={:?}", KEY_TOTAL_TOKENS, raw);
                0
            }),
        };

        Ok(OdometerReading {
            total_usd,
            total_tokens,
        })
    }

    /// Totals are stored at full precision; rounding is for display only
    fn write_locked(store: &mut dyn KeyValueStore, reading: &OdometerReading) -> Result<(), AppError> {
        store.set(KEY_TOTAL_USD, reading.total_usd.to_string())?;
        store.set(KEY_TOTAL_TOKENS, reading.total_tokens.to_string())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_starts_at_zero() {
        let odometer = Odometer::in_memory();
        assert_eq!(odometer.read().await.unwrap(), OdometerReading::default());
    }

    #[tokio::test]
    async fn test_accumulate_twice_then_reset() {
        let odometer = Odometer::in_memory();
        odometer.accumulate(0.005, 1500).await.unwrap();
        let reading = odometer.accumulate(0.005, 1500).await.unwrap();

        assert_eq!(reading.total_usd, 0.01);
        assert_eq!(reading.total_tokens, 3000);

        let reset = odometer.reset().await.unwrap();
        assert_eq!(reset, OdometerReading::default());
        assert_eq!(odometer.read().await.unwrap(), OdometerReading::default());
    }

    #[tokio::test]
    async fn test_sub_micro_dollar_costs_add_up() {
        let odometer = Odometer::in_memory();
        for _ in 0..1000 {
            odometer.accumulate(0.0000004, 1).await.unwrap();
        }

        let reading = odometer.read().await.unwrap();
        assert!((reading.total_usd - 0.0004).abs() < 1e-12);
        assert_eq!(reading.total_tokens, 1000);
    }

    #[tokio::test]
    async fn test_negative_cost_adds_nothing() {
        let odometer = Odometer::in_memory();
        let reading = odometer.accumulate(-3.0, 10).await.unwrap();
        assert_eq!(reading.total_usd, 0.0);
        assert_eq!(reading.total_tokens, 10);

        let reading = odometer.accumulate(f64::NAN, 0).await.unwrap();
        assert_eq!(reading.total_usd, 0.0);
    }

    #[tokio::test]
    async fn test_unreadable_values_read_as_zero() {
        let mut kv = MemoryKv::new();
        kv.set(KEY_TOTAL_USD, "abc".to_string()).unwrap();
        kv.set(KEY_TOTAL_TOKENS, "-4".to_string()).unwrap();

        let odometer = Odometer::new(Box::new(kv));
        assert_eq!(odometer.read().await.unwrap(), OdometerReading::default());
    }

    #[tokio::test]
    async fn test_sqlite_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("odometer.db");

        {
            let odometer = Odometer::new(Box::new(SqliteKv::open(&path).unwrap()));
            odometer.accumulate(0.25, 400).await.unwrap();
            odometer.accumulate(0.0000001, 1).await.unwrap();
        }

        let reopened = Odometer::new(Box::new(SqliteKv::open(&path).unwrap()));
        let reading = reopened.read().await.unwrap();
        assert_eq!(reading.total_usd, 0.25 + 0.0000001);
        assert_eq!(reading.total_tokens, 401);
    }

    #[tokio::test]
    async fn test_sqlite_numeric_and_garbage_values_are_lenient() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("odometer.db");
        drop(SqliteKv::open(&path).unwrap());

        let conn = Connection::open(&path).unwrap();
        conn.execute(
            "INSERT INTO odometer (key, value) VALUES ('ai_sql_total_usd', 1.5), ('ai_sql_total_tokens', 'lots')",
            [],
        )
        .unwrap();
        drop(conn);

        let odometer = Odometer::new(Box::new(SqliteKv::open(&path).unwrap()));
        let reading = odometer.read().await.unwrap();
        assert_eq!(reading.total_usd, 1.5);
        assert_eq!(reading.total_tokens, 0);
    }

    #[test]
    fn test_corrupt_file_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("odometer.db");
        std::fs::write(&path, "definitely not a sqlite database, just some plain text bytes").unwrap();

        let err = SqliteKv::open(&path).err().unwrap();
        assert!(matches!(err, AppError::Storage(_)));
    }
}
