//! Application state management
//!
//! Contains shared state accessible across all handlers.

use crate::config::Settings;
use crate::error::AppError;
use crate::snapshot::{MemoryBackend, SnapshotStore};
use crate::upstream::{
    FunctionsClient, HttpQueryGenerator, HttpSnapshotFetcher, QueryGenerator, SnapshotFetcher,
};
use crate::usage::{Odometer, PriceTable, SqliteKv};
use std::sync::Arc;
use tracing::info;

/// Application state shared across all handlers
pub struct AppState {
    /// Upstream schema introspection function
    pub fetcher: Arc<dyn SnapshotFetcher>,

    /// Upstream SQL generation function
    pub generator: Arc<dyn QueryGenerator>,

    /// Named snapshot store
    pub snapshots: SnapshotStore,

    /// Prices used by the usage meter
    pub pricing: PriceTable,

    /// Cumulative usage totals
    pub odometer: Odometer,
}

impl AppState {
    pub fn new(
        fetcher: Arc<dyn SnapshotFetcher>,
        generator: Arc<dyn QueryGenerator>,
        snapshots: SnapshotStore,
        pricing: PriceTable,
        odometer: Odometer,
    ) -> Self {
        Self {
            fetcher,
            generator,
            snapshots,
            pricing,
            odometer,
        }
    }

    /// Wire the HTTP collaborators and stores described by `settings`
    pub fn from_settings(settings: &Settings) -> Result<Self, AppError> {
        let client = Arc::new(FunctionsClient::new(&settings.upstream)?);

        let odometer = match &settings.odometer.path {
            Some(path) => {
                info!("Odometer persisted at {}", path.display());
                Odometer::new(Box::new(SqliteKv::open(path)?))
            }
            None => {
                info!("Odometer kept in memory (set ODOMETER_PATH to persist it)");
                Odometer::in_memory()
            }
        };

        Ok(Self::new(
            Arc::new(HttpSnapshotFetcher::new(client.clone())),
            Arc::new(HttpQueryGenerator::new(client)),
            SnapshotStore::new(Arc::new(MemoryBackend::new())),
            settings.pricing,
            odometer,
        ))
    }
}

/// Type alias for shared state
pub type SharedState = Arc<AppState>;
