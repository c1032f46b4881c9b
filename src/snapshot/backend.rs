//! Backing storage for named snapshots
//!
//! The store façade only needs name-keyed get/put/remove and an ordered
//! listing, so any key/value or object storage can sit behind this trait.

use crate::error::AppError;
use crate::snapshot::store::NamedSnapshotRecord;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[async_trait]
pub trait SnapshotBackend: Send + Sync {
    async fn get(&self, name: &str) -> Result<Option<NamedSnapshotRecord>, AppError>;

    /// Insert or fully replace the record stored under `record.name`
    async fn put(&self, record: NamedSnapshotRecord) -> Result<(), AppError>;

    /// Returns `false` when nothing was stored under `name`
    async fn remove(&self, name: &str) -> Result<bool, AppError>;

    /// All records in creation order
    async fn list(&self) -> Result<Vec<NamedSnapshotRecord>, AppError>;
}

#[derive(Default)]
struct MemoryInner {
    records: HashMap<String, NamedSnapshotRecord>,
    /// Names in creation order; a replacement keeps its slot
    order: Vec<String>,
}

/// In-process backend
#[derive(Default)]
pub struct MemoryBackend {
    inner: RwLock<MemoryInner>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotBackend for MemoryBackend {
    async fn get(&self, name: &str) -> Result<Option<NamedSnapshotRecord>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner.records.get(name).cloned())
    }

    async fn put(&self, record: NamedSnapshotRecord) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        if !inner.records.contains_key(&record.name) {
            inner.order.push(record.name.clone());
        }
        inner.records.insert(record.name.clone(), record);
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<bool, AppError> {
        let mut inner = self.inner.write().await;
        if inner.records.remove(name).is_none() {
            return Ok(false);
        }
        inner.order.retain(|n| n != name);
        Ok(true)
    }

    async fn list(&self) -> Result<Vec<NamedSnapshotRecord>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner
            .order
            .iter()
            .filter_map(|name| inner.records.get(name).cloned())
            .collect())
    }
}
