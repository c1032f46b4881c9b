//! Named Snapshot Store
//!
//! CRUD façade over a [`SnapshotBackend`]. Records are only ever replaced
//! whole; `update` skips the write when the structure did not change.

use crate::error::AppError;
use crate::introspection::{Dialect, Snapshot};
use crate::snapshot::backend::SnapshotBackend;
use crate::snapshot::diff::{DiffEngine, DiffReport};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

pub const NO_CHANGES_REASON: &str = "no changes detected";

/// A snapshot saved under a user-chosen name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedSnapshotRecord {
    pub name: String,
    pub dialect: Dialect,
    pub snapshot: Snapshot,
    /// When this record was last written
    pub saved_at: DateTime<Utc>,
}

/// Listing entry (lightweight, no table data)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotListing {
    pub name: String,
    pub dialect: Dialect,
    pub count_tables: usize,
    pub captured_at: DateTime<Utc>,
    pub saved_at: DateTime<Utc>,
    pub checksum: String,
}

impl From<&NamedSnapshotRecord> for SnapshotListing {
    fn from(record: &NamedSnapshotRecord) -> Self {
        Self {
            name: record.name.clone(),
            dialect: record.dialect,
            count_tables: record.snapshot.count_tables(),
            captured_at: record.snapshot.captured_at,
            saved_at: record.saved_at,
            checksum: record.snapshot.checksum(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOutcome {
    pub updated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub diff: DiffReport,
}

/// Store for managing named snapshots
#[derive(Clone)]
pub struct SnapshotStore {
    backend: Arc<dyn SnapshotBackend>,
}

impl SnapshotStore {
    pub fn new(backend: Arc<dyn SnapshotBackend>) -> Self {
        Self { backend }
    }

    /// Upsert: an existing record under `name` is fully replaced
    pub async fn save(
        &self,
        name: &str,
        snapshot: Snapshot,
        dialect: Option<Dialect>,
    ) -> Result<NamedSnapshotRecord, AppError> {
        let name = Self::normalize_name(name)?;
        let record = NamedSnapshotRecord {
            name: name.to_string(),
            dialect: dialect.unwrap_or(snapshot.dialect),
            snapshot,
            saved_at: Utc::now(),
        };

        self.backend.put(record.clone()).await?;

        info!(
            "Saved snapshot '{}': {} tables, checksum {}",
            record.name,
            record.snapshot.count_tables(),
            record.snapshot.checksum()
        );
        Ok(record)
    }

    pub async fn get(&self, name: &str) -> Result<NamedSnapshotRecord, AppError> {
        let name = Self::normalize_name(name)?;
        self.backend
            .get(name)
            .await?
            .ok_or_else(|| Self::not_found(name))
    }

    /// Compare the stored snapshot (old) against `new`
    pub async fn diff_against_stored(
        &self,
        name: &str,
        new: &Snapshot,
    ) -> Result<DiffReport, AppError> {
        let stored = self.get(name).await?;
        let diff = DiffEngine::diff(&stored.snapshot, new);

        debug!("Diff for '{}': {:?}", stored.name, diff.summary());
        Ok(diff)
    }

    /// Replace the stored snapshot only if its structure changed.
    ///
    /// "Changed" means table or column names or declared types differ.
    /// A nullability-only change is not a change: the stored record,
    /// nullability included, is kept and `updated` is false.
    pub async fn update(&self, name: &str, new: Snapshot) -> Result<UpdateOutcome, AppError> {
        let stored = self.get(name).await?;
        let diff = DiffEngine::diff(&stored.snapshot, &new);

        if diff.is_empty() {
            debug!("Update of '{}' skipped: {}", stored.name, NO_CHANGES_REASON);
            return Ok(UpdateOutcome {
                updated: false,
                reason: Some(NO_CHANGES_REASON.to_string()),
                diff,
            });
        }

        let record = NamedSnapshotRecord {
            name: stored.name,
            dialect: new.dialect,
            snapshot: new,
            saved_at: Utc::now(),
        };
        self.backend.put(record.clone()).await?;

        info!("Updated snapshot '{}': {:?}", record.name, diff.summary());
        Ok(UpdateOutcome {
            updated: true,
            reason: None,
            diff,
        })
    }

    /// Deleting an absent name is a `NotFound` error, so callers can tell
    /// "nothing to delete" apart from "deleted".
    pub async fn delete(&self, name: &str) -> Result<(), AppError> {
        let name = Self::normalize_name(name)?;
        if !self.backend.remove(name).await? {
            return Err(Self::not_found(name));
        }

        info!("Deleted snapshot '{}'", name);
        Ok(())
    }

    /// Names in backing-store creation order
    pub async fn list(&self) -> Result<Vec<String>, AppError> {
        Ok(self
            .backend
            .list()
            .await?
            .into_iter()
            .map(|record| record.name)
            .collect())
    }

    pub async fn list_items(&self) -> Result<Vec<SnapshotListing>, AppError> {
        Ok(self
            .backend
            .list()
            .await?
            .iter()
            .map(SnapshotListing::from)
            .collect())
    }

    fn normalize_name(name: &str) -> Result<&str, AppError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(AppError::InvalidName(
                "snapshot name must not be empty".to_string(),
            ));
        }
        Ok(trimmed)
    }

    fn not_found(name: &str) -> AppError {
        AppError::NotFound(format!("Snapshot '{}' not found", name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::introspection::Column;
    use crate::snapshot::backend::MemoryBackend;
    use pretty_assertions::assert_eq;

    fn store() -> SnapshotStore {
        SnapshotStore::new(Arc::new(MemoryBackend::new()))
    }

    fn snapshot() -> Snapshot {
        Snapshot::empty().with_table(
            "users",
            vec![
                Column::new("id", "integer", false),
                Column::new("email", "text", false),
            ],
        )
    }

    #[tokio::test]
    async fn test_save_rejects_blank_names() {
        let store = store();
        for name in ["", "   ", "\t\n"] {
            let err = store.save(name, snapshot(), None).await.unwrap_err();
            assert!(matches!(err, AppError::InvalidName(_)));
        }
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_is_upsert() {
        let store = store();
        store.save("neon_demo", snapshot(), None).await.unwrap();

        let replacement = Snapshot::empty().with_table("orders", vec![]);
        store
            .save(" neon_demo ", replacement.clone(), Some(Dialect::Postgres))
            .await
            .unwrap();

        assert_eq!(store.list().await.unwrap(), vec!["neon_demo"]);
        assert_eq!(store.get("neon_demo").await.unwrap().snapshot, replacement);
    }

    #[tokio::test]
    async fn test_diff_against_missing_name() {
        let err = store()
            .diff_against_stored("nope", &snapshot())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_diff_against_stored() {
        let store = store();
        store.save("app", snapshot(), None).await.unwrap();

        let newer = snapshot().with_table("orders", vec![Column::new("id", "integer", false)]);
        let diff = store.diff_against_stored("app", &newer).await.unwrap();

        assert_eq!(diff.added_tables.len(), 1);
        assert!(diff.added_tables.contains("orders"));
    }

    #[tokio::test]
    async fn test_update_without_changes_does_not_write() {
        let store = store();
        let saved = store.save("app", snapshot(), None).await.unwrap();

        // same structure, different capture time
        let mut same = snapshot();
        same.captured_at = saved.snapshot.captured_at + chrono::Duration::minutes(5);

        let outcome = store.update("app", same).await.unwrap();
        assert!(!outcome.updated);
        assert_eq!(outcome.reason.as_deref(), Some(NO_CHANGES_REASON));
        assert!(outcome.diff.is_empty());

        let after = store.get("app").await.unwrap();
        assert_eq!(after, saved);
        assert_eq!(
            serde_json::to_vec(&after).unwrap(),
            serde_json::to_vec(&saved).unwrap()
        );
    }

    #[tokio::test]
    async fn test_update_with_changes_overwrites() {
        let store = store();
        store.save("app", snapshot(), None).await.unwrap();

        let changed = Snapshot::empty().with_table(
            "users",
            vec![
                Column::new("id", "bigint", false),
                Column::new("email", "text", false),
            ],
        );
        let outcome = store.update("app", changed.clone()).await.unwrap();

        assert!(outcome.updated);
        assert_eq!(outcome.reason, None);
        assert_eq!(outcome.diff.changed_tables["users"].type_changes.len(), 1);
        assert_eq!(store.get("app").await.unwrap().snapshot, changed);
    }

    #[tokio::test]
    async fn test_update_with_nullability_only_change_keeps_record() {
        let store = store();
        let saved = store.save("shop", snapshot(), None).await.unwrap();

        let relaxed = Snapshot::empty().with_table(
            "users",
            vec![
                Column::new("id", "integer", true),
                Column::new("email", "text", true),
            ],
        );
        let outcome = store.update("shop", relaxed).await.unwrap();

        assert!(!outcome.updated);
        assert_eq!(outcome.reason.as_deref(), Some(NO_CHANGES_REASON));
        assert_eq!(store.get("shop").await.unwrap(), saved);
    }

    #[tokio::test]
    async fn test_update_missing_name() {
        let err = store().update("ghost", snapshot()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_twice_is_not_found() {
        let store = store();
        store.save("app", snapshot(), None).await.unwrap();

        store.delete("app").await.unwrap();
        let err = store.delete("app").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_items_in_creation_order() {
        let store = store();
        store.save("second", snapshot(), None).await.unwrap();
        store.save("first", Snapshot::empty(), None).await.unwrap();

        let items = store.list_items().await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].name, "second");
        assert_eq!(items[0].count_tables, 1);
        assert_eq!(items[0].checksum, snapshot().checksum());
        assert_eq!(items[1].name, "first");
        assert_eq!(items[1].count_tables, 0);
    }
}
