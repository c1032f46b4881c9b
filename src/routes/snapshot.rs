//! Named snapshot API routes
//!
//! Save, update, delete and diff stored snapshots.

use crate::error::ApiResult;
use crate::introspection::{Dialect, Snapshot};
use crate::models::{MessageResponse, SuccessResponse};
use crate::snapshot::store::{NamedSnapshotRecord, SnapshotListing};
use crate::snapshot::{DiffReport, UpdateOutcome};
use crate::state::SharedState;
use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

// ==================== Request/Response Types ====================

#[derive(Debug, Serialize)]
pub struct SnapshotListResponse {
    pub success: bool,
    pub names: Vec<String>,
    pub items: Vec<SnapshotListing>,
}

#[derive(Debug, Serialize)]
pub struct SnapshotRecordResponse {
    pub success: bool,
    pub record: NamedSnapshotRecord,
}

/// One store operation, selected by `op`
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum SnapshotOperation {
    Save {
        name: String,
        schema: Snapshot,
        #[serde(default)]
        dialect: Option<Dialect>,
    },
    Update {
        name: String,
        #[serde(alias = "newSchema", alias = "schema")]
        new_schema: Snapshot,
    },
    Delete {
        name: String,
    },
    Diff {
        name: String,
        #[serde(alias = "newSchema", alias = "schema")]
        new_schema: Snapshot,
    },
}

#[derive(Debug, Serialize)]
pub struct SavedBody {
    pub saved: SnapshotListing,
}

#[derive(Debug, Serialize)]
pub struct DeletedBody {
    pub deleted: String,
}

#[derive(Debug, Serialize)]
pub struct DiffBody {
    pub diff: DiffReport,
}

// ==================== Handlers ====================

/// List stored snapshots in creation order
pub async fn list_snapshots(
    State(state): State<SharedState>,
) -> ApiResult<Json<SnapshotListResponse>> {
    let names = state.snapshots.list().await?;
    let items = state.snapshots.list_items().await?;

    Ok(Json(SnapshotListResponse {
        success: true,
        names,
        items,
    }))
}

/// Get one stored snapshot by name
pub async fn get_snapshot(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> ApiResult<Json<SnapshotRecordResponse>> {
    let record = state.snapshots.get(&name).await?;

    Ok(Json(SnapshotRecordResponse {
        success: true,
        record,
    }))
}

/// Dispatch a save/update/delete/diff operation
pub async fn snapshot_operation(
    State(state): State<SharedState>,
    Json(payload): Json<SnapshotOperation>,
) -> ApiResult<Response> {
    let response = match payload {
        SnapshotOperation::Save {
            name,
            schema,
            dialect,
        } => {
            let record = state.snapshots.save(&name, schema, dialect).await?;
            let saved = SnapshotListing::from(&record);

            Json(SuccessResponse::with_data(
                format!("Saved snapshot '{}'.", saved.name),
                SavedBody { saved },
            ))
            .into_response()
        }
        SnapshotOperation::Update { name, new_schema } => {
            let outcome: UpdateOutcome = state.snapshots.update(&name, new_schema).await?;
            let message = match &outcome.reason {
                Some(reason) => format!("Snapshot '{}' unchanged: {}.", name.trim(), reason),
                None => format!("Updated snapshot '{}'.", name.trim()),
            };

            Json(SuccessResponse::with_data(message, outcome)).into_response()
        }
        SnapshotOperation::Delete { name } => {
            state.snapshots.delete(&name).await?;
            let deleted = name.trim().to_string();

            Json(SuccessResponse::with_data(
                format!("Deleted snapshot '{}'.", deleted),
                DeletedBody { deleted },
            ))
            .into_response()
        }
        SnapshotOperation::Diff { name, new_schema } => {
            let diff = state.snapshots.diff_against_stored(&name, &new_schema).await?;
            let message = if diff.is_empty() {
                "No changes detected.".to_string()
            } else {
                let summary = diff.summary();
                format!(
                    "{} added, {} removed, {} modified tables.",
                    summary.tables_added, summary.tables_removed, summary.tables_modified
                )
            };

            Json(SuccessResponse::with_data(message, DiffBody { diff })).into_response()
        }
    };

    Ok(response)
}

/// Delete a stored snapshot by path
pub async fn delete_snapshot(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    state.snapshots.delete(&name).await?;

    Ok(Json(MessageResponse::new(format!(
        "Deleted snapshot '{}'.",
        name.trim()
    ))))
}
