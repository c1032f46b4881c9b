//! Connection route handlers
//!
//! Local connection-string checks and the gated schema fetch.

use crate::connection::{ConnectionValidator, Finding, ValidationResult};
use crate::error::{validation_error, ApiResult};
use crate::gate::{decode_body, AccessGate, CatalogOnlyExplanation, GateOutcome};
use crate::introspection::{Dialect, Snapshot};
use crate::models::SuccessResponse;
use crate::state::SharedState;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

fn default_schema() -> String {
    "public".to_string()
}

/// Request to check a connection string
#[derive(Debug, Deserialize)]
pub struct ValidateConnectionRequest {
    #[serde(alias = "dbUrl")]
    pub db_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateConnectionResponse {
    pub blocking: bool,
    #[serde(flatten)]
    pub result: ValidationResult,
}

/// Check a connection string without contacting anything
pub async fn validate_connection(
    Json(payload): Json<ValidateConnectionRequest>,
) -> ApiResult<Json<SuccessResponse<ValidateConnectionResponse>>> {
    let result = ConnectionValidator::validate(&payload.db_url);
    let blocking = result.is_blocking();

    let message = match result.error() {
        Some(finding) => finding.message.clone(),
        None => "Connection string looks valid.".to_string(),
    };

    Ok(Json(SuccessResponse::with_data(
        message,
        ValidateConnectionResponse { blocking, result },
    )))
}

/// Request to fetch a schema snapshot through the upstream function
#[derive(Debug, Deserialize)]
pub struct FetchSchemaRequest {
    #[serde(alias = "dbUrl")]
    pub db_url: String,
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default)]
    pub dialect: Option<String>,
}

/// Either a usable snapshot or the one non-fatal policy state
#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FetchOutcome {
    Snapshot {
        snapshot: Snapshot,
        advisories: Vec<Finding>,
    },
    CatalogOnlyRequired {
        notice: CatalogOnlyExplanation,
    },
}

/// Validate locally, fetch upstream, then run the access gate
pub async fn fetch_schema(
    State(state): State<SharedState>,
    Json(payload): Json<FetchSchemaRequest>,
) -> ApiResult<Json<SuccessResponse<FetchOutcome>>> {
    let validation = ConnectionValidator::validate(&payload.db_url);
    if let Some(finding) = validation.error() {
        return Err(validation_error(finding.message.clone()));
    }

    let dialect = match payload.dialect.as_deref() {
        None => Dialect::default(),
        Some(raw) => Dialect::parse(raw)
            .ok_or_else(|| validation_error(format!("Unsupported dialect '{}'", raw)))?,
    };

    let schema = payload.schema.trim();
    let schema = if schema.is_empty() { "public" } else { schema };

    if let Some(descriptor) = &validation.descriptor {
        debug!("Fetching schema '{}' via {}", schema, descriptor.to_display_string());
    }

    let reply = state.fetcher.fetch(payload.db_url.trim(), schema).await?;
    let body = decode_body(&reply.body);

    match AccessGate::interpret(reply.status, &body, dialect).into_result()? {
        GateOutcome::Snapshot(snapshot) => {
            info!("Fetched snapshot with {} tables", snapshot.count_tables());
            let advisories: Vec<Finding> = validation.advisories().cloned().collect();

            Ok(Json(SuccessResponse::with_data(
                format!("Fetched {} tables.", snapshot.count_tables()),
                FetchOutcome::Snapshot {
                    snapshot,
                    advisories,
                },
            )))
        }
        GateOutcome::CatalogOnly(notice) => {
            warn!("Upstream requires a catalog-only role (HTTP {})", reply.status);
            let notice = notice.consume();

            Ok(Json(SuccessResponse::with_data(
                notice.message,
                FetchOutcome::CatalogOnlyRequired { notice },
            )))
        }
    }
}
