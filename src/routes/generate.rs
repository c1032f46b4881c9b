//! SQL generation route handler

use crate::annotate::SqlAnnotator;
use crate::error::{validation_error, ApiResult};
use crate::introspection::{Dialect, Snapshot};
use crate::models::SuccessResponse;
use crate::state::SharedState;
use crate::upstream::GenerateRequest;
use crate::usage::{OdometerReading, UsageMeter, UsageRecord};
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};
use validator::Validate;

/// Request to turn a natural-language question into SQL
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GenerateSqlRequest {
    #[validate(custom(function = "not_blank"))]
    pub nl: String,

    /// Inline snapshot to generate against
    pub schema: Option<Snapshot>,

    /// Name of a stored snapshot, used when `schema` is absent
    pub snapshot_name: Option<String>,

    pub dialect: Option<Dialect>,

    /// Prefix the SQL with explanatory comments
    #[serde(default)]
    pub explain: bool,
}

fn not_blank(value: &str) -> Result<(), validator::ValidationError> {
    if value.trim().is_empty() {
        let mut err = validator::ValidationError::new("blank");
        err.message = Some("Question must not be empty".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateSqlResponse {
    pub sql: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotated_sql: Option<String>,
    pub blocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub usage: UsageRecord,
    pub cost_usd: f64,
    pub pricing_enabled: bool,
    /// Absent when the usage could not be recorded
    pub odometer: Option<OdometerReading>,
}

/// Generate SQL, meter the call and fold it into the odometer
pub async fn generate_sql(
    State(state): State<SharedState>,
    Json(payload): Json<GenerateSqlRequest>,
) -> ApiResult<Json<SuccessResponse<GenerateSqlResponse>>> {
    payload.validate().map_err(|e| validation_error(e.to_string()))?;

    let schema = match (payload.schema, payload.snapshot_name.as_deref()) {
        (Some(schema), _) => schema,
        (None, Some(name)) => state.snapshots.get(name).await?.snapshot,
        (None, None) => {
            return Err(validation_error(
                "Load a schema first: provide `schema` or `snapshotName`",
            ))
        }
    };
    let dialect = payload.dialect.unwrap_or(schema.dialect);

    debug!(
        "Generating {} SQL against {} tables",
        dialect,
        schema.count_tables()
    );

    let response = state
        .generator
        .generate(&GenerateRequest {
            nl: payload.nl.trim(),
            schema: &schema,
            dialect,
        })
        .await?;

    let usage = UsageRecord::from_raw(&response.usage.unwrap_or_default());
    let cost_usd = UsageMeter::record(&usage, &state.pricing);
    let odometer = match state.odometer.accumulate(cost_usd, usage.total_tokens).await {
        Ok(reading) => Some(reading),
        Err(e) => {
            error!("Failed to record usage ({} tokens, ${:.6}): {}", usage.total_tokens, cost_usd, e);
            None
        }
    };

    let sql = if response.blocked { None } else { response.sql };
    let annotated_sql = if payload.explain {
        sql.as_deref().map(SqlAnnotator::annotate)
    } else {
        None
    };

    let message = if response.blocked {
        info!("Generation blocked: {:?}", response.reason);
        "Query was blocked by the generator policy.".to_string()
    } else {
        info!("Generated SQL ({} tokens, ${:.6})", usage.total_tokens, cost_usd);
        "SQL generated.".to_string()
    };

    Ok(Json(SuccessResponse::with_data(
        message,
        GenerateSqlResponse {
            sql,
            annotated_sql,
            blocked: response.blocked,
            reason: response.reason,
            usage,
            cost_usd,
            pricing_enabled: state.pricing.is_enabled(),
            odometer,
        },
    )))
}
