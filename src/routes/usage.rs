//! Usage odometer route handlers

use crate::error::ApiResult;
use crate::models::SuccessResponse;
use crate::state::SharedState;
use crate::usage::{OdometerReading, PriceTable};
use axum::{extract::State, Json};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingInfo {
    pub enabled: bool,
    pub input_price_per_thousand: f64,
    pub output_price_per_thousand: f64,
}

impl From<&PriceTable> for PricingInfo {
    fn from(prices: &PriceTable) -> Self {
        Self {
            enabled: prices.is_enabled(),
            input_price_per_thousand: prices.input_price_per_thousand,
            output_price_per_thousand: prices.output_price_per_thousand,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UsageResponse {
    pub odometer: OdometerReading,
    pub pricing: PricingInfo,
}

/// Current cumulative totals
pub async fn get_usage(
    State(state): State<SharedState>,
) -> ApiResult<Json<SuccessResponse<UsageResponse>>> {
    let odometer = state.odometer.read().await?;

    Ok(Json(SuccessResponse::with_data(
        "Usage totals.",
        UsageResponse {
            odometer,
            pricing: PricingInfo::from(&state.pricing),
        },
    )))
}

/// Zero both totals
pub async fn reset_usage(
    State(state): State<SharedState>,
) -> ApiResult<Json<SuccessResponse<UsageResponse>>> {
    let odometer = state.odometer.reset().await?;

    Ok(Json(SuccessResponse::with_data(
        "Usage totals reset.",
        UsageResponse {
            odometer,
            pricing: PricingInfo::from(&state.pricing),
        },
    )))
}
