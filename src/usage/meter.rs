//! Usage Meter
//!
//! Turns raw token counts reported by the SQL generator into a cost figure.

use serde::{Deserialize, Serialize};

/// Token counts as they arrive on the wire. Any field may be absent or,
/// from a misbehaving upstream, negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawUsage {
    #[serde(default)]
    pub prompt_tokens: Option<i64>,
    #[serde(default)]
    pub completion_tokens: Option<i64>,
    #[serde(default)]
    pub total_tokens: Option<i64>,
}

/// Sanitized token counts for one generator call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl UsageRecord {
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }

    /// Missing or negative counts become zero. A missing or zero total
    /// falls back to prompt + completion.
    pub fn from_raw(raw: &RawUsage) -> Self {
        let mut record = Self::new(clamp(raw.prompt_tokens), clamp(raw.completion_tokens));
        match clamp(raw.total_tokens) {
            0 => {}
            reported => record.total_tokens = reported,
        }
        record
    }
}

fn clamp(value: Option<i64>) -> u64 {
    value.filter(|v| *v > 0).map(|v| v as u64).unwrap_or(0)
}

/// USD prices per 1000 tokens. Both zero disables cost reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceTable {
    pub input_price_per_thousand: f64,
    pub output_price_per_thousand: f64,
}

impl PriceTable {
    pub fn new(input_price_per_thousand: f64, output_price_per_thousand: f64) -> Self {
        Self {
            input_price_per_thousand,
            output_price_per_thousand,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.input_price_per_thousand > 0.0 || self.output_price_per_thousand > 0.0
    }
}

pub struct UsageMeter;

impl UsageMeter {
    /// Cost of one call in USD, never negative
    pub fn record(usage: &UsageRecord, prices: &PriceTable) -> f64 {
        if !prices.is_enabled() {
            return 0.0;
        }

        let input = non_negative(prices.input_price_per_thousand);
        let output = non_negative(prices.output_price_per_thousand);

        let cost = (usage.prompt_tokens as f64 / 1000.0) * input
            + (usage.completion_tokens as f64 / 1000.0) * output;

        if cost.is_finite() && cost > 0.0 {
            cost
        } else {
            0.0
        }
    }
}

fn non_negative(price: f64) -> f64 {
    if price.is_finite() && price > 0.0 {
        price
    } else {
        0.0
    }
}
