//! Usage metering
//!
//! Per-call cost from token counts, and the running totals across calls.

pub mod meter;
pub mod odometer;

pub use meter::{PriceTable, RawUsage, UsageMeter, UsageRecord};
pub use odometer::{Odometer, OdometerReading, SqliteKv};
