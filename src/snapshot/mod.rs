//! Schema Snapshot Module
//!
//! Named snapshots of a database structure and the engine that compares them:
//! - Diff engine (added / removed / changed tables and columns)
//! - Store façade (save, diff against stored, update, delete, list)
//! - Backing storage trait with an in-memory implementation

pub mod backend;
pub mod diff;
pub mod store;

pub use backend::MemoryBackend;
pub use diff::DiffReport;
pub use store::{SnapshotStore, UpdateOutcome};
