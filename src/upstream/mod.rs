//! Upstream functions
//!
//! Remote collaborators reached over HTTP: the schema introspection
//! function and the SQL generation function.

pub mod client;
pub mod fetcher;
pub mod generator;

pub use client::FunctionsClient;
pub use fetcher::{HttpSnapshotFetcher, SnapshotFetcher};
pub use generator::{GenerateRequest, HttpQueryGenerator, QueryGenerator};
