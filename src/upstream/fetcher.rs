//! Snapshot fetcher seam
//!
//! The introspection service itself lives upstream; this module only
//! sends the request and hands the raw reply to the access gate.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::AppError;
use crate::upstream::client::{FunctionsClient, UpstreamReply};

#[derive(Debug, Clone, Serialize)]
pub struct FetchRequest<'a> {
    pub db_url: &'a str,
    pub schema: &'a str,
}

#[async_trait]
pub trait SnapshotFetcher: Send + Sync {
    /// Returns the upstream reply for any HTTP status; errors only on
    /// transport failure or timeout.
    async fn fetch(&self, db_url: &str, schema: &str) -> Result<UpstreamReply, AppError>;
}

pub struct HttpSnapshotFetcher {
    client: Arc<FunctionsClient>,
}

impl HttpSnapshotFetcher {
    pub const FUNCTION: &'static str = "fetch_schema";

    pub fn new(client: Arc<FunctionsClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SnapshotFetcher for HttpSnapshotFetcher {
    async fn fetch(&self, db_url: &str, schema: &str) -> Result<UpstreamReply, AppError> {
        self.client
            .post_json(Self::FUNCTION, &FetchRequest { db_url, schema })
            .await
    }
}
