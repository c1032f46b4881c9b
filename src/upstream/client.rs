//! HTTP client for the upstream functions
//!
//! One shared `reqwest::Client` with the bearer key and timeout applied.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use tracing::debug;

use crate::config::UpstreamConfig;
use crate::error::AppError;

/// Raw upstream reply: status and body text, kept verbatim
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamReply {
    pub status: u16,
    pub body: String,
}

pub struct FunctionsClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl FunctionsClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, AppError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(api_key) = &config.api_key {
            let auth_value = format!("Bearer {}", api_key);
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&auth_value)
                    .map_err(|e| AppError::Config(format!("invalid upstream api key: {}", e)))?,
            );
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| AppError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: config.functions_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn url_for(&self, function: &str) -> String {
        format!("{}/{}", self.base_url, function.trim_start_matches('/'))
    }

    /// POST a JSON payload. Transport failures and timeouts become
    /// `AppError::Upstream`; any HTTP status is returned as a reply.
    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        function: &str,
        payload: &T,
    ) -> Result<UpstreamReply, AppError> {
        let url = self.url_for(function);

        let response = self.http_client.post(&url).json(payload).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        debug!("POST {} -> HTTP {} ({} bytes)", url, status, body.len());
        Ok(UpstreamReply { status, body })
    }
}
