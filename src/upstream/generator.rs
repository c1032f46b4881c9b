//! Query generator seam
//!
//! Natural-language-to-SQL generation happens upstream. Responses are
//! decoded with explicit defaults: `blocked` is false when absent, every
//! other field is optional.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::introspection::{Dialect, Snapshot};
use crate::upstream::client::{FunctionsClient, UpstreamReply};
use crate::usage::RawUsage;

#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest<'a> {
    pub nl: &'a str,
    pub schema: &'a Snapshot,
    pub dialect: Dialect,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub sql: Option<String>,
    #[serde(default)]
    pub blocked: bool,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub usage: Option<RawUsage>,
}

impl GenerateResponse {
    /// Interpret an upstream reply for the generate function
    pub fn from_reply(reply: UpstreamReply) -> Result<Self, AppError> {
        let UpstreamReply { status, body } = reply;
        match status {
            401 | 403 => Err(AppError::Unauthorized { status, body }),
            s if s >= 500 => Err(AppError::Upstream {
                status: Some(status),
                body,
            }),
            s if s >= 400 => Err(AppError::MalformedResponse { status, body }),
            _ => match serde_json::from_str::<GenerateResponse>(&body) {
                Ok(response) => Ok(response),
                Err(_) => Err(AppError::MalformedResponse { status, body }),
            },
        }
    }
}

#[async_trait]
pub trait QueryGenerator: Send + Sync {
    async fn generate(&self, request: &GenerateRequest<'_>) -> Result<GenerateResponse, AppError>;
}

pub struct HttpQueryGenerator {
    client: Arc<FunctionsClient>,
}

impl HttpQueryGenerator {
    pub const FUNCTION: &'static str = "generate_sql";

    pub fn new(client: Arc<FunctionsClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl QueryGenerator for HttpQueryGenerator {
    async fn generate(&self, request: &GenerateRequest<'_>) -> Result<GenerateResponse, AppError> {
        let reply = self.client.post_json(Self::FUNCTION, request).await?;
        GenerateResponse::from_reply(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(status: u16, body: &str) -> UpstreamReply {
        UpstreamReply {
            status,
            body: body.to_string(),
        }
    }

    #[test]
    fn test_decodes_full_response() {
        let response = GenerateResponse::from_reply(reply(
            200,
            r#"{"sql":"SELECT 1","usage":{"prompt_tokens":12,"completion_tokens":3,"total_tokens":15}}"#,
        ))
        .unwrap();

        assert_eq!(response.sql.as_deref(), Some("SELECT 1"));
        assert!(!response.blocked);
        assert_eq!(response.usage.unwrap().total_tokens, Some(15));
    }

    #[test]
    fn test_blocked_response() {
        let response = GenerateResponse::from_reply(reply(
            200,
            r#"{"blocked":true,"reason":"only SELECT statements are allowed"}"#,
        ))
        .unwrap();

        assert!(response.blocked);
        assert_eq!(response.sql, None);
        assert_eq!(response.usage, None);
    }

    #[test]
    fn test_server_error_keeps_body() {
        let err = GenerateResponse::from_reply(reply(500, "boom")).unwrap_err();
        match err {
            AppError::Upstream { status, body } => {
                assert_eq!(status, Some(500));
                assert_eq!(body, "boom");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_non_json_success_is_malformed() {
        let err = GenerateResponse::from_reply(reply(200, "<html>")).unwrap_err();
        assert!(matches!(err, AppError::MalformedResponse { status: 200, .. }));
    }

    #[test]
    fn test_forbidden_is_unauthorized() {
        let err = GenerateResponse::from_reply(reply(403, "{}")).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized { status: 403, .. }));
    }

    #[test]
    fn test_request_wire_shape() {
        let schema = Snapshot::empty();
        let value = serde_json::to_value(GenerateRequest {
            nl: "list users",
            schema: &schema,
            dialect: Dialect::Postgres,
        })
        .unwrap();

        assert_eq!(value["nl"], "list users");
        assert_eq!(value["dialect"], "postgres");
        assert_eq!(value["schema"]["countTables"], 0);
    }
}
