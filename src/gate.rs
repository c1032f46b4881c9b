//! Access Gate
//!
//! Interprets the upstream fetch response. The catalog-only policy
//! rejection is a recoverable state, not an error: it produces a
//! [`CatalogOnlyNotice`] that the caller owns and consumes exactly once.

use crate::error::AppError;
use crate::introspection::{Dialect, Snapshot};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

/// Machine code sent by the introspection function when the connected role
/// can read table rows
pub const ROLE_NOT_CATALOG_ONLY: &str = "ROLE_NOT_CATALOG_ONLY";

/// Decision taken for one fetch response
#[derive(Debug)]
pub enum GateDecision {
    Proceed(Snapshot),
    Unauthorized { status: u16, body: Value },
    ServerError { status: u16, body: Value },
    CatalogOnlyRequired(CatalogOnlyNotice),
    MalformedResponse { status: u16, body: Value },
}

impl GateDecision {
    /// Convert into the snapshot, or the notice, or the matching error.
    pub fn into_result(self) -> Result<GateOutcome, AppError> {
        match self {
            GateDecision::Proceed(snapshot) => Ok(GateOutcome::Snapshot(snapshot)),
            GateDecision::CatalogOnlyRequired(notice) => Ok(GateOutcome::CatalogOnly(notice)),
            GateDecision::Unauthorized { status, body } => Err(AppError::Unauthorized {
                status,
                body: body_text(&body),
            }),
            GateDecision::ServerError { status, body } => Err(AppError::Upstream {
                status: Some(status),
                body: body_text(&body),
            }),
            GateDecision::MalformedResponse { status, body } => Err(AppError::MalformedResponse {
                status,
                body: body_text(&body),
            }),
        }
    }
}

/// Non-error outcomes of the gate
#[derive(Debug)]
pub enum GateOutcome {
    Snapshot(Snapshot),
    CatalogOnly(CatalogOnlyNotice),
}

/// One-shot explanation for the catalog-only state.
///
/// Not `Clone`: the only way to read it is [`CatalogOnlyNotice::consume`],
/// which takes it by value.
#[derive(Debug)]
pub struct CatalogOnlyNotice {
    status: u16,
}

/// What the presentation layer shows for a consumed notice
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogOnlyExplanation {
    pub code: &'static str,
    pub upstream_status: u16,
    pub message: &'static str,
    pub remediation: Vec<&'static str>,
}

impl CatalogOnlyNotice {
    pub fn consume(self) -> CatalogOnlyExplanation {
        CatalogOnlyExplanation {
            code: ROLE_NOT_CATALOG_ONLY,
            upstream_status: self.status,
            message: "The connected role has row-level SELECT access. Only catalog-only roles \
                      (schema metadata, no access to table rows) are accepted.",
            remediation: vec![
                "Connect with a separate role that has no SELECT privilege on user tables.",
                "Or switch to offline schema mode and upload the schema JSON without connecting.",
            ],
        }
    }
}

pub struct AccessGate;

impl AccessGate {
    /// Interpret an upstream status and its decoded body.
    ///
    /// A non-JSON body should be passed as `Value::String(raw)`.
    pub fn interpret(status: u16, body: &Value, dialect: Dialect) -> GateDecision {
        let decision = match status {
            401 | 403 if Self::policy_code(body) == Some(ROLE_NOT_CATALOG_ONLY) => {
                warn!("Upstream rejected a role with data access (HTTP {})", status);
                GateDecision::CatalogOnlyRequired(CatalogOnlyNotice { status })
            }
            401 | 403 => GateDecision::Unauthorized {
                status,
                body: body.clone(),
            },
            s if s >= 500 => GateDecision::ServerError {
                status,
                body: body.clone(),
            },
            s if s >= 400 => GateDecision::MalformedResponse {
                status,
                body: body.clone(),
            },
            _ => match body.get("tables") {
                None => GateDecision::MalformedResponse {
                    status,
                    body: body.clone(),
                },
                Some(_) => match Snapshot::from_fetch_body(body, dialect) {
                    Ok(snapshot) => GateDecision::Proceed(snapshot),
                    Err(reason) => {
                        warn!("Could not decode fetched snapshot: {}", reason);
                        GateDecision::MalformedResponse {
                            status,
                            body: body.clone(),
                        }
                    }
                },
            },
        };

        debug!("Gate decision for HTTP {}: {}", status, decision.label());
        decision
    }

    fn policy_code(body: &Value) -> Option<&str> {
        body.get("code").and_then(Value::as_str)
    }
}

impl GateDecision {
    fn label(&self) -> &'static str {
        match self {
            GateDecision::Proceed(_) => "proceed",
            GateDecision::Unauthorized { .. } => "unauthorized",
            GateDecision::ServerError { .. } => "server_error",
            GateDecision::CatalogOnlyRequired(_) => "catalog_only_required",
            GateDecision::MalformedResponse { .. } => "malformed_response",
        }
    }
}

/// Decode a raw response body, keeping non-JSON text as a string value
pub fn decode_body(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn body_text(body: &Value) -> String {
    match body {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
