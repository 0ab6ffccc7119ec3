//! Request and response bodies for the HTTP API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Envelopes
// =============================================================================

/// Successful response: `{"status": "success", "message": ..., "data": ...}`
#[derive(Debug, Serialize)]
pub struct SuccessEnvelope<T: Serialize> {
    /// Always `success`
    pub status: &'static str,
    /// Human-readable summary
    pub message: String,
    /// Operation payload
    pub data: T,
}

impl<T: Serialize> SuccessEnvelope<T> {
    /// Wrap `data` with `message`
    pub fn new(message: impl Into<String>, data: T) -> Self {
        Self {
            status: "success",
            message: message.into(),
            data,
        }
    }
}

/// Failed response: `{"status": "error", "kind": ..., "message": ...}`
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    /// Always `error`
    pub status: &'static str,
    /// Stable error code, see [`ErrorKind::as_str`](crate::error::ErrorKind::as_str)
    pub kind: &'static str,
    /// Error description
    pub message: String,
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always `healthy` while the process serves requests
    pub status: &'static str,
    /// Crate version
    pub version: &'static str,
}

// =============================================================================
// Requests
// =============================================================================

/// Body of `POST /api/query/execute`
#[derive(Debug, Deserialize)]
pub struct ExecuteQueryRequest {
    /// Statement text
    pub sql: String,
    /// Database to run against instead of the configured one
    #[serde(default)]
    pub database: Option<String>,
}

/// Query string of `GET /api/query/history`
#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    /// Window start (RFC 3339); defaults to 24 hours before `end`
    pub start: Option<DateTime<Utc>>,
    /// Window end (RFC 3339); defaults to now
    pub end: Option<DateTime<Utc>>,
    /// Maximum rows
    pub limit: Option<usize>,
}

/// Query string of `GET /api/query/long-running`
#[derive(Debug, Default, Deserialize)]
pub struct LongRunningParams {
    /// Runtime threshold in milliseconds
    pub threshold_ms: Option<u64>,
    /// Maximum rows
    pub limit: Option<usize>,
}

/// Query string carrying only a limit
#[derive(Debug, Default, Deserialize)]
pub struct LimitParams {
    /// Maximum entries
    pub limit: Option<usize>,
}
