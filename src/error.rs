//! Error types for the administration façade

use std::fmt;
use thiserror::Error;

/// Main error type for warehouse administration operations
///
/// Every variant maps to a stable [`ErrorKind`] so callers can branch on the
/// failure class without parsing messages. None of these are retried inside
/// the crate.
#[derive(Error, Debug)]
pub enum AdminError {
    /// The statement could not be handed to the execution service
    #[error("Submission error: {0}")]
    Submission(String),

    /// Status polling or result fetching failed at the transport level
    #[error("Statement transport error: {0}")]
    StatementTransport(String),

    /// The statement did not reach a terminal state in time
    #[error("Statement {statement_id} did not finish within {waited_ms} ms")]
    Timeout {
        /// Identifier of the statement that was still running
        statement_id: String,
        /// Time spent waiting before giving up
        waited_ms: u64,
    },

    /// The remote engine reported FAILED or ABORTED
    #[error("Query execution failed: {0}")]
    QueryExecution(String),

    /// The service returned a result shape that cannot be decoded
    #[error("Materialization error: {0}")]
    Materialization(String),

    /// The telemetry service could not be queried
    #[error("Metrics fetch error: {0}")]
    MetricsFetch(String),

    /// The caller cancelled the operation while it was waiting
    #[error("Statement {0} was cancelled")]
    Cancelled(String),

    /// The request was rejected before reaching any external service
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl AdminError {
    /// Stable failure class for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AdminError::Submission(_) => ErrorKind::Submission,
            AdminError::StatementTransport(_) => ErrorKind::StatementTransport,
            AdminError::Timeout { .. } => ErrorKind::Timeout,
            AdminError::QueryExecution(_) => ErrorKind::QueryExecution,
            AdminError::Materialization(_) => ErrorKind::Materialization,
            AdminError::MetricsFetch(_) => ErrorKind::MetricsFetch,
            AdminError::Cancelled(_) => ErrorKind::Cancelled,
            AdminError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            AdminError::Configuration(_) => ErrorKind::Configuration,
        }
    }

    /// Create an invalid request error
    pub fn invalid(message: impl Into<String>) -> Self {
        AdminError::InvalidRequest(message.into())
    }

    /// Create a materialization error
    pub fn materialization(message: impl Into<String>) -> Self {
        AdminError::Materialization(message.into())
    }
}

/// Categories of administration errors for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Statement hand-off failed (transport or auth)
    Submission,
    /// Polling or paging failed at the transport level
    StatementTransport,
    /// Maximum poll duration exceeded
    Timeout,
    /// Remote engine reported a failure terminal status
    QueryExecution,
    /// Malformed cell or column shape
    Materialization,
    /// Telemetry transport or auth failure
    MetricsFetch,
    /// Caller cancelled while waiting
    Cancelled,
    /// Rejected before any remote call
    InvalidRequest,
    /// Invalid or missing configuration
    Configuration,
}

impl ErrorKind {
    /// Stable machine-readable code
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Submission => "SUBMISSION_ERROR",
            ErrorKind::StatementTransport => "STATEMENT_TRANSPORT_ERROR",
            ErrorKind::Timeout => "TIMEOUT_ERROR",
            ErrorKind::QueryExecution => "QUERY_EXECUTION_ERROR",
            ErrorKind::Materialization => "MATERIALIZATION_ERROR",
            ErrorKind::MetricsFetch => "METRICS_FETCH_ERROR",
            ErrorKind::Cancelled => "CANCELLED",
            ErrorKind::InvalidRequest => "INVALID_REQUEST",
            ErrorKind::Configuration => "CONFIGURATION_ERROR",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by the external service adapters
///
/// These never leave the crate as-is: the orchestrator and aggregator fold
/// them into the matching [`AdminError`] variant for the operation that failed.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Connection, timeout or other I/O failure
    #[error("Transport failure: {0}")]
    Transport(String),

    /// The service answered with a non-success status
    #[error("Service returned {status}: {message}")]
    Service {
        /// HTTP status code
        status: u16,
        /// Service error code, when the body carried one
        code: Option<String>,
        /// Service-provided message
        message: String,
    },

    /// The response body did not match the expected shape
    #[error("Malformed response: {0}")]
    Decode(String),

    /// The operation is not offered by this client
    #[error("Operation not supported: {0}")]
    Unsupported(&'static str),
}

impl ClientError {
    /// Whether a fresh attempt may succeed
    ///
    /// Connection failures, throttling and server-side errors are transient;
    /// client errors and decode failures are not.
    pub fn is_retriable(&self) -> bool {
        match self {
            ClientError::Transport(_) => true,
            ClientError::Service { status, .. } => *status == 429 || *status >= 500,
            ClientError::Decode(_) | ClientError::Unsupported(_) => false,
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AdminError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_codes_are_stable() {
        assert_eq!(
            AdminError::QueryExecution("syntax error".into()).kind().as_str(),
            "QUERY_EXECUTION_ERROR"
        );
        assert_eq!(
            AdminError::Timeout {
                statement_id: "abc".into(),
                waited_ms: 10
            }
            .kind(),
            ErrorKind::Timeout
        );
        assert_eq!(ErrorKind::MetricsFetch.to_string(), "METRICS_FETCH_ERROR");
    }

    #[test]
    fn test_display_carries_diagnostic() {
        let err = AdminError::QueryExecution("syntax error at or near \"SELEC\"".into());
        assert!(err.to_string().contains("syntax error"));
    }

    #[test]
    fn test_client_error_retriable() {
        assert!(ClientError::Transport("reset".into()).is_retriable());
        assert!(ClientError::Service {
            status: 503,
            code: None,
            message: "unavailable".into()
        }
        .is_retriable());
        assert!(ClientError::Service {
            status: 429,
            code: Some("ThrottlingException".into()),
            message: "slow down".into()
        }
        .is_retriable());
        assert!(!ClientError::Service {
            status: 400,
            code: Some("ValidationException".into()),
            message: "bad".into()
        }
        .is_retriable());
        assert!(!ClientError::Decode("eof".into()).is_retriable());
    }
}
