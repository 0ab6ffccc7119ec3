//! Warehouse Admin - backend façade for a cloud data warehouse
//!
//! This library runs SQL through an asynchronous statement-execution
//! service and reads cost and runtime telemetry from a time-series metrics
//! service:
//! - Submit, poll with bounded exponential backoff, and page results into typed rows
//! - Cancellation and timeouts that stop polling and cancel remote work
//! - Cost totals, runtime rankings and optimization suggestions
//! - Query history, workload statistics and catalog browsing
//! - An axum HTTP API over all of the above

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod types;

/// Retry and polling backoff policies
pub mod retry;

/// JSON-over-HTTP plumbing shared by the service adapters
pub mod transport;

/// Statement-execution service client and wire types
pub mod statement;

/// Metrics service client and datapoint types
pub mod telemetry;

/// Typed rows assembled from paged results
pub mod result;

/// Submit, poll and materialize statements
pub mod orchestrator;

/// Cost and runtime analysis over metrics datapoints
pub mod insight;

/// Query history and workload statistics
pub mod history;

/// Database, schema and table listing
pub mod catalog;

/// Administration operations behind one façade
pub mod service;

/// HTTP router and handlers
pub mod api;

/// Prometheus metrics and telemetry
pub mod metrics;

/// Configuration management with TOML support
pub mod config;

/// In-memory clients for tests and local runs
pub mod testing;

// Re-export main types
pub use error::{AdminError, ClientError, ErrorKind, Result};
pub use orchestrator::ExecutionOrchestrator;
pub use result::{ResultSet, Row, Value};
pub use service::AdminService;
pub use types::{ExecutionContext, ExecutionStatus, StatementHandle, TimeWindow};
