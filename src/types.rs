//! Core request-scoped types shared by the orchestrator and its clients

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AdminError, Result};

/// Timestamp layout accepted by the warehouse for literal parameters
pub const SQL_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Opaque identifier of one submitted statement
///
/// Returned by the execution service on submission and owned by a single
/// orchestration. Never reused across queries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatementHandle(String);

impl StatementHandle {
    /// Wrap a service-issued identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StatementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalized lifecycle state of a statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    /// Accepted but not yet picked up by the engine
    Submitted,
    /// Executing
    Running,
    /// Completed successfully
    Finished,
    /// Completed with an error
    Failed,
    /// Cancelled before completion
    Aborted,
}

impl ExecutionStatus {
    /// Normalize the service vocabulary
    ///
    /// `PICKED` is still queued from the caller's point of view and `STARTED`
    /// is running. Unknown strings return `None`.
    pub fn from_remote(status: &str) -> Option<Self> {
        match status.trim().to_ascii_uppercase().as_str() {
            "SUBMITTED" | "PICKED" => Some(ExecutionStatus::Submitted),
            "STARTED" | "RUNNING" => Some(ExecutionStatus::Running),
            "FINISHED" => Some(ExecutionStatus::Finished),
            "FAILED" => Some(ExecutionStatus::Failed),
            "ABORTED" => Some(ExecutionStatus::Aborted),
            _ => None,
        }
    }

    /// Whether no further transition can occur
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Finished | ExecutionStatus::Failed | ExecutionStatus::Aborted
        )
    }

    /// Position along the lifecycle, used to detect regressions
    pub fn rank(&self) -> u8 {
        match self {
            ExecutionStatus::Submitted => 0,
            ExecutionStatus::Running => 1,
            ExecutionStatus::Finished | ExecutionStatus::Failed | ExecutionStatus::Aborted => 2,
        }
    }

    /// Stable label for logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Submitted => "submitted",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Finished => "finished",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Aborted => "aborted",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One status observation returned by the execution service
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    /// Normalized status
    pub status: ExecutionStatus,
    /// Diagnostic text, present on failure terminals
    pub diagnostic: Option<String>,
    /// Whether the statement produces a result set (false for DDL/DML)
    pub has_result_set: bool,
    /// Row count reported by the service, when known
    pub result_rows: Option<i64>,
}

impl StatusReport {
    /// A non-terminal or successful report without diagnostic
    pub fn new(status: ExecutionStatus) -> Self {
        Self {
            status,
            diagnostic: None,
            has_result_set: true,
            result_rows: None,
        }
    }

    /// A failure report carrying the service diagnostic
    pub fn failed(diagnostic: impl Into<String>) -> Self {
        Self {
            status: ExecutionStatus::Failed,
            diagnostic: Some(diagnostic.into()),
            has_result_set: false,
            result_rows: None,
        }
    }

    /// Mark the statement as producing no result set
    pub fn without_result_set(mut self) -> Self {
        self.has_result_set = false;
        self
    }
}

/// Closed time interval used for history queries and telemetry windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Inclusive start
    pub start: DateTime<Utc>,
    /// Inclusive end
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Create a window, rejecting `start > end`
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start > end {
            return Err(AdminError::invalid(format!(
                "time window start {} is after end {}",
                start.to_rfc3339(),
                end.to_rfc3339()
            )));
        }
        Ok(Self { start, end })
    }

    /// The window of `length` ending at `now`
    pub fn trailing(now: DateTime<Utc>, length: ChronoDuration) -> Self {
        Self {
            start: now - length,
            end: now,
        }
    }

    /// Window length
    pub fn duration(&self) -> ChronoDuration {
        self.end - self.start
    }
}

/// Named statement parameter bound by the execution service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlParameter {
    /// Parameter name, referenced as `:name` in the SQL text
    pub name: String,
    /// Parameter value as text
    pub value: String,
}

impl SqlParameter {
    /// Create a parameter
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Where and as whom a statement runs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionContext {
    /// Target database
    pub database: String,
    /// Serverless workgroup name
    pub workgroup_name: Option<String>,
    /// Provisioned cluster identifier
    pub cluster_identifier: Option<String>,
    /// Database user for provisioned clusters
    pub db_user: Option<String>,
    /// Optional window, bound as `:start_time` / `:end_time`
    pub time_window: Option<TimeWindow>,
    /// Additional named parameters
    pub parameters: Vec<SqlParameter>,
}

impl ExecutionContext {
    /// Context targeting `database` with no compute selected yet
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            ..Default::default()
        }
    }

    /// Run on a serverless workgroup
    pub fn with_workgroup(mut self, workgroup: impl Into<String>) -> Self {
        self.workgroup_name = Some(workgroup.into());
        self
    }

    /// Run on a provisioned cluster
    pub fn with_cluster(mut self, cluster_identifier: impl Into<String>) -> Self {
        self.cluster_identifier = Some(cluster_identifier.into());
        self
    }

    /// Set the database user
    pub fn with_db_user(mut self, db_user: impl Into<String>) -> Self {
        self.db_user = Some(db_user.into());
        self
    }

    /// Bind a time window
    pub fn with_time_window(mut self, window: TimeWindow) -> Self {
        self.time_window = Some(window);
        self
    }

    /// Bind an extra named parameter
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.push(SqlParameter::new(name, value));
        self
    }

    /// Same compute and identity, different database
    pub fn for_database(&self, database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            workgroup_name: self.workgroup_name.clone(),
            cluster_identifier: self.cluster_identifier.clone(),
            db_user: self.db_user.clone(),
            time_window: None,
            parameters: Vec::new(),
        }
    }

    /// All parameters sent with the statement, window bounds first
    pub fn bound_parameters(&self) -> Vec<SqlParameter> {
        let mut params = Vec::with_capacity(self.parameters.len() + 2);
        if let Some(window) = &self.time_window {
            params.push(SqlParameter::new(
                "start_time",
                window.start.format(SQL_TIMESTAMP_FORMAT).to_string(),
            ));
            params.push(SqlParameter::new(
                "end_time",
                window.end.format(SQL_TIMESTAMP_FORMAT).to_string(),
            ));
        }
        params.extend(self.parameters.iter().cloned());
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_status_normalization() {
        assert_eq!(
            ExecutionStatus::from_remote("PICKED"),
            Some(ExecutionStatus::Submitted)
        );
        assert_eq!(
            ExecutionStatus::from_remote("STARTED"),
            Some(ExecutionStatus::Running)
        );
        assert_eq!(
            ExecutionStatus::from_remote("finished"),
            Some(ExecutionStatus::Finished)
        );
        assert_eq!(ExecutionStatus::from_remote("ALL"), None);
    }

    #[test]
    fn test_terminal_states() {
        assert!(ExecutionStatus::Finished.is_terminal());
        assert!(ExecutionStatus::Failed.is_terminal());
        assert!(ExecutionStatus::Aborted.is_terminal());
        assert!(!ExecutionStatus::Running.is_terminal());
        assert!(ExecutionStatus::Running.rank() > ExecutionStatus::Submitted.rank());
    }

    #[test]
    fn test_window_rejects_inverted_bounds() {
        let start = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let err = TimeWindow::new(start, end).unwrap_err();
        assert!(matches!(err, AdminError::InvalidRequest(_)));
    }

    #[test]
    fn test_bound_parameters_include_window_first() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 2, 8, 30, 0).unwrap();
        let ctx = ExecutionContext::new("dev")
            .with_parameter("schema", "public")
            .with_time_window(TimeWindow::new(start, end).unwrap());

        let params = ctx.bound_parameters();
        assert_eq!(params.len(), 3);
        assert_eq!(params[0], SqlParameter::new("start_time", "2024-03-01 08:30:00"));
        assert_eq!(params[1], SqlParameter::new("end_time", "2024-03-02 08:30:00"));
        assert_eq!(params[2].name, "schema");
    }

    #[test]
    fn test_for_database_drops_bindings() {
        let ctx = ExecutionContext::new("dev")
            .with_workgroup("analytics")
            .with_parameter("x", "1");
        let other = ctx.for_database("sales");
        assert_eq!(other.database, "sales");
        assert_eq!(other.workgroup_name.as_deref(), Some("analytics"));
        assert!(other.parameters.is_empty());
    }
}
