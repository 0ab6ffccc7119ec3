//! Statement execution service client
//!
//! The orchestrator talks to the remote execution service only through the
//! [`StatementClient`] trait. [`HttpStatementClient`] is the production
//! adapter; [`crate::testing::ScriptedStatementClient`] replays canned
//! responses for tests.

pub mod http;
pub mod wire;

pub use http::HttpStatementClient;
pub use wire::{ResultPage, SubmitRequest, WireColumn, WireField};

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::ClientError;
use crate::types::{ExecutionContext, StatementHandle, StatusReport};

impl SubmitRequest {
    /// Build a submit request for `sql` under `ctx`
    ///
    /// Each request gets a fresh client token, so a retried send is
    /// recognised by the service instead of running the statement again.
    pub fn from_context(sql: impl Into<String>, ctx: &ExecutionContext) -> Self {
        Self {
            sql: sql.into(),
            database: ctx.database.clone(),
            workgroup_name: ctx.workgroup_name.clone(),
            cluster_identifier: ctx.cluster_identifier.clone(),
            db_user: ctx.db_user.clone(),
            parameters: ctx.bound_parameters(),
            client_token: Some(Uuid::new_v4().to_string()),
        }
    }
}

/// Asynchronous statement execution API
///
/// Implementations perform exactly one remote call per method; retries on
/// transient transport failures are the implementation's own business and
/// never surface as duplicated side effects to the caller.
#[async_trait]
pub trait StatementClient: Send + Sync + 'static {
    /// Hand a statement to the service and return its handle
    async fn submit(&self, request: &SubmitRequest) -> Result<StatementHandle, ClientError>;

    /// Current status of a submitted statement
    async fn describe(&self, handle: &StatementHandle) -> Result<StatusReport, ClientError>;

    /// One page of a finished statement's result
    ///
    /// `cursor` is `None` for the first page and the previous page's
    /// `next_token` afterwards.
    async fn fetch_result_page(
        &self,
        handle: &StatementHandle,
        cursor: Option<&str>,
    ) -> Result<ResultPage, ClientError>;

    /// Whether [`cancel`](Self::cancel) is offered
    fn supports_cancel(&self) -> bool {
        false
    }

    /// Ask the service to stop a running statement
    ///
    /// Returns whether the service accepted the request.
    async fn cancel(&self, _handle: &StatementHandle) -> Result<bool, ClientError> {
        Err(ClientError::Unsupported("cancel"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TimeWindow;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_submit_request_from_context() {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap();
        let ctx = ExecutionContext::new("dev")
            .with_cluster("analytics-cluster")
            .with_db_user("admin")
            .with_time_window(TimeWindow::new(start, end).unwrap());

        let request = SubmitRequest::from_context("SELECT 1", &ctx);
        assert_eq!(request.sql, "SELECT 1");
        assert_eq!(request.database, "dev");
        assert_eq!(request.cluster_identifier.as_deref(), Some("analytics-cluster"));
        assert_eq!(request.db_user.as_deref(), Some("admin"));
        assert_eq!(request.parameters.len(), 2);
        assert_eq!(request.parameters[0].name, "start_time");
    }

    #[test]
    fn test_each_request_gets_its_own_token() {
        let ctx = ExecutionContext::new("dev");
        let a = SubmitRequest::from_context("SELECT 1", &ctx);
        let b = SubmitRequest::from_context("SELECT 1", &ctx);
        assert!(a.client_token.is_some());
        assert_ne!(a.client_token, b.client_token);
    }
}
