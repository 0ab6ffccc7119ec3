//! Statement lifecycle orchestration
//!
//! [`ExecutionOrchestrator::execute`] drives one statement through
//! submit → poll → materialize:
//!
//! 1. The statement is submitted once. A failure here is
//!    [`AdminError::Submission`] and is not retried.
//! 2. Status is polled with exponential backoff (see [`PollPolicy`]) until a
//!    terminal state or until the maximum wait elapses
//!    ([`AdminError::Timeout`]).
//! 3. `FAILED`/`ABORTED` become [`AdminError::QueryExecution`] carrying the
//!    service diagnostic.
//! 4. `FINISHED` statements are materialized page by page; statements
//!    without a result set yield an empty [`ResultSet`].
//!
//! Cancellation is cooperative through a [`CancellationToken`]. Dropping the
//! returned future also stops polling; in that case the remote statement is
//! left to run to completion.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{AdminError, ClientError, Result};
use crate::metrics::record_statement;
use crate::result::{Materializer, ResultSet};
use crate::retry::PollPolicy;
use crate::statement::{StatementClient, SubmitRequest};
use crate::types::{ExecutionContext, ExecutionStatus, StatementHandle, StatusReport};

/// Runs statements against the execution service
///
/// Holds no per-request state; one instance serves any number of concurrent
/// executions.
pub struct ExecutionOrchestrator {
    client: Arc<dyn StatementClient>,
    policy: PollPolicy,
    materializer: Materializer,
}

impl ExecutionOrchestrator {
    /// Orchestrator over `client` with the given polling schedule
    pub fn new(client: Arc<dyn StatementClient>, policy: PollPolicy) -> Self {
        let materializer = Materializer::new(Arc::clone(&client));
        Self {
            client,
            policy,
            materializer,
        }
    }

    /// Limit result pages per statement
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.materializer = Materializer::new(Arc::clone(&self.client)).with_max_pages(max_pages);
        self
    }

    /// Polling schedule in use
    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Run `sql` under `ctx` and return its full result
    pub async fn execute(&self, sql: &str, ctx: &ExecutionContext) -> Result<ResultSet> {
        self.execute_with_cancel(sql, ctx, &CancellationToken::new()).await
    }

    /// Run `sql` under `ctx`, stopping early when `cancel` fires
    ///
    /// On cancellation the service is asked to stop the statement when it
    /// supports that; the call returns [`AdminError::Cancelled`] either way.
    pub async fn execute_with_cancel(
        &self,
        sql: &str,
        ctx: &ExecutionContext,
        cancel: &CancellationToken,
    ) -> Result<ResultSet> {
        let started = Instant::now();
        let mut trace = RunTrace::default();

        let result = self.run(sql, ctx, cancel, &mut trace).await;
        let elapsed = started.elapsed();
        let statement_id = trace.statement_id();

        match &result {
            Ok(rows) => {
                info!(
                    statement_id,
                    database = %ctx.database,
                    rows = rows.len(),
                    polls = trace.polls,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Statement completed"
                );
            },
            Err(e) => {
                warn!(
                    statement_id,
                    database = %ctx.database,
                    kind = %e.kind(),
                    polls = trace.polls,
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %e,
                    "Statement did not complete"
                );
            },
        }
        record_statement(outcome_label(&result), elapsed.as_secs_f64(), trace.polls);

        result
    }

    async fn run(
        &self,
        sql: &str,
        ctx: &ExecutionContext,
        cancel: &CancellationToken,
        trace: &mut RunTrace,
    ) -> Result<ResultSet> {
        if cancel.is_cancelled() {
            return Err(AdminError::Cancelled("(not submitted)".to_string()));
        }

        let request = SubmitRequest::from_context(sql, ctx);
        let handle = self
            .client
            .submit(&request)
            .await
            .map_err(|e| AdminError::Submission(e.to_string()))?;
        info!(statement_id = %handle, database = %ctx.database, "Statement submitted");
        trace.handle = Some(handle.clone());

        let report = match self.await_terminal(&handle, cancel, &mut trace.polls).await {
            Ok(report) => report,
            Err(e) => {
                if matches!(e, AdminError::Cancelled(_) | AdminError::Timeout { .. }) {
                    self.cancel_remote(&handle).await;
                }
                return Err(e);
            },
        };

        match report.status {
            ExecutionStatus::Finished if !report.has_result_set => {
                debug!(statement_id = %handle, "Statement produced no result set");
                Ok(ResultSet::empty())
            },
            ExecutionStatus::Finished => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(AdminError::Cancelled(handle.to_string())),
                    result = self.materializer.materialize(&handle) => result,
                }
            },
            _ => Err(AdminError::QueryExecution(
                report
                    .diagnostic
                    .unwrap_or_else(|| format!("statement {}", report.status)),
            )),
        }
    }

    /// Poll until a terminal status, the deadline, or cancellation
    async fn await_terminal(
        &self,
        handle: &StatementHandle,
        cancel: &CancellationToken,
        polls: &mut u32,
    ) -> Result<StatusReport> {
        let started = Instant::now();
        let deadline = started + self.policy.max_wait;
        let mut current: Option<ExecutionStatus> = None;

        loop {
            let report = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(AdminError::Cancelled(handle.to_string()));
                },
                _ = sleep_until(deadline) => {
                    return Err(timeout(handle, started.elapsed()));
                },
                report = self.client.describe(handle) => report.map_err(poll_error)?,
            };
            *polls += 1;

            match current {
                Some(prev) if report.status.rank() < prev.rank() => {
                    warn!(
                        statement_id = %handle,
                        from = %prev,
                        to = %report.status,
                        "Ignoring backwards status transition"
                    );
                },
                _ => {
                    if current != Some(report.status) {
                        debug!(
                            statement_id = %handle,
                            status = %report.status,
                            poll = *polls,
                            "Status changed"
                        );
                    }
                    current = Some(report.status);
                    if report.status.is_terminal() {
                        return Ok(report);
                    }
                },
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(timeout(handle, started.elapsed()));
            }
            let pause = self
                .policy
                .interval_for_attempt(*polls - 1)
                .min(deadline - now);

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Err(AdminError::Cancelled(handle.to_string()));
                },
                _ = sleep(pause) => {},
            }
        }
    }

    /// Best-effort remote stop; failures are logged only
    async fn cancel_remote(&self, handle: &StatementHandle) {
        if !self.client.supports_cancel() {
            debug!(statement_id = %handle, "Remote cancel not supported, statement left running");
            return;
        }
        match self.client.cancel(handle).await {
            Ok(true) => info!(statement_id = %handle, "Remote statement cancelled"),
            Ok(false) => warn!(statement_id = %handle, "Remote cancel was refused"),
            Err(e) => warn!(statement_id = %handle, error = %e, "Remote cancel failed"),
        }
    }
}

/// What one execution did, for the outcome log line
#[derive(Debug, Default)]
struct RunTrace {
    handle: Option<StatementHandle>,
    polls: u32,
}

impl RunTrace {
    fn statement_id(&self) -> &str {
        self.handle.as_ref().map_or("-", StatementHandle::as_str)
    }
}

fn timeout(handle: &StatementHandle, waited: Duration) -> AdminError {
    AdminError::Timeout {
        statement_id: handle.to_string(),
        waited_ms: waited.as_millis() as u64,
    }
}

fn poll_error(err: ClientError) -> AdminError {
    match err {
        ClientError::Decode(message) => AdminError::Materialization(message),
        other => AdminError::StatementTransport(other.to_string()),
    }
}

fn outcome_label(result: &Result<ResultSet>) -> &'static str {
    match result {
        Ok(_) => "finished",
        Err(AdminError::QueryExecution(_)) => "failed",
        Err(AdminError::Timeout { .. }) => "timeout",
        Err(AdminError::Cancelled(_)) => "cancelled",
        Err(_) => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::{ResultPage, WireColumn, WireField};
    use crate::testing::ScriptedStatementClient;

    fn fast_policy() -> PollPolicy {
        PollPolicy::default().with_max_wait(Duration::from_secs(5))
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_without_diagnostic_uses_status() {
        let client = Arc::new(ScriptedStatementClient::new().with_statuses(vec![
            StatusReport::new(ExecutionStatus::Aborted),
        ]));
        let orchestrator = ExecutionOrchestrator::new(client, fast_policy());

        let err = orchestrator
            .execute("SELECT 1", &ExecutionContext::new("dev"))
            .await
            .unwrap_err();
        match err {
            AdminError::QueryExecution(message) => assert_eq!(message, "statement aborted"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_backwards_transition_is_ignored() {
        let client = Arc::new(
            ScriptedStatementClient::new()
                .with_statuses(vec![
                    StatusReport::new(ExecutionStatus::Running),
                    StatusReport::new(ExecutionStatus::Submitted),
                    StatusReport::new(ExecutionStatus::Finished),
                ])
                .with_page(
                    None,
                    ResultPage::with_columns(
                        vec![WireColumn::new("n", "int4")],
                        vec![vec![WireField::long(5)]],
                    ),
                ),
        );
        let orchestrator = ExecutionOrchestrator::new(client.clone(), fast_policy());

        let result = orchestrator
            .execute("SELECT 5 AS n", &ExecutionContext::new("dev"))
            .await
            .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(client.describe_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_decode_failure_while_polling() {
        let client = Arc::new(
            ScriptedStatementClient::new().with_describe_error(|| {
                ClientError::Decode("unknown statement status 'ALL'".into())
            }),
        );
        let orchestrator = ExecutionOrchestrator::new(client, fast_policy());

        let err = orchestrator
            .execute("SELECT 1", &ExecutionContext::new("dev"))
            .await
            .unwrap_err();
        assert!(matches!(err, AdminError::Materialization(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pre_cancelled_token_skips_submission() {
        let client = Arc::new(ScriptedStatementClient::new());
        let orchestrator = ExecutionOrchestrator::new(client.clone(), fast_policy());
        let token = CancellationToken::new();
        token.cancel();

        let err = orchestrator
            .execute_with_cancel("SELECT 1", &ExecutionContext::new("dev"), &token)
            .await
            .unwrap_err();
        assert!(matches!(err, AdminError::Cancelled(_)));
        assert!(client.submitted().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_trace_keeps_statement_id() {
        let client = Arc::new(ScriptedStatementClient::new().with_statuses(vec![
            StatusReport::new(ExecutionStatus::Running),
            StatusReport::new(ExecutionStatus::Finished),
        ]));
        let orchestrator = ExecutionOrchestrator::new(client, fast_policy());
        let mut trace = RunTrace::default();

        orchestrator
            .run(
                "SELECT 1",
                &ExecutionContext::new("dev"),
                &CancellationToken::new(),
                &mut trace,
            )
            .await
            .unwrap();
        assert_eq!(trace.statement_id(), "stmt-1");
        assert_eq!(trace.polls, 2);
    }

    #[test]
    fn test_run_trace_before_submission() {
        assert_eq!(RunTrace::default().statement_id(), "-");
    }
}
