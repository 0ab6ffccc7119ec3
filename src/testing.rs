//! In-memory clients for tests
//!
//! [`ScriptedStatementClient`] replays a fixed status sequence and a fixed set
//! of result pages; [`StaticMetricsClient`] serves canned datapoints. Both
//! record what they were asked so tests can assert on the calls made.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::error::ClientError;
use crate::statement::{ResultPage, StatementClient, SubmitRequest};
use crate::telemetry::{Datapoint, MetricQuery, MetricsClient};
use crate::types::{ExecutionStatus, StatementHandle, StatusReport};

type ErrorFactory = Box<dyn Fn() -> ClientError + Send + Sync>;

/// Statement client that follows a script
///
/// Every statement walks the same status script independently; once the
/// script is exhausted its last entry repeats. Result pages are keyed by the
/// cursor that requests them (`None` for the first page).
pub struct ScriptedStatementClient {
    statuses: Vec<StatusReport>,
    pages: HashMap<Option<String>, ResultPage>,
    describe_delay: Option<Duration>,
    cancel_result: Option<bool>,
    submit_error: Option<ErrorFactory>,
    describe_error: Option<ErrorFactory>,
    fetch_error: Option<ErrorFactory>,
    positions: Mutex<HashMap<String, usize>>,
    submitted: Mutex<Vec<SubmitRequest>>,
    fetched: Mutex<Vec<Option<String>>>,
    next_id: AtomicUsize,
    describe_calls: AtomicUsize,
    cancel_calls: AtomicUsize,
}

impl Default for ScriptedStatementClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedStatementClient {
    /// Client whose statements finish immediately with an empty first page
    pub fn new() -> Self {
        Self {
            statuses: vec![StatusReport::new(ExecutionStatus::Finished)],
            pages: HashMap::new(),
            describe_delay: None,
            cancel_result: None,
            submit_error: None,
            describe_error: None,
            fetch_error: None,
            positions: Mutex::new(HashMap::new()),
            submitted: Mutex::new(Vec::new()),
            fetched: Mutex::new(Vec::new()),
            next_id: AtomicUsize::new(0),
            describe_calls: AtomicUsize::new(0),
            cancel_calls: AtomicUsize::new(0),
        }
    }

    /// Status reports returned by successive describe calls
    pub fn with_statuses(mut self, statuses: Vec<StatusReport>) -> Self {
        if !statuses.is_empty() {
            self.statuses = statuses;
        }
        self
    }

    /// Page returned for `cursor`
    pub fn with_page(mut self, cursor: Option<&str>, page: ResultPage) -> Self {
        self.pages.insert(cursor.map(str::to_string), page);
        self
    }

    /// Simulated latency of each describe call
    pub fn with_describe_delay(mut self, delay: Duration) -> Self {
        self.describe_delay = Some(delay);
        self
    }

    /// Offer cancellation, answering with `accepted`
    pub fn with_cancel_support(mut self, accepted: bool) -> Self {
        self.cancel_result = Some(accepted);
        self
    }

    /// Fail every submit call
    pub fn with_submit_error(
        mut self,
        error: impl Fn() -> ClientError + Send + Sync + 'static,
    ) -> Self {
        self.submit_error = Some(Box::new(error));
        self
    }

    /// Fail every describe call
    pub fn with_describe_error(
        mut self,
        error: impl Fn() -> ClientError + Send + Sync + 'static,
    ) -> Self {
        self.describe_error = Some(Box::new(error));
        self
    }

    /// Fail every result fetch
    pub fn with_fetch_error(
        mut self,
        error: impl Fn() -> ClientError + Send + Sync + 'static,
    ) -> Self {
        self.fetch_error = Some(Box::new(error));
        self
    }

    /// Submit requests received so far
    pub fn submitted(&self) -> Vec<SubmitRequest> {
        self.submitted.lock().clone()
    }

    /// Cursors requested so far, in order
    pub fn fetched_cursors(&self) -> Vec<Option<String>> {
        self.fetched.lock().clone()
    }

    /// Describe calls received so far
    pub fn describe_calls(&self) -> usize {
        self.describe_calls.load(Ordering::SeqCst)
    }

    /// Cancel calls received so far
    pub fn cancel_calls(&self) -> usize {
        self.cancel_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatementClient for ScriptedStatementClient {
    async fn submit(&self, request: &SubmitRequest) -> Result<StatementHandle, ClientError> {
        if let Some(error) = &self.submit_error {
            return Err(error());
        }
        self.submitted.lock().push(request.clone());
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(StatementHandle::new(format!("stmt-{}", n)))
    }

    async fn describe(&self, handle: &StatementHandle) -> Result<StatusReport, ClientError> {
        self.describe_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.describe_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = &self.describe_error {
            return Err(error());
        }

        let mut positions = self.positions.lock();
        let position = positions.entry(handle.as_str().to_string()).or_insert(0);
        let index = (*position).min(self.statuses.len() - 1);
        *position += 1;
        Ok(self.statuses[index].clone())
    }

    async fn fetch_result_page(
        &self,
        _handle: &StatementHandle,
        cursor: Option<&str>,
    ) -> Result<ResultPage, ClientError> {
        self.fetched.lock().push(cursor.map(str::to_string));
        if let Some(error) = &self.fetch_error {
            return Err(error());
        }

        let key = cursor.map(str::to_string);
        match (self.pages.get(&key), cursor) {
            (Some(page), _) => Ok(page.clone()),
            (None, None) => Ok(ResultPage::default()),
            (None, Some(token)) => Err(ClientError::Service {
                status: 400,
                code: Some("ValidationException".to_string()),
                message: format!("invalid NextToken {}", token),
            }),
        }
    }

    fn supports_cancel(&self) -> bool {
        self.cancel_result.is_some()
    }

    async fn cancel(&self, _handle: &StatementHandle) -> Result<bool, ClientError> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        self.cancel_result.ok_or(ClientError::Unsupported("cancel"))
    }
}

/// Metrics client serving fixed datapoints per metric name
#[derive(Default)]
pub struct StaticMetricsClient {
    datapoints: HashMap<String, Vec<Datapoint>>,
    error: Option<String>,
    queries: Mutex<Vec<MetricQuery>>,
}

impl StaticMetricsClient {
    /// Client with no data
    pub fn new() -> Self {
        Self::default()
    }

    /// Datapoints returned for `metric_name`
    pub fn with_datapoints(mut self, metric_name: &str, points: Vec<Datapoint>) -> Self {
        self.datapoints
            .entry(metric_name.to_string())
            .or_default()
            .extend(points);
        self
    }

    /// Fail every query with a transport error
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }

    /// Queries received so far
    pub fn queries(&self) -> Vec<MetricQuery> {
        self.queries.lock().clone()
    }
}

#[async_trait]
impl MetricsClient for StaticMetricsClient {
    async fn query_datapoints(&self, query: &MetricQuery) -> Result<Vec<Datapoint>, ClientError> {
        self.queries.lock().push(query.clone());
        if let Some(message) = &self.error {
            return Err(ClientError::Transport(message.clone()));
        }
        Ok(self
            .datapoints
            .get(&query.metric_name)
            .cloned()
            .unwrap_or_default())
    }
}
