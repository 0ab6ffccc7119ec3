//! HTTP adapter for the statement execution service

use async_trait::async_trait;
use tracing::{debug, warn};

use super::wire::{
    CancelResponse, DescribeResponse, ResultPage, StatementIdRequest, SubmitRequest,
    SubmitResponse,
};
use super::StatementClient;
use crate::error::ClientError;
use crate::transport::{JsonTransport, TransportConfig};
use crate::types::{ExecutionStatus, StatementHandle, StatusReport};

const SERVICE: &str = "statement";
const TARGET_PREFIX: &str = "RedshiftData";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

/// Statement client over the service's JSON RPC endpoint
pub struct HttpStatementClient {
    transport: JsonTransport,
}

impl HttpStatementClient {
    /// Create a client for the configured endpoint
    pub fn new(config: TransportConfig) -> Result<Self, ClientError> {
        let transport = JsonTransport::new(SERVICE, TARGET_PREFIX, CONTENT_TYPE, config)?;
        debug!(endpoint = transport.endpoint(), "Statement client ready");
        Ok(Self { transport })
    }
}

#[async_trait]
impl StatementClient for HttpStatementClient {
    async fn submit(&self, request: &SubmitRequest) -> Result<StatementHandle, ClientError> {
        let response: SubmitResponse = self.transport.call("ExecuteStatement", request).await?;
        if response.id.is_empty() {
            return Err(ClientError::Decode("empty statement id".to_string()));
        }
        Ok(StatementHandle::new(response.id))
    }

    async fn describe(&self, handle: &StatementHandle) -> Result<StatusReport, ClientError> {
        let request = StatementIdRequest {
            id: handle.as_str(),
            next_token: None,
        };
        let response: DescribeResponse =
            self.transport.call("DescribeStatement", &request).await?;

        let status = ExecutionStatus::from_remote(&response.status).ok_or_else(|| {
            ClientError::Decode(format!("unknown statement status '{}'", response.status))
        })?;

        Ok(StatusReport {
            status,
            diagnostic: response.error.filter(|e| !e.is_empty()),
            has_result_set: response.has_result_set.unwrap_or(true),
            result_rows: response.result_rows.filter(|rows| *rows >= 0),
        })
    }

    async fn fetch_result_page(
        &self,
        handle: &StatementHandle,
        cursor: Option<&str>,
    ) -> Result<ResultPage, ClientError> {
        let request = StatementIdRequest {
            id: handle.as_str(),
            next_token: cursor,
        };
        self.transport.call("GetStatementResult", &request).await
    }

    fn supports_cancel(&self) -> bool {
        true
    }

    async fn cancel(&self, handle: &StatementHandle) -> Result<bool, ClientError> {
        let request = StatementIdRequest {
            id: handle.as_str(),
            next_token: None,
        };
        let response: CancelResponse = self.transport.call("CancelStatement", &request).await?;
        if !response.status {
            warn!(statement_id = %handle, "Cancel request was not accepted");
        }
        Ok(response.status)
    }
}
