//! JSON-over-HTTP transport shared by the service adapters
//!
//! Both external services speak the same RPC dialect: one POST endpoint, the
//! operation named in an `X-Amz-Target` header, JSON request and response
//! bodies, and a `{"__type", "message"}` error body. Request signing is left
//! to the gateway in front of the endpoint; an optional bearer token is
//! attached when configured.
//!
//! Transport failures, throttling and 5xx answers are retried here according
//! to the configured [`RetryPolicy`]. Nothing above this layer retries.

use crate::error::ClientError;
use crate::metrics::ADAPTER_RETRIES_TOTAL;
use crate::retry::RetryPolicy;
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

/// Connection settings for one external service
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Service endpoint URL
    pub endpoint: String,
    /// Optional bearer token added to every request
    pub auth_token: Option<String>,
    /// Per-request timeout
    /// Default: 30 seconds
    pub request_timeout: Duration,
    /// Connection establishment timeout
    /// Default: 5 seconds
    pub connect_timeout: Duration,
    /// Idle pooled connections kept per host
    /// Default: 16
    pub pool_max_idle_per_host: usize,
    /// Retry policy for transient failures
    pub retry: RetryPolicy,
}

impl TransportConfig {
    /// Settings for `endpoint` with defaults elsewhere
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            auth_token: None,
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            pool_max_idle_per_host: 16,
            retry: RetryPolicy::default(),
        }
    }

    /// Set the bearer token
    pub fn auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = token;
        self
    }

    /// Set the retry policy
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Set the per-request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Error body returned by the services
#[derive(Debug, Deserialize)]
struct ServiceErrorBody {
    #[serde(rename = "__type", default)]
    error_type: Option<String>,
    #[serde(alias = "Message", default)]
    message: Option<String>,
}

/// Pooled JSON RPC client for one service
///
/// Cheap to share behind an `Arc`; the underlying `reqwest::Client` pools
/// connections and is safe for concurrent use.
pub struct JsonTransport {
    http: reqwest::Client,
    endpoint: String,
    safe_endpoint: String,
    auth_token: Option<String>,
    retry: RetryPolicy,
    service: &'static str,
    target_prefix: &'static str,
    content_type: &'static str,
}

impl JsonTransport {
    /// Build a transport for `service`
    ///
    /// `target_prefix` is prepended to every operation name in the target
    /// header, e.g. `RedshiftData.ExecuteStatement`.
    pub fn new(
        service: &'static str,
        target_prefix: &'static str,
        content_type: &'static str,
        config: TransportConfig,
    ) -> Result<Self, ClientError> {
        let safe_endpoint = sanitize_url(&config.endpoint);
        Url::parse(&config.endpoint).map_err(|e| {
            ClientError::Transport(format!("invalid endpoint {}: {}", safe_endpoint, e))
        })?;

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: config.endpoint,
            safe_endpoint,
            auth_token: config.auth_token,
            retry: config.retry,
            service,
            target_prefix,
            content_type,
        })
    }

    /// Endpoint with credentials redacted, for logs
    pub fn endpoint(&self) -> &str {
        &self.safe_endpoint
    }

    /// Invoke `operation` with retries on transient failures
    pub async fn call<Req, Resp>(&self, operation: &str, body: &Req) -> Result<Resp, ClientError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let target = format!("{}.{}", self.target_prefix, operation);
        let payload = serde_json::to_vec(body)
            .map_err(|e| ClientError::Decode(format!("request encoding: {}", e)))?;

        let overall_start = Instant::now();
        let mut attempt = 0u32;

        loop {
            let attempt_start = Instant::now();
            match self.send_once(&target, payload.clone()).await {
                Ok(response) => {
                    debug!(
                        service = self.service,
                        operation,
                        attempt = attempt + 1,
                        duration_ms = attempt_start.elapsed().as_millis() as u64,
                        total_ms = overall_start.elapsed().as_millis() as u64,
                        "Request succeeded"
                    );
                    return Ok(response);
                },
                Err(e) if e.is_retriable() && self.retry.should_retry(attempt) => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    warn!(
                        service = self.service,
                        operation,
                        attempt = attempt + 1,
                        max_attempts = self.retry.max_retries + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retriable request failure"
                    );
                    ADAPTER_RETRIES_TOTAL
                        .with_label_values(&[self.service])
                        .inc();
                    attempt += 1;
                    tokio::time::sleep(delay).await;
                },
                Err(e) => {
                    warn!(
                        service = self.service,
                        operation,
                        attempt = attempt + 1,
                        total_ms = overall_start.elapsed().as_millis() as u64,
                        error = %e,
                        "Request failed"
                    );
                    return Err(e);
                },
            }
        }
    }

    async fn send_once<Resp: DeserializeOwned>(
        &self,
        target: &str,
        payload: Vec<u8>,
    ) -> Result<Resp, ClientError> {
        let mut request = self
            .http
            .post(&self.endpoint)
            .header(CONTENT_TYPE, self.content_type)
            .header("X-Amz-Target", target)
            .body(payload);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            ClientError::Transport(format!("{} ({})", e.without_url(), self.safe_endpoint))
        })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| {
            ClientError::Transport(format!("{} ({})", e.without_url(), self.safe_endpoint))
        })?;

        if status.is_success() {
            serde_json::from_slice(&body).map_err(|e| ClientError::Decode(e.to_string()))
        } else {
            Err(service_error(status.as_u16(), &body))
        }
    }
}

/// Build a [`ClientError::Service`] from an error response body
fn service_error(status: u16, body: &[u8]) -> ClientError {
    match serde_json::from_slice::<ServiceErrorBody>(body) {
        Ok(parsed) => {
            // "__type" may be namespaced: "com.amazon.coral#ValidationException"
            let code = parsed
                .error_type
                .map(|t| t.rsplit('#').next().unwrap_or(&t).to_string());
            let message = parsed
                .message
                .or_else(|| code.clone())
                .unwrap_or_else(|| "Unknown error".to_string());
            ClientError::Service {
                status,
                code,
                message,
            }
        },
        Err(_) => ClientError::Service {
            status,
            code: None,
            message: String::from_utf8_lossy(body).trim().to_string(),
        },
    }
}

/// Sanitizes a URL by redacting credentials
///
/// Masks any username and password so endpoints can be logged safely.
/// Unparseable input yields `"[invalid-url]"`.
pub fn sanitize_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("***"));
            }
            if !parsed.username().is_empty() {
                let _ = parsed.set_username("***");
            }
            parsed.to_string()
        },
        Err(_) => "[invalid-url]".to_string(),
    }
}
