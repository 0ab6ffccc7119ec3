//! Configuration management for the warehouse administration server
//!
//! TOML configuration file support with environment variable overrides and
//! defaults for everything except the warehouse target itself.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::retry::{PollPolicy, RetryPolicy};
use crate::transport::TransportConfig;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ApplicationConfig {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerSection,

    /// Warehouse target
    #[serde(default)]
    pub warehouse: WarehouseConfig,

    /// Statement execution service connection
    #[serde(default)]
    pub statement_service: ServiceEndpointConfig,

    /// Telemetry service connection
    #[serde(default)]
    pub metrics_service: ServiceEndpointConfig,

    /// Status polling schedule
    #[serde(default)]
    pub polling: PollingConfig,

    /// Cost and runtime insight settings
    #[serde(default)]
    pub insight: InsightConfig,

    /// Monitoring and observability
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerSection {
    /// Listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Log level (error, warn, info, debug, trace) or a full filter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// CORS allowed origins (empty = allow all origins)
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,
}

/// Warehouse target
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WarehouseConfig {
    /// Default database for statements
    #[serde(default)]
    pub database: String,

    /// Serverless workgroup
    #[serde(default)]
    pub workgroup_name: Option<String>,

    /// Provisioned cluster
    #[serde(default)]
    pub cluster_identifier: Option<String>,

    /// Database user (provisioned clusters)
    #[serde(default)]
    pub db_user: Option<String>,

    /// Cloud region, used to derive service endpoints
    #[serde(default = "default_region")]
    pub region: String,
}

/// Connection settings for one external service
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceEndpointConfig {
    /// Endpoint URL; derived from the region when unset
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Bearer token sent to the endpoint
    #[serde(default)]
    pub auth_token: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Retries for transient transport failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First retry delay in milliseconds
    #[serde(default = "default_retry_initial_delay_ms")]
    pub retry_initial_delay_ms: u64,
}

/// Status polling schedule
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PollingConfig {
    /// First pause between status checks in milliseconds
    #[serde(default = "default_poll_initial_ms")]
    pub initial_interval_ms: u64,

    /// Longest pause between status checks in milliseconds
    #[serde(default = "default_poll_max_interval_ms")]
    pub max_interval_ms: u64,

    /// Growth factor between pauses
    #[serde(default = "default_poll_multiplier")]
    pub multiplier: f64,

    /// Maximum total wait per statement in seconds
    #[serde(default = "default_poll_max_wait_secs")]
    pub max_wait_secs: u64,
}

/// Cost and runtime insight settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InsightConfig {
    /// Namespace of the cost metric
    #[serde(default = "default_cost_namespace")]
    pub cost_namespace: String,

    /// Cost metric name
    #[serde(default = "default_cost_metric")]
    pub cost_metric: String,

    /// Dimension the cost metric is broken down by
    #[serde(default = "default_cost_dimension")]
    pub cost_dimension: String,

    /// Cost dimension values to query
    #[serde(default = "default_cost_dimension_values")]
    pub cost_dimension_values: Vec<String>,

    /// Trailing cost window in days
    #[serde(default = "default_cost_window_days")]
    pub cost_window_days: u32,

    /// Cost aggregation period in seconds
    #[serde(default = "default_cost_period_secs")]
    pub cost_period_secs: u32,

    /// Namespace of the runtime metric
    #[serde(default = "default_runtime_namespace")]
    pub runtime_namespace: String,

    /// Runtime metric name
    #[serde(default = "default_runtime_metric")]
    pub runtime_metric: String,

    /// Dimension the runtime metric is broken down by
    #[serde(default = "default_runtime_dimension")]
    pub runtime_dimension: String,

    /// Runtime dimension values (cluster identifiers); defaults to the
    /// warehouse cluster when empty
    #[serde(default)]
    pub runtime_dimension_values: Vec<String>,

    /// Trailing runtime window in days
    #[serde(default = "default_runtime_window_days")]
    pub runtime_window_days: u32,

    /// Runtime aggregation period in seconds
    #[serde(default = "default_runtime_period_secs")]
    pub runtime_period_secs: u32,

    /// Cost above which reserved capacity is suggested
    #[serde(default = "default_high_cost_threshold")]
    pub high_cost_threshold: f64,

    /// Cost above which downscaling is suggested
    #[serde(default = "default_low_cost_threshold")]
    pub low_cost_threshold: f64,

    /// Entries returned by ranking endpoints when no limit is given
    #[serde(default = "default_top_limit")]
    pub default_limit: usize,
}

/// Monitoring configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MonitoringConfig {
    /// Expose Prometheus metrics at `/metrics`
    #[serde(default = "default_true")]
    pub prometheus_enabled: bool,
}

// Default value functions
fn default_listen_addr() -> String { "0.0.0.0:8000".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_region() -> String { "ap-south-2".to_string() }
fn default_request_timeout_secs() -> u64 { 30 }
fn default_max_retries() -> u32 { 3 }
fn default_retry_initial_delay_ms() -> u64 { 100 }
fn default_poll_initial_ms() -> u64 { 100 }
fn default_poll_max_interval_ms() -> u64 { 2_000 }
fn default_poll_multiplier() -> f64 { 2.0 }
fn default_poll_max_wait_secs() -> u64 { 300 }
fn default_cost_namespace() -> String { "AWS/Billing".to_string() }
fn default_cost_metric() -> String { "EstimatedCharges".to_string() }
fn default_cost_dimension() -> String { "ServiceName".to_string() }
fn default_cost_dimension_values() -> Vec<String> { vec!["AmazonRedshift".to_string()] }
fn default_cost_window_days() -> u32 { 30 }
fn default_cost_period_secs() -> u32 { 86_400 }
fn default_runtime_namespace() -> String { "AWS/Redshift".to_string() }
fn default_runtime_metric() -> String { "QueryRuntime".to_string() }
fn default_runtime_dimension() -> String { "ClusterIdentifier".to_string() }
fn default_runtime_window_days() -> u32 { 7 }
fn default_runtime_period_secs() -> u32 { 3_600 }
fn default_high_cost_threshold() -> f64 { 1_000.0 }
fn default_low_cost_threshold() -> f64 { 500.0 }
fn default_top_limit() -> usize { 5 }
fn default_true() -> bool { true }

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            log_level: default_log_level(),
            cors_allowed_origins: Vec::new(),
        }
    }
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            database: String::new(),
            workgroup_name: None,
            cluster_identifier: None,
            db_user: None,
            region: default_region(),
        }
    }
}

impl Default for ServiceEndpointConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            auth_token: None,
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
            retry_initial_delay_ms: default_retry_initial_delay_ms(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            initial_interval_ms: default_poll_initial_ms(),
            max_interval_ms: default_poll_max_interval_ms(),
            multiplier: default_poll_multiplier(),
            max_wait_secs: default_poll_max_wait_secs(),
        }
    }
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            cost_namespace: default_cost_namespace(),
            cost_metric: default_cost_metric(),
            cost_dimension: default_cost_dimension(),
            cost_dimension_values: default_cost_dimension_values(),
            cost_window_days: default_cost_window_days(),
            cost_period_secs: default_cost_period_secs(),
            runtime_namespace: default_runtime_namespace(),
            runtime_metric: default_runtime_metric(),
            runtime_dimension: default_runtime_dimension(),
            runtime_dimension_values: Vec::new(),
            runtime_window_days: default_runtime_window_days(),
            runtime_period_secs: default_runtime_period_secs(),
            high_cost_threshold: default_high_cost_threshold(),
            low_cost_threshold: default_low_cost_threshold(),
            default_limit: default_top_limit(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            prometheus_enabled: true,
        }
    }
}

impl PollingConfig {
    /// Polling schedule for the orchestrator
    pub fn policy(&self) -> PollPolicy {
        PollPolicy {
            initial_interval: Duration::from_millis(self.initial_interval_ms),
            max_interval: Duration::from_millis(self.max_interval_ms),
            multiplier: self.multiplier,
            max_wait: Duration::from_secs(self.max_wait_secs),
        }
    }
}

impl ServiceEndpointConfig {
    /// Transport settings, deriving the endpoint from `default_endpoint` when unset
    pub fn transport(&self, default_endpoint: String) -> TransportConfig {
        let endpoint = self
            .endpoint
            .clone()
            .filter(|e| !e.is_empty())
            .unwrap_or(default_endpoint);
        TransportConfig::with_endpoint(endpoint)
            .auth_token(self.auth_token.clone())
            .request_timeout(Duration::from_secs(self.request_timeout_secs))
            .retry_policy(RetryPolicy {
                max_retries: self.max_retries,
                initial_delay: Duration::from_millis(self.retry_initial_delay_ms),
                ..Default::default()
            })
    }
}

impl WarehouseConfig {
    /// Regional statement service endpoint
    pub fn statement_endpoint(&self) -> String {
        format!("https://redshift-data.{}.amazonaws.com/", self.region)
    }

    /// Regional telemetry service endpoint
    pub fn metrics_endpoint(&self) -> String {
        format!("https://monitoring.{}.amazonaws.com/", self.region)
    }
}

impl InsightConfig {
    /// Runtime dimension values, falling back to `cluster`
    pub fn resolved_runtime_values(&self, cluster: Option<&str>) -> Vec<String> {
        if !self.runtime_dimension_values.is_empty() {
            return self.runtime_dimension_values.clone();
        }
        cluster
            .filter(|c| !c.is_empty())
            .map(|c| vec![c.to_string()])
            .unwrap_or_default()
    }

    /// Validate insight settings
    pub fn validate(&self) -> Result<(), String> {
        if self.cost_dimension_values.iter().all(|v| v.trim().is_empty()) {
            return Err("At least one cost dimension value is required".to_string());
        }
        if self.runtime_dimension_values.iter().all(|v| v.trim().is_empty()) {
            return Err(
                "Runtime dimension value is required (set insight.runtime_dimension_values or warehouse.cluster_identifier)"
                    .to_string(),
            );
        }
        if self.cost_window_days == 0 || self.runtime_window_days == 0 {
            return Err("Insight windows must be at least one day".to_string());
        }
        if self.cost_period_secs == 0 || self.runtime_period_secs == 0 {
            return Err("Insight periods must be > 0".to_string());
        }
        if !(self.high_cost_threshold.is_finite() && self.low_cost_threshold.is_finite()) {
            return Err("Cost thresholds must be finite".to_string());
        }
        if self.high_cost_threshold < self.low_cost_threshold {
            return Err("High cost threshold must be >= low cost threshold".to_string());
        }
        if self.default_limit == 0 {
            return Err("Default limit must be > 0".to_string());
        }
        Ok(())
    }
}

impl ApplicationConfig {
    /// Load configuration from a TOML file and apply environment overrides
    pub fn load(path: &str) -> Result<Self, String> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self, String> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {}", path, e))?;

        toml::from_str(&contents)
            .map_err(|e| format!("Failed to parse config file {}: {}", path, e))
    }

    /// Load from environment variables only
    pub fn from_env() -> Result<Self, String> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    ///
    /// `WAREHOUSE_*` variables take precedence over the legacy
    /// `REDSHIFT_*`/`AWS_REGION` names.
    pub fn apply_env_overrides(&mut self) -> Result<(), String> {
        // Server
        if let Some(addr) = env_var(&["WAREHOUSE_LISTEN_ADDR"]) {
            self.server.listen_addr = addr;
        }
        if let Some(level) = env_var(&["RUST_LOG"]) {
            self.server.log_level = level;
        }

        // Warehouse
        if let Some(database) = env_var(&["WAREHOUSE_DATABASE", "REDSHIFT_DATABASE"]) {
            self.warehouse.database = database;
        }
        if let Some(workgroup) = env_var(&["WAREHOUSE_WORKGROUP"]) {
            self.warehouse.workgroup_name = Some(workgroup);
        }
        if let Some(cluster) = env_var(&["WAREHOUSE_CLUSTER_ID", "REDSHIFT_CLUSTER_ID"]) {
            self.warehouse.cluster_identifier = Some(cluster);
        }
        if let Some(user) = env_var(&["WAREHOUSE_DB_USER", "REDSHIFT_USER"]) {
            self.warehouse.db_user = Some(user);
        }
        if let Some(region) = env_var(&["WAREHOUSE_REGION", "AWS_REGION"]) {
            self.warehouse.region = region;
        }

        // Services
        if let Some(endpoint) = env_var(&["WAREHOUSE_STATEMENT_ENDPOINT"]) {
            self.statement_service.endpoint = Some(endpoint);
        }
        if let Some(endpoint) = env_var(&["WAREHOUSE_METRICS_ENDPOINT"]) {
            self.metrics_service.endpoint = Some(endpoint);
        }
        if let Some(token) = env_var(&["WAREHOUSE_AUTH_TOKEN"]) {
            self.statement_service.auth_token = Some(token.clone());
            self.metrics_service.auth_token = Some(token);
        }

        // Polling
        if let Some(wait) = env_var(&["WAREHOUSE_POLL_MAX_WAIT_SECS"]) {
            self.polling.max_wait_secs = wait
                .parse()
                .map_err(|e| format!("Invalid WAREHOUSE_POLL_MAX_WAIT_SECS '{}': {}", wait, e))?;
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.server.listen_addr.trim().is_empty() {
            return Err("Server listen address cannot be empty".to_string());
        }

        if self.warehouse.database.trim().is_empty() {
            return Err("Warehouse database is required".to_string());
        }
        if self.warehouse.workgroup_name.is_none() && self.warehouse.cluster_identifier.is_none() {
            return Err(
                "Either warehouse.workgroup_name or warehouse.cluster_identifier is required"
                    .to_string(),
            );
        }
        if self.warehouse.region.trim().is_empty() {
            return Err("Warehouse region cannot be empty".to_string());
        }

        self.polling.policy().validate()?;
        self.resolved_insight().validate()?;

        Ok(())
    }

    /// Insight settings with runtime dimension values resolved
    pub fn resolved_insight(&self) -> InsightConfig {
        let mut insight = self.insight.clone();
        insight.runtime_dimension_values = self
            .insight
            .resolved_runtime_values(self.warehouse.cluster_identifier.as_deref());
        insight
    }

    /// Save configuration to TOML file
    pub fn save_to_file(&self, path: &str) -> Result<(), String> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        std::fs::write(path, contents)
            .map_err(|e| format!("Failed to write config file {}: {}", path, e))
    }
}

fn env_var(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|v| !v.trim().is_empty())
}
