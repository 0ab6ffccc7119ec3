//! Telemetry (metrics) service client
//!
//! The aggregator reads time-series datapoints through [`MetricsClient`].
//! A query names one metric and, optionally, one dimension with the values
//! to break it down by; each returned [`Datapoint`] carries the dimension
//! value it belongs to.

pub mod http;

pub use http::HttpMetricsClient;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use crate::error::ClientError;
use crate::types::TimeWindow;

/// Label applied to datapoints that carry no dimension value
pub const UNKNOWN_DIMENSION: &str = "Unknown";

/// Statistic requested for each period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Statistic {
    /// Largest sample
    Maximum,
    /// Smallest sample
    Minimum,
    /// Mean of samples
    Average,
    /// Sum of samples
    Sum,
    /// Number of samples
    SampleCount,
}

impl Statistic {
    /// Name used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Statistic::Maximum => "Maximum",
            Statistic::Minimum => "Minimum",
            Statistic::Average => "Average",
            Statistic::Sum => "Sum",
            Statistic::SampleCount => "SampleCount",
        }
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One metric query over a time window
#[derive(Debug, Clone, PartialEq)]
pub struct MetricQuery {
    /// Metric namespace, e.g. `AWS/Billing`
    pub namespace: String,
    /// Metric name, e.g. `EstimatedCharges`
    pub metric_name: String,
    /// Dimension to break the metric down by
    pub dimension_name: Option<String>,
    /// Dimension values to query; empty means the undimensioned metric
    pub dimension_values: Vec<String>,
    /// Query window
    pub window: TimeWindow,
    /// Aggregation period in seconds
    pub period_seconds: u32,
    /// Statistic computed per period
    pub statistic: Statistic,
}

impl MetricQuery {
    /// Query `namespace`/`metric_name` over `window`
    pub fn new(
        namespace: impl Into<String>,
        metric_name: impl Into<String>,
        window: TimeWindow,
        period_seconds: u32,
        statistic: Statistic,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            metric_name: metric_name.into(),
            dimension_name: None,
            dimension_values: Vec::new(),
            window,
            period_seconds,
            statistic,
        }
    }

    /// Break the metric down by `name`, one series per value
    pub fn with_dimension(mut self, name: impl Into<String>, values: Vec<String>) -> Self {
        self.dimension_name = Some(name.into());
        self.dimension_values = values;
        self
    }
}

/// One aggregated sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Datapoint {
    /// Dimension value this sample belongs to, or [`UNKNOWN_DIMENSION`]
    pub dimension: String,
    /// Start of the aggregation period
    pub timestamp: DateTime<Utc>,
    /// Value of the requested statistic
    pub value: f64,
    /// Unit reported by the service
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl Datapoint {
    /// Create a datapoint without unit
    pub fn new(dimension: impl Into<String>, timestamp: DateTime<Utc>, value: f64) -> Self {
        Self {
            dimension: dimension.into(),
            timestamp,
            value,
            unit: None,
        }
    }
}

/// Time-series read API
#[async_trait]
pub trait MetricsClient: Send + Sync + 'static {
    /// Datapoints matching `query`, in no particular order
    async fn query_datapoints(&self, query: &MetricQuery) -> Result<Vec<Datapoint>, ClientError>;
}
