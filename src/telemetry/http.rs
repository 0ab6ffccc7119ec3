//! HTTP adapter for the telemetry service

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Datapoint, MetricQuery, MetricsClient, Statistic, UNKNOWN_DIMENSION};
use crate::error::ClientError;
use crate::transport::{JsonTransport, TransportConfig};

const SERVICE: &str = "metrics";
const TARGET_PREFIX: &str = "GraniteServiceVersion20100801";
const CONTENT_TYPE: &str = "application/x-amz-json-1.0";

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct WireDimension<'a> {
    name: &'a str,
    value: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetMetricStatisticsRequest<'a> {
    namespace: &'a str,
    metric_name: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    dimensions: Vec<WireDimension<'a>>,
    start_time: i64,
    end_time: i64,
    period: u32,
    statistics: [&'static str; 1],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetMetricStatisticsResponse {
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    datapoints: Vec<WireDatapoint>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireDatapoint {
    timestamp: f64,
    #[serde(default)]
    maximum: Option<f64>,
    #[serde(default)]
    minimum: Option<f64>,
    #[serde(default)]
    average: Option<f64>,
    #[serde(default)]
    sum: Option<f64>,
    #[serde(default)]
    sample_count: Option<f64>,
    #[serde(default)]
    unit: Option<String>,
}

impl WireDatapoint {
    fn statistic(&self, statistic: Statistic) -> Option<f64> {
        match statistic {
            Statistic::Maximum => self.maximum,
            Statistic::Minimum => self.minimum,
            Statistic::Average => self.average,
            Statistic::Sum => self.sum,
            Statistic::SampleCount => self.sample_count,
        }
    }
}

fn from_epoch_seconds(seconds: f64) -> Result<DateTime<Utc>, ClientError> {
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9) as u32;
    Utc.timestamp_opt(whole as i64, nanos)
        .single()
        .ok_or_else(|| ClientError::Decode(format!("timestamp out of range: {}", seconds)))
}

/// Telemetry client over the service's JSON RPC endpoint
///
/// Issues one request per dimension value and labels every datapoint with
/// the value it was requested for.
pub struct HttpMetricsClient {
    transport: JsonTransport,
}

impl HttpMetricsClient {
    /// Create a client for the configured endpoint
    pub fn new(config: TransportConfig) -> Result<Self, ClientError> {
        let transport = JsonTransport::new(SERVICE, TARGET_PREFIX, CONTENT_TYPE, config)?;
        debug!(endpoint = transport.endpoint(), "Metrics client ready");
        Ok(Self { transport })
    }

    async fn fetch_series(
        &self,
        query: &MetricQuery,
        dimension: Option<(&str, &str)>,
    ) -> Result<Vec<Datapoint>, ClientError> {
        let request = GetMetricStatisticsRequest {
            namespace: &query.namespace,
            metric_name: &query.metric_name,
            dimensions: dimension
                .map(|(name, value)| vec![WireDimension { name, value }])
                .unwrap_or_default(),
            start_time: query.window.start.timestamp(),
            end_time: query.window.end.timestamp(),
            period: query.period_seconds,
            statistics: [query.statistic.as_str()],
        };

        let response: GetMetricStatisticsResponse =
            self.transport.call("GetMetricStatistics", &request).await?;

        let label = match dimension {
            Some((_, value)) => value.to_string(),
            None => response
                .label
                .filter(|l| !l.is_empty())
                .unwrap_or_else(|| UNKNOWN_DIMENSION.to_string()),
        };

        let mut points = Vec::with_capacity(response.datapoints.len());
        for wire in response.datapoints {
            // Periods without the requested statistic are skipped
            let Some(value) = wire.statistic(query.statistic) else {
                continue;
            };
            points.push(Datapoint {
                dimension: label.clone(),
                timestamp: from_epoch_seconds(wire.timestamp)?,
                value,
                unit: wire.unit,
            });
        }
        Ok(points)
    }
}

#[async_trait]
impl MetricsClient for HttpMetricsClient {
    async fn query_datapoints(&self, query: &MetricQuery) -> Result<Vec<Datapoint>, ClientError> {
        let Some(dimension_name) = query.dimension_name.as_deref() else {
            return self.fetch_series(query, None).await;
        };

        let mut all = Vec::new();
        for value in &query.dimension_values {
            let points = self
                .fetch_series(query, Some((dimension_name, value.as_str())))
                .await?;
            all.extend(points);
        }
        Ok(all)
    }
}
