//! Cost and runtime insight
//!
//! Three independent reads over trailing windows of telemetry:
//! - [`MetricsAggregator::total_cost`]: highest cumulative charge per
//!   dimension over the cost window, summed
//! - [`MetricsAggregator::top_queries`]: runtime datapoints ranked by value
//! - [`MetricsAggregator::optimization_suggestions`]: threshold rules applied
//!   to the total cost
//!
//! Nothing is cached and nothing is retried; a telemetry failure fails the
//! whole read.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::InsightConfig;
use crate::error::{AdminError, Result};
use crate::metrics::record_metrics_fetch;
use crate::telemetry::{Datapoint, MetricQuery, MetricsClient, Statistic};
use crate::types::TimeWindow;

/// Suggested when cost exceeds the high threshold
pub const RESERVED_CAPACITY_SUGGESTION: &str =
    "Consider switching to Reserved Instances to save up to 75%.";
/// Suggested when cost exceeds the low threshold
pub const DOWNSCALE_SUGGESTION: &str = "Check unused nodes and downscale if necessary.";
/// Returned when no rule fires
pub const OPTIMIZED_MESSAGE: &str = "Your costs are optimized.";
/// Note attached to a cost summary built from no datapoints
pub const NO_DATA_NOTE: &str = "no data";

/// Largest ranking a caller may request
pub const MAX_RANKING_LIMIT: usize = 1_000;

/// Cost rollup over the cost window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostSummary {
    /// Sum of the per-dimension values, rounded to cents
    pub total: f64,
    /// Highest charge per dimension value, rounded to cents
    pub per_dimension: BTreeMap<String, f64>,
    /// Explanation when the summary is not backed by data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl CostSummary {
    fn no_data() -> Self {
        Self {
            total: 0.0,
            per_dimension: BTreeMap::new(),
            note: Some(NO_DATA_NOTE.to_string()),
        }
    }
}

/// One entry of a runtime ranking
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedQuery {
    /// Runtime statistic for the period
    pub runtime: f64,
    /// Start of the period
    pub timestamp: DateTime<Utc>,
    /// Dimension value the sample belongs to
    pub dimension: String,
}

impl From<Datapoint> for RankedQuery {
    fn from(point: Datapoint) -> Self {
        Self {
            runtime: point.value,
            timestamp: point.timestamp,
            dimension: point.dimension,
        }
    }
}

struct SuggestionRule {
    threshold: f64,
    message: &'static str,
}

/// Cost and runtime aggregation over a [`MetricsClient`]
pub struct MetricsAggregator {
    client: Arc<dyn MetricsClient>,
    config: InsightConfig,
}

impl MetricsAggregator {
    /// Aggregator with validated settings
    pub fn new(client: Arc<dyn MetricsClient>, config: InsightConfig) -> Result<Self> {
        config.validate().map_err(AdminError::Configuration)?;
        Ok(Self { client, config })
    }

    /// Settings in use
    pub fn config(&self) -> &InsightConfig {
        &self.config
    }

    /// Total cost over the trailing cost window
    pub async fn total_cost(&self) -> Result<CostSummary> {
        self.total_cost_at(Utc::now()).await
    }

    /// Total cost over the cost window ending at `now`
    pub async fn total_cost_at(&self, now: DateTime<Utc>) -> Result<CostSummary> {
        let window = TimeWindow::trailing(
            now,
            ChronoDuration::days(i64::from(self.config.cost_window_days)),
        );
        let query = MetricQuery::new(
            self.config.cost_namespace.clone(),
            self.config.cost_metric.clone(),
            window,
            self.config.cost_period_secs,
            Statistic::Maximum,
        )
        .with_dimension(
            self.config.cost_dimension.clone(),
            self.config.cost_dimension_values.clone(),
        );

        let points = self.fetch(&query).await?;
        Ok(summarize_cost(&points))
    }

    /// Highest runtime datapoints over the trailing runtime window
    pub async fn top_queries(&self, limit: usize) -> Result<Vec<RankedQuery>> {
        self.top_queries_at(limit, Utc::now()).await
    }

    /// Highest runtime datapoints over the runtime window ending at `now`
    pub async fn top_queries_at(
        &self,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<RankedQuery>> {
        validate_limit(limit)?;
        let window = TimeWindow::trailing(
            now,
            ChronoDuration::days(i64::from(self.config.runtime_window_days)),
        );
        let query = MetricQuery::new(
            self.config.runtime_namespace.clone(),
            self.config.runtime_metric.clone(),
            window,
            self.config.runtime_period_secs,
            Statistic::Maximum,
        )
        .with_dimension(
            self.config.runtime_dimension.clone(),
            self.config.runtime_dimension_values.clone(),
        );

        let points = self.fetch(&query).await?;
        Ok(rank_descending(points, limit)
            .into_iter()
            .map(RankedQuery::from)
            .collect())
    }

    /// Cost-reduction suggestions, most impactful first
    pub async fn optimization_suggestions(&self) -> Result<Vec<String>> {
        self.optimization_suggestions_at(Utc::now()).await
    }

    /// Suggestions for the cost window ending at `now`
    pub async fn optimization_suggestions_at(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        let summary = self.total_cost_at(now).await?;
        Ok(self.suggestions_for(summary.total))
    }

    /// Suggestions for a known total cost
    pub fn suggestions_for(&self, total_cost: f64) -> Vec<String> {
        let rules = [
            SuggestionRule {
                threshold: self.config.high_cost_threshold,
                message: RESERVED_CAPACITY_SUGGESTION,
            },
            SuggestionRule {
                threshold: self.config.low_cost_threshold,
                message: DOWNSCALE_SUGGESTION,
            },
        ];

        let mut suggestions: Vec<String> = rules
            .iter()
            .filter(|rule| total_cost > rule.threshold)
            .map(|rule| rule.message.to_string())
            .collect();
        if suggestions.is_empty() {
            suggestions.push(OPTIMIZED_MESSAGE.to_string());
        }
        suggestions
    }

    async fn fetch(&self, query: &MetricQuery) -> Result<Vec<Datapoint>> {
        match self.client.query_datapoints(query).await {
            Ok(points) => {
                record_metrics_fetch(&query.metric_name, true);
                debug!(
                    metric = %query.metric_name,
                    datapoints = points.len(),
                    "Fetched datapoints"
                );
                Ok(points)
            },
            Err(e) => {
                record_metrics_fetch(&query.metric_name, false);
                warn!(metric = %query.metric_name, error = %e, "Datapoint fetch failed");
                Err(AdminError::MetricsFetch(e.to_string()))
            },
        }
    }
}

/// Reject rankings that are empty or unreasonably large
pub(crate) fn validate_limit(limit: usize) -> Result<()> {
    if limit == 0 || limit > MAX_RANKING_LIMIT {
        return Err(AdminError::invalid(format!(
            "limit must be between 1 and {}, got {}",
            MAX_RANKING_LIMIT, limit
        )));
    }
    Ok(())
}

fn round_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Per-dimension maximum, rounded, then summed
///
/// The cost metric is cumulative within a billing period, so the highest
/// sample in the window is the charge to date.
fn summarize_cost(points: &[Datapoint]) -> CostSummary {
    let mut maxima: BTreeMap<String, Decimal> = BTreeMap::new();
    for point in points {
        let Some(value) = Decimal::from_f64(point.value) else {
            warn!(dimension = %point.dimension, "Skipping non-finite cost datapoint");
            continue;
        };
        maxima
            .entry(point.dimension.clone())
            .and_modify(|max| *max = (*max).max(value))
            .or_insert(value);
    }

    if maxima.is_empty() {
        return CostSummary::no_data();
    }

    let mut total = Decimal::ZERO;
    let mut per_dimension = BTreeMap::new();
    for (dimension, max) in maxima {
        let rounded = round_cents(max);
        total += rounded;
        per_dimension.insert(dimension, rounded.to_f64().unwrap_or(0.0));
    }

    CostSummary {
        total: round_cents(total).to_f64().unwrap_or(0.0),
        per_dimension,
        note: None,
    }
}

/// Sort by value descending, ties in timestamp order, then truncate
fn rank_descending(mut points: Vec<Datapoint>, limit: usize) -> Vec<Datapoint> {
    points.sort_by_key(|p| p.timestamp);
    points.sort_by(|a, b| b.value.total_cmp(&a.value));
    points.truncate(limit);
    points
}
