//! Query history and workload statistics
//!
//! Read-only statements against the warehouse's system query log, run
//! through the orchestrator like any other statement. Window bounds and
//! thresholds travel as named parameters; only the row limit, a validated
//! integer, is rendered into the SQL text.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::sync::Arc;

use crate::error::{AdminError, Result};
use crate::insight::validate_limit;
use crate::orchestrator::ExecutionOrchestrator;
use crate::result::{ResultSet, Value};
use crate::types::{ExecutionContext, TimeWindow};

/// Rows returned by history queries when no limit is given
pub const DEFAULT_HISTORY_LIMIT: usize = 10;
/// Runtime above which a query counts as long-running
pub const DEFAULT_LONG_RUNNING_THRESHOLD_MS: u64 = 10_000;

const HISTORY_SQL: &str = "\
SELECT query AS query_id,
       starttime AS start_time,
       endtime AS end_time,
       DATEDIFF(ms, starttime, endtime) AS execution_time_ms,
       TRIM(querytxt) AS query_text,
       aborted
FROM stl_query
WHERE userid > 1
  AND starttime BETWEEN :start_time AND :end_time
ORDER BY starttime DESC";

const LONG_RUNNING_SQL: &str = "\
SELECT q.query AS query_id,
       TRIM(u.usename) AS user_name,
       q.starttime AS start_time,
       DATEDIFF(ms, q.starttime, q.endtime) AS execution_time_ms
FROM stl_query q
LEFT JOIN pg_user u ON u.usesysid = q.userid
WHERE DATEDIFF(ms, q.starttime, q.endtime) > CAST(:threshold_ms AS BIGINT)
ORDER BY execution_time_ms DESC";

const STATISTICS_SQL: &str = "\
SELECT COUNT(*) AS total_queries,
       AVG(DATEDIFF(ms, starttime, endtime)) AS avg_execution_time_ms,
       COUNT(CASE WHEN aborted = 1 THEN 1 END) AS failed_queries
FROM stl_query
WHERE starttime BETWEEN :start_time AND :end_time";

/// Aggregate workload figures over the statistics window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryStatistics {
    /// Queries started in the window
    pub total_queries: i64,
    /// Mean runtime in milliseconds, rounded to 2 dp; 0 when no queries ran
    pub avg_execution_time_ms: f64,
    /// Aborted queries in the window
    pub failed_queries: i64,
}

/// History and statistics reader
pub struct QueryHistory {
    orchestrator: Arc<ExecutionOrchestrator>,
    context: ExecutionContext,
    statistics_window: ChronoDuration,
}

impl QueryHistory {
    /// Reader running statements under `context`
    pub fn new(orchestrator: Arc<ExecutionOrchestrator>, context: ExecutionContext) -> Self {
        Self {
            orchestrator,
            context,
            statistics_window: ChronoDuration::days(7),
        }
    }

    /// Recent statements, newest first
    ///
    /// Missing bounds default to the last 24 hours ending now.
    pub async fn history(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<ResultSet> {
        self.history_at(start, end, limit, Utc::now()).await
    }

    /// Recent statements with missing bounds resolved against `now`
    pub async fn history_at(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<ResultSet> {
        validate_limit(limit)?;
        let window = resolve_window(start, end, now)?;
        let ctx = self.context.clone().with_time_window(window);
        self.orchestrator
            .execute(&with_limit(HISTORY_SQL, limit), &ctx)
            .await
    }

    /// Slowest statements above `threshold_ms`, slowest first
    pub async fn long_running(&self, threshold_ms: u64, limit: usize) -> Result<ResultSet> {
        validate_limit(limit)?;
        let ctx = self
            .context
            .clone()
            .with_parameter("threshold_ms", threshold_ms.to_string());
        self.orchestrator
            .execute(&with_limit(LONG_RUNNING_SQL, limit), &ctx)
            .await
    }

    /// Workload figures over the last seven days
    pub async fn statistics(&self) -> Result<QueryStatistics> {
        self.statistics_at(Utc::now()).await
    }

    /// Workload figures over the seven days ending at `now`
    pub async fn statistics_at(&self, now: DateTime<Utc>) -> Result<QueryStatistics> {
        let ctx = self
            .context
            .clone()
            .with_time_window(TimeWindow::trailing(now, self.statistics_window));
        let result = self.orchestrator.execute(STATISTICS_SQL, &ctx).await?;
        statistics_from(&result)
    }
}

fn with_limit(sql: &str, limit: usize) -> String {
    format!("{}\nLIMIT {}", sql, limit)
}

fn resolve_window(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<TimeWindow> {
    let end = end.unwrap_or(now);
    let start = start.unwrap_or(end - ChronoDuration::days(1));
    TimeWindow::new(start, end)
}

fn statistics_from(result: &ResultSet) -> Result<QueryStatistics> {
    let row = result
        .first()
        .ok_or_else(|| AdminError::materialization("statistics query returned no rows"))?;

    let count = |name: &str| -> Result<i64> {
        match row.get(name) {
            Some(Value::Null) => Ok(0),
            Some(value) => value.as_i64().ok_or_else(|| {
                AdminError::materialization(format!("'{}' is not an integer: {}", name, value))
            }),
            None => Err(AdminError::materialization(format!("missing column '{}'", name))),
        }
    };

    let avg = match row.get("avg_execution_time_ms") {
        None => {
            return Err(AdminError::materialization(
                "missing column 'avg_execution_time_ms'",
            ))
        },
        Some(Value::Null) => 0.0,
        Some(value) => value.as_f64().ok_or_else(|| {
            AdminError::materialization(format!("average runtime is not numeric: {}", value))
        })?,
    };

    Ok(QueryStatistics {
        total_queries: count("total_queries")?,
        avg_execution_time_ms: round_2dp(avg),
        failed_queries: count("failed_queries")?,
    })
}

fn round_2dp(value: f64) -> f64 {
    Decimal::from_f64(value)
        .map(|d| d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|d| d.to_f64())
        .unwrap_or(0.0)
}
