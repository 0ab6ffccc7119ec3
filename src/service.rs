//! Administration façade
//!
//! [`AdminService`] is the single entry point the HTTP layer talks to. It
//! owns one orchestrator and one aggregator over injected clients and
//! exposes every administration operation as an async method.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::catalog::{Catalog, TableInfo};
use crate::config::ApplicationConfig;
use crate::error::{AdminError, Result};
use crate::history::{QueryHistory, QueryStatistics};
use crate::insight::{CostSummary, MetricsAggregator, RankedQuery};
use crate::orchestrator::ExecutionOrchestrator;
use crate::result::ResultSet;
use crate::statement::{HttpStatementClient, StatementClient};
use crate::telemetry::{HttpMetricsClient, MetricsClient};
use crate::types::ExecutionContext;

/// Warehouse administration operations
pub struct AdminService {
    orchestrator: Arc<ExecutionOrchestrator>,
    aggregator: MetricsAggregator,
    history: QueryHistory,
    catalog: Catalog,
    context: ExecutionContext,
}

impl AdminService {
    /// Service over the given clients
    ///
    /// Fails with [`AdminError::Configuration`] when `config` does not
    /// validate.
    pub fn new(
        statements: Arc<dyn StatementClient>,
        metrics: Arc<dyn MetricsClient>,
        config: &ApplicationConfig,
    ) -> Result<Self> {
        config.validate().map_err(AdminError::Configuration)?;

        let context = base_context(config);
        let orchestrator = Arc::new(ExecutionOrchestrator::new(
            statements,
            config.polling.policy(),
        ));
        let aggregator = MetricsAggregator::new(metrics, config.resolved_insight())?;
        let history = QueryHistory::new(Arc::clone(&orchestrator), context.clone());
        let catalog = Catalog::new(Arc::clone(&orchestrator), context.clone());

        Ok(Self {
            orchestrator,
            aggregator,
            history,
            catalog,
            context,
        })
    }

    /// Service over HTTP clients built from `config`
    pub fn from_config(config: &ApplicationConfig) -> Result<Self> {
        let statement_transport = config
            .statement_service
            .transport(config.warehouse.statement_endpoint());
        let metrics_transport = config
            .metrics_service
            .transport(config.warehouse.metrics_endpoint());

        let statements = HttpStatementClient::new(statement_transport)
            .map_err(|e| AdminError::Configuration(format!("statement service: {}", e)))?;
        let metrics = HttpMetricsClient::new(metrics_transport)
            .map_err(|e| AdminError::Configuration(format!("metrics service: {}", e)))?;

        info!(
            database = %config.warehouse.database,
            region = %config.warehouse.region,
            "Administration service configured"
        );
        Self::new(Arc::new(statements), Arc::new(metrics), config)
    }

    /// Default execution context
    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// Default limit for ranking operations
    pub fn default_limit(&self) -> usize {
        self.aggregator.config().default_limit
    }

    /// Run arbitrary SQL, optionally against another database
    pub async fn execute_query(&self, sql: &str, database: Option<&str>) -> Result<ResultSet> {
        self.execute_query_with_cancel(sql, database, &CancellationToken::new())
            .await
    }

    /// Run arbitrary SQL, stopping when `cancel` fires
    pub async fn execute_query_with_cancel(
        &self,
        sql: &str,
        database: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<ResultSet> {
        let ctx = match database.map(str::trim).filter(|d| !d.is_empty()) {
            Some(db) => self.context.for_database(db),
            None => self.context.clone(),
        };
        self.orchestrator.execute_with_cancel(sql, &ctx, cancel).await
    }

    /// Statement history, newest first
    pub async fn get_query_history(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<ResultSet> {
        self.history.history(start, end, limit).await
    }

    /// Statements slower than `threshold_ms`
    pub async fn get_long_running_queries(
        &self,
        threshold_ms: u64,
        limit: usize,
    ) -> Result<ResultSet> {
        self.history.long_running(threshold_ms, limit).await
    }

    /// Seven-day workload statistics
    pub async fn get_query_statistics(&self) -> Result<QueryStatistics> {
        self.history.statistics().await
    }

    /// Total cost over the cost window
    pub async fn get_total_cost(&self) -> Result<CostSummary> {
        self.aggregator.total_cost().await
    }

    /// Highest runtime datapoints
    pub async fn get_top_queries(&self, limit: usize) -> Result<Vec<RankedQuery>> {
        self.aggregator.top_queries(limit).await
    }

    /// Slowest periods by runtime; same ranking as [`get_top_queries`](Self::get_top_queries)
    pub async fn get_slow_queries(&self, limit: usize) -> Result<Vec<RankedQuery>> {
        self.aggregator.top_queries(limit).await
    }

    /// Cost-reduction suggestions
    pub async fn get_optimization_suggestions(&self) -> Result<Vec<String>> {
        self.aggregator.optimization_suggestions().await
    }

    /// Database names
    pub async fn list_databases(&self) -> Result<Vec<String>> {
        self.catalog.list_databases().await
    }

    /// Schema names in `database`
    pub async fn list_schemas(&self, database: &str) -> Result<Vec<String>> {
        self.catalog.list_schemas(database).await
    }

    /// Tables in `database`.`schema`
    pub async fn list_tables(&self, database: &str, schema: &str) -> Result<Vec<TableInfo>> {
        self.catalog.list_tables(database, schema).await
    }
}

fn base_context(config: &ApplicationConfig) -> ExecutionContext {
    let warehouse = &config.warehouse;
    let mut ctx = ExecutionContext::new(warehouse.database.clone());
    if let Some(workgroup) = &warehouse.workgroup_name {
        ctx = ctx.with_workgroup(workgroup.clone());
    }
    if let Some(cluster) = &warehouse.cluster_identifier {
        ctx = ctx.with_cluster(cluster.clone());
    }
    if let Some(user) = &warehouse.db_user {
        ctx = ctx.with_db_user(user.clone());
    }
    ctx
}
