//! HTTP handlers
//!
//! Every handler delegates to [`AdminService`](crate::service::AdminService)
//! and wraps the result in a [`SuccessEnvelope`]. Failures render through
//! the [`IntoResponse`] impl for [`AdminError`]. Extractor rejections are
//! mapped to [`AdminError::InvalidRequest`] so malformed input gets the
//! same envelope as every other error.
//!
//! When a client disconnects, the server drops the handler future, which
//! stops polling at the next await point.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, error};

use super::types::*;
use super::SharedState;
use crate::catalog::TableInfo;
use crate::error::AdminError;
use crate::history::{QueryStatistics, DEFAULT_HISTORY_LIMIT, DEFAULT_LONG_RUNNING_THRESHOLD_MS};
use crate::insight::{CostSummary, RankedQuery};
use crate::metrics::gather_metrics;
use crate::result::ResultSet;

/// Handler result carrying an enveloped payload
pub type ApiResult<T> = Result<Json<SuccessEnvelope<T>>, AdminError>;

fn ok<T: Serialize>(message: impl Into<String>, data: T) -> ApiResult<T> {
    Ok(Json(SuccessEnvelope::new(message, data)))
}

// =============================================================================
// Health & Metrics
// =============================================================================

/// Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Prometheus exposition of the process registry
pub async fn metrics(State(state): State<SharedState>) -> Response {
    if !state.prometheus_enabled {
        return StatusCode::NOT_FOUND.into_response();
    }
    match gather_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e).into_response()
        },
    }
}

// =============================================================================
// Query Handlers
// =============================================================================

/// `POST /api/query/execute`
pub async fn execute_query(
    State(state): State<SharedState>,
    payload: Result<Json<ExecuteQueryRequest>, JsonRejection>,
) -> ApiResult<ResultSet> {
    let Json(request) = payload.map_err(|e| AdminError::invalid(e.body_text()))?;
    debug!(database = ?request.database, "Executing ad-hoc statement");

    let result = state
        .service
        .execute_query(&request.sql, request.database.as_deref())
        .await?;
    ok("Query executed successfully.", result)
}

/// `GET /api/query/history`
pub async fn query_history(
    State(state): State<SharedState>,
    params: Result<Query<HistoryParams>, QueryRejection>,
) -> ApiResult<ResultSet> {
    let Query(params) = params.map_err(|e| AdminError::invalid(e.body_text()))?;
    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let result = state
        .service
        .get_query_history(params.start, params.end, limit)
        .await?;
    ok("Query history retrieved successfully.", result)
}

/// `GET /api/query/long-running`
pub async fn long_running_queries(
    State(state): State<SharedState>,
    params: Result<Query<LongRunningParams>, QueryRejection>,
) -> ApiResult<ResultSet> {
    let Query(params) = params.map_err(|e| AdminError::invalid(e.body_text()))?;
    let threshold = params
        .threshold_ms
        .unwrap_or(DEFAULT_LONG_RUNNING_THRESHOLD_MS);
    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let result = state
        .service
        .get_long_running_queries(threshold, limit)
        .await?;
    ok("Long-running queries retrieved successfully.", result)
}

/// `GET /api/query/slow`
pub async fn slow_queries(
    State(state): State<SharedState>,
    params: Result<Query<LimitParams>, QueryRejection>,
) -> ApiResult<Vec<RankedQuery>> {
    let Query(params) = params.map_err(|e| AdminError::invalid(e.body_text()))?;
    let limit = params.limit.unwrap_or_else(|| state.service.default_limit());
    let slow = state.service.get_slow_queries(limit).await?;
    ok("Slow queries retrieved successfully.", slow)
}

/// `GET /api/query/statistics`
pub async fn query_statistics(State(state): State<SharedState>) -> ApiResult<QueryStatistics> {
    let stats = state.service.get_query_statistics().await?;
    ok("Query statistics retrieved successfully.", stats)
}

// =============================================================================
// Cost Handlers
// =============================================================================

/// `GET /api/cost/total`
pub async fn total_cost(State(state): State<SharedState>) -> ApiResult<CostSummary> {
    let cost = state.service.get_total_cost().await?;
    ok("Total cost retrieved successfully.", cost)
}

/// `GET /api/cost/top-queries`
pub async fn top_queries(
    State(state): State<SharedState>,
    params: Result<Query<LimitParams>, QueryRejection>,
) -> ApiResult<Vec<RankedQuery>> {
    let Query(params) = params.map_err(|e| AdminError::invalid(e.body_text()))?;
    let limit = params.limit.unwrap_or_else(|| state.service.default_limit());
    let top = state.service.get_top_queries(limit).await?;
    ok("Top queries retrieved successfully.", top)
}

/// `GET /api/cost/optimization`
pub async fn optimization_suggestions(State(state): State<SharedState>) -> ApiResult<Vec<String>> {
    let suggestions = state.service.get_optimization_suggestions().await?;
    ok("Optimization suggestions retrieved successfully.", suggestions)
}

// =============================================================================
// Catalog Handlers
// =============================================================================

/// `GET /api/databases`
pub async fn list_databases(State(state): State<SharedState>) -> ApiResult<Vec<String>> {
    let databases = state.service.list_databases().await?;
    ok("Databases retrieved successfully.", databases)
}

/// `GET /api/schemas/:database`
pub async fn list_schemas(
    State(state): State<SharedState>,
    database: Result<Path<String>, PathRejection>,
) -> ApiResult<Vec<String>> {
    let Path(database) = database.map_err(|e| AdminError::invalid(e.body_text()))?;
    let schemas = state.service.list_schemas(&database).await?;
    ok(format!("Schemas retrieved for {}.", database), schemas)
}

/// `GET /api/tables/:database/:schema`
pub async fn list_tables(
    State(state): State<SharedState>,
    path: Result<Path<(String, String)>, PathRejection>,
) -> ApiResult<Vec<TableInfo>> {
    let Path((database, schema)) = path.map_err(|e| AdminError::invalid(e.body_text()))?;
    let tables = state.service.list_tables(&database, &schema).await?;
    ok(format!("Tables retrieved for {}.", schema), tables)
}
