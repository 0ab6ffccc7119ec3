//! HTTP surface of the administration façade
//!
//! # Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /metrics` - Prometheus metrics
//! - `POST /api/query/execute` - Run a statement
//! - `GET /api/query/history` - Recent statements
//! - `GET /api/query/long-running` - Statements above a runtime threshold
//! - `GET /api/query/slow` - Slowest periods by runtime metric
//! - `GET /api/query/statistics` - Seven-day workload figures
//! - `GET /api/cost/total` - Cost over the cost window
//! - `GET /api/cost/top-queries` - Highest runtime datapoints
//! - `GET /api/cost/optimization` - Cost-reduction suggestions
//! - `GET /api/databases` - Database names
//! - `GET /api/schemas/:database` - Schemas in a database
//! - `GET /api/tables/:database/:schema` - Tables in a schema

pub mod handlers;
pub mod types;

use axum::{
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, warn};

use crate::error::AdminError;
use crate::service::AdminService;
use types::ErrorEnvelope;

/// State shared by every handler
pub struct AppState {
    /// Operations backing the endpoints
    pub service: AdminService,
    /// Serve `/metrics`
    pub prometheus_enabled: bool,
    /// Allowed CORS origins; empty allows any
    pub cors_allowed_origins: Vec<String>,
}

/// Handle to [`AppState`] as held by the router
pub type SharedState = Arc<AppState>;

/// Build CORS layer from configuration
pub fn build_cors_layer(cors_origins: &[String]) -> CorsLayer {
    if cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|o| o.parse().ok()).collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any)
    }
}

/// Build the application router
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        // Health and metrics
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        // Statements
        .route("/api/query/execute", post(handlers::execute_query))
        .route("/api/query/history", get(handlers::query_history))
        .route(
            "/api/query/long-running",
            get(handlers::long_running_queries),
        )
        .route("/api/query/slow", get(handlers::slow_queries))
        .route("/api/query/statistics", get(handlers::query_statistics))
        // Cost
        .route("/api/cost/total", get(handlers::total_cost))
        .route("/api/cost/top-queries", get(handlers::top_queries))
        .route(
            "/api/cost/optimization",
            get(handlers::optimization_suggestions),
        )
        // Catalog
        .route("/api/databases", get(handlers::list_databases))
        .route("/api/schemas/:database", get(handlers::list_schemas))
        .route("/api/tables/:database/:schema", get(handlers::list_tables))
        // State, tracing and CORS
        .with_state(state.clone())
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(&state.cors_allowed_origins))
}

/// HTTP status for an error class
pub fn status_for(error: &AdminError) -> StatusCode {
    match error {
        AdminError::InvalidRequest(_) | AdminError::QueryExecution(_) => StatusCode::BAD_REQUEST,
        AdminError::Submission(_)
        | AdminError::StatementTransport(_)
        | AdminError::Materialization(_)
        | AdminError::MetricsFetch(_) => StatusCode::BAD_GATEWAY,
        AdminError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        AdminError::Cancelled(_) => StatusCode::REQUEST_TIMEOUT,
        AdminError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        let kind = self.kind().as_str();
        if status.is_server_error() {
            error!(kind, error = %self, "Request failed");
        } else {
            warn!(kind, error = %self, "Request rejected");
        }

        let body = ErrorEnvelope {
            status: "error",
            kind,
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&AdminError::invalid("x")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&AdminError::QueryExecution("syntax".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&AdminError::Timeout {
                statement_id: "s".into(),
                waited_ms: 10
            }),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status_for(&AdminError::MetricsFetch("down".into())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&AdminError::Cancelled("s".into())),
            StatusCode::REQUEST_TIMEOUT
        );
    }

    #[test]
    fn test_cors_layer_accepts_listed_origins() {
        // Invalid header values are skipped rather than rejected
        let _ = build_cors_layer(&["http://localhost:3000".to_string(), "\n".to_string()]);
        let _ = build_cors_layer(&[]);
    }
}
