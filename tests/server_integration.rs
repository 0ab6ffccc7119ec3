//! HTTP Server Integration Tests
//!
//! Drives the axum router with in-memory statement and metrics clients and
//! checks routing, envelopes, parameter handling and error mapping.
//!
//! # Test Coverage
//!
//! 1. **Health & Metrics** - GET /health, GET /metrics
//! 2. **Statements** - POST /api/query/execute and the history endpoints
//! 3. **Cost** - total, rankings, suggestions
//! 4. **Catalog** - databases, schemas, tables
//! 5. **Error Handling** - invalid input, engine failures, timeouts

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use warehouse_admin::{
    api::{build_router, AppState},
    config::ApplicationConfig,
    statement::{ResultPage, WireColumn, WireField},
    telemetry::Datapoint,
    testing::{ScriptedStatementClient, StaticMetricsClient},
    types::StatusReport,
    AdminService, ExecutionStatus,
};

// =============================================================================
// Test Server Setup
// =============================================================================

fn test_config() -> ApplicationConfig {
    let mut config = ApplicationConfig::default();
    config.warehouse.database = "dev".to_string();
    config.warehouse.workgroup_name = Some("analytics".to_string());
    config.warehouse.cluster_identifier = Some("analytics-cluster".to_string());
    config
}

fn create_test_server_with(
    statements: ScriptedStatementClient,
    metrics: StaticMetricsClient,
    config: ApplicationConfig,
) -> Router {
    let service = AdminService::new(Arc::new(statements), Arc::new(metrics), &config).unwrap();
    let state = Arc::new(AppState {
        service,
        prometheus_enabled: config.monitoring.prometheus_enabled,
        cors_allowed_origins: config.server.cors_allowed_origins.clone(),
    });
    build_router(state)
}

fn create_test_server(statements: ScriptedStatementClient) -> Router {
    create_test_server_with(statements, StaticMetricsClient::new(), test_config())
}

fn single_column_page(name: &str, values: &[&str]) -> ResultPage {
    ResultPage::with_columns(
        vec![WireColumn::new(name, "varchar")],
        values.iter().map(|v| vec![WireField::string(*v)]).collect(),
    )
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();

    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn get_request(router: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(router, request).await
}

async fn post_request(router: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(router, request).await
}

// =============================================================================
// Health & Metrics
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let router = create_test_server(ScriptedStatementClient::new());

    let (status, body) = get_request(&router, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let router = create_test_server(ScriptedStatementClient::new());
    post_request(&router, "/api/query/execute", json!({"sql": "SELECT 1"})).await;

    let response = router
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/plain"));

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("warehouse_admin_statements_total"));
}

#[tokio::test]
async fn test_metrics_endpoint_disabled() {
    let mut config = test_config();
    config.monitoring.prometheus_enabled = false;
    let router =
        create_test_server_with(ScriptedStatementClient::new(), StaticMetricsClient::new(), config);

    let (status, _) = get_request(&router, "/metrics").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Statement Endpoints
// =============================================================================

#[tokio::test]
async fn test_execute_select_one() {
    let statements = ScriptedStatementClient::new().with_page(
        None,
        ResultPage::with_columns(
            vec![WireColumn::new("?column?", "int4")],
            vec![vec![WireField::long(1)]],
        ),
    );
    let router = create_test_server(statements);

    let (status, body) =
        post_request(&router, "/api/query/execute", json!({"sql": "SELECT 1"})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["message"], "Query executed successfully.");
    assert_eq!(body["data"]["rows"], json!([{"?column?": 1}]));
    assert_eq!(body["data"]["row_count"], 1);
    assert_eq!(body["data"]["columns"][0]["name"], "?column?");
}

#[tokio::test]
async fn test_execute_keeps_column_order_and_decimals() {
    let statements = ScriptedStatementClient::new().with_page(
        None,
        ResultPage::with_columns(
            vec![
                WireColumn::new("zeta", "varchar"),
                WireColumn::new("amount", "numeric"),
                WireColumn::new("alpha", "bool"),
            ],
            vec![vec![
                WireField::string("z"),
                WireField::string("12345678901234567890.12"),
                WireField::boolean(true),
            ]],
        ),
    );
    let router = create_test_server(statements);

    let (status, body) = post_request(
        &router,
        "/api/query/execute",
        json!({"sql": "SELECT zeta, amount, alpha FROM t"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let row = body["data"]["rows"][0].as_object().unwrap();
    let keys: Vec<&str> = row.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["zeta", "amount", "alpha"]);
    assert_eq!(row["amount"], "12345678901234567890.12");
    assert_eq!(row["alpha"], true);
}

#[tokio::test]
async fn test_execute_failed_statement() {
    let statements = ScriptedStatementClient::new()
        .with_statuses(vec![StatusReport::failed("relation \"nope\" does not exist")]);
    let router = create_test_server(statements);

    let (status, body) = post_request(
        &router,
        "/api/query/execute",
        json!({"sql": "SELECT * FROM nope"}),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
    assert_eq!(body["kind"], "QUERY_EXECUTION_ERROR");
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("does not exist"));
}

#[tokio::test]
async fn test_execute_submits_blank_sql_unchanged() {
    let statements = Arc::new(
        ScriptedStatementClient::new()
            .with_statuses(vec![StatusReport::failed("syntax error at end of input")]),
    );
    let config = test_config();
    let service = AdminService::new(
        statements.clone(),
        Arc::new(StaticMetricsClient::new()),
        &config,
    )
    .unwrap();
    let router = build_router(Arc::new(AppState {
        service,
        prometheus_enabled: true,
        cors_allowed_origins: vec![],
    }));

    let (status, body) = post_request(&router, "/api/query/execute", json!({"sql": "   "})).await;

    assert_eq!(statements.submitted().len(), 1);
    assert_eq!(statements.submitted()[0].sql, "   ");
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "QUERY_EXECUTION_ERROR");
    assert!(body["message"].as_str().unwrap().contains("end of input"));
}

#[tokio::test]
async fn test_execute_rejects_malformed_body() {
    let router = create_test_server(ScriptedStatementClient::new());

    let (status, body) =
        post_request(&router, "/api/query/execute", json!({"query": "SELECT 1"})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
    assert_eq!(body["kind"], "INVALID_REQUEST");
}

#[tokio::test(start_paused = true)]
async fn test_execute_timeout() {
    let mut config = test_config();
    config.polling.max_wait_secs = 1;
    let statements = ScriptedStatementClient::new()
        .with_statuses(vec![StatusReport::new(ExecutionStatus::Running)]);
    let router = create_test_server_with(statements, StaticMetricsClient::new(), config);

    let (status, body) = post_request(
        &router,
        "/api/query/execute",
        json!({"sql": "SELECT pg_sleep(60)"}),
    )
    .await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["kind"], "TIMEOUT_ERROR");
}

#[tokio::test]
async fn test_query_history_defaults() {
    let router = create_test_server(ScriptedStatementClient::new().with_page(
        None,
        ResultPage::with_columns(
            vec![
                WireColumn::new("query_id", "int4"),
                WireColumn::new("execution_time_ms", "int8"),
            ],
            vec![vec![WireField::long(42), WireField::long(1500)]],
        ),
    ));

    let (status, body) = get_request(&router, "/api/query/history").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Query history retrieved successfully.");
    assert_eq!(body["data"]["rows"][0]["query_id"], 42);
}

#[tokio::test]
async fn test_query_history_with_window() {
    let statements = Arc::new(ScriptedStatementClient::new());
    let service = AdminService::new(
        statements.clone(),
        Arc::new(StaticMetricsClient::new()),
        &test_config(),
    )
    .unwrap();
    let router = build_router(Arc::new(AppState {
        service,
        prometheus_enabled: true,
        cors_allowed_origins: Vec::new(),
    }));

    let (status, _) = get_request(
        &router,
        "/api/query/history?start=2024-06-01T00:00:00Z&end=2024-06-02T00:00:00Z&limit=50",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let request = &statements.submitted()[0];
    assert!(request.sql.ends_with("LIMIT 50"));
    assert_eq!(request.parameters[0].value, "2024-06-01 00:00:00");
    assert_eq!(request.parameters[1].value, "2024-06-02 00:00:00");
}

#[tokio::test]
async fn test_query_history_rejects_bad_parameters() {
    let router = create_test_server(ScriptedStatementClient::new());

    let (status, body) = get_request(&router, "/api/query/history?limit=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "INVALID_REQUEST");

    let (status, body) = get_request(&router, "/api/query/history?start=yesterday").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "INVALID_REQUEST");

    let (status, _) = get_request(
        &router,
        "/api/query/history?start=2024-06-02T00:00:00Z&end=2024-06-01T00:00:00Z",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_long_running_queries() {
    let router = create_test_server(ScriptedStatementClient::new());

    let (status, body) =
        get_request(&router, "/api/query/long-running?threshold_ms=30000&limit=5").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["row_count"], 0);
}

#[tokio::test]
async fn test_query_statistics() {
    let statements = ScriptedStatementClient::new().with_page(
        None,
        ResultPage::with_columns(
            vec![
                WireColumn::new("total_queries", "int8"),
                WireColumn::new("avg_execution_time_ms", "numeric"),
                WireColumn::new("failed_queries", "int8"),
            ],
            vec![vec![
                WireField::long(10),
                WireField::string("250.5"),
                WireField::long(1),
            ]],
        ),
    );
    let router = create_test_server(statements);

    let (status, body) = get_request(&router, "/api/query/statistics").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"],
        json!({"total_queries": 10, "avg_execution_time_ms": 250.5, "failed_queries": 1})
    );
}

// =============================================================================
// Cost Endpoints
// =============================================================================

#[tokio::test]
async fn test_cost_endpoints() {
    let metrics = StaticMetricsClient::new()
        .with_datapoints(
            "EstimatedCharges",
            vec![Datapoint::new("AmazonRedshift", Utc::now(), 750.0)],
        )
        .with_datapoints(
            "QueryRuntime",
            vec![
                Datapoint::new("analytics-cluster", Utc::now(), 3.5),
                Datapoint::new("analytics-cluster", Utc::now(), 9.0),
            ],
        );
    let router = create_test_server_with(ScriptedStatementClient::new(), metrics, test_config());

    let (status, body) = get_request(&router, "/api/cost/total").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 750.0);

    let (status, body) = get_request(&router, "/api/cost/optimization").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"],
        json!(["Check unused nodes and downscale if necessary."])
    );

    let (status, body) = get_request(&router, "/api/cost/top-queries?limit=1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["runtime"], 9.0);
    assert!(body["data"][0]["timestamp"].is_string());
    assert!(body["data"][0].get("value").is_none());

    let (status, body) = get_request(&router, "/api/query/slow").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_cost_metrics_unavailable() {
    let router = create_test_server_with(
        ScriptedStatementClient::new(),
        StaticMetricsClient::new().failing("service unavailable"),
        test_config(),
    );

    let (status, body) = get_request(&router, "/api/cost/total").await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["kind"], "METRICS_FETCH_ERROR");
}

// =============================================================================
// Catalog Endpoints
// =============================================================================

#[tokio::test]
async fn test_list_databases() {
    let router = create_test_server(
        ScriptedStatementClient::new().with_page(None, single_column_page("datname", &["dev", "sales"])),
    );

    let (status, body) = get_request(&router, "/api/databases").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!(["dev", "sales"]));
}

#[tokio::test]
async fn test_list_schemas_and_tables() {
    let router = create_test_server(
        ScriptedStatementClient::new()
            .with_page(None, single_column_page("schema_name", &["public"])),
    );
    let (status, body) = get_request(&router, "/api/schemas/sales").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Schemas retrieved for sales.");
    assert_eq!(body["data"], json!(["public"]));

    let router = create_test_server(
        ScriptedStatementClient::new()
            .with_page(None, single_column_page("table_name", &["orders"])),
    );
    let (status, body) = get_request(&router, "/api/tables/sales/public").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Tables retrieved for public.");
    assert_eq!(body["data"], json!([{"name": "orders"}]));
}

#[tokio::test]
async fn test_unknown_route() {
    let router = create_test_server(ScriptedStatementClient::new());
    let (status, _) = get_request(&router, "/api/v1/query").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
