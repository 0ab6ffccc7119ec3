//! Warehouse Admin HTTP Server
//!
//! This binary serves the administration API over the statement-execution
//! and metrics services configured for one warehouse.
//!
//! # Endpoints
//!
//! ## Statements
//! - `POST /api/query/execute` - Run SQL
//! - `GET /api/query/history` - Recent statements
//! - `GET /api/query/long-running` - Statements above a runtime threshold
//! - `GET /api/query/slow` - Slowest periods by runtime metric
//! - `GET /api/query/statistics` - Seven-day workload figures
//!
//! ## Cost
//! - `GET /api/cost/total` - Cost over the cost window
//! - `GET /api/cost/top-queries` - Highest runtime datapoints
//! - `GET /api/cost/optimization` - Cost-reduction suggestions
//!
//! ## Catalog
//! - `GET /api/databases`
//! - `GET /api/schemas/:database`
//! - `GET /api/tables/:database/:schema`
//!
//! ## Admin
//! - `GET /health` - Health check
//! - `GET /metrics` - Prometheus metrics
//!
//! # CLI Commands
//!
//! - `start` - Start the HTTP server (default if no command specified)
//! - `check-config` - Validate configuration file
//!
//! # Configuration
//!
//! The server reads configuration from:
//! 1. `WAREHOUSE_CONFIG` environment variable (path to TOML file)
//! 2. `./application.toml` in current directory
//! 3. Default configuration with `WAREHOUSE_*` environment overrides

mod config;

use clap::{Parser, Subcommand};
use config::{load_config_with_app, ServerConfig};
use std::{net::SocketAddr, sync::Arc};
use tokio::signal;
use tracing::{debug, info, warn};
use warehouse_admin::{
    api::{build_router, AppState},
    config::ApplicationConfig,
    transport::sanitize_url,
    AdminService,
};

/// Graceful shutdown signal handler
///
/// Signal registration failures are logged and the handler waits
/// indefinitely, so the server must then be killed forcefully.
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {},
            Err(e) => {
                warn!(
                    error = %e,
                    "Ctrl+C handler installation failed - graceful shutdown unavailable"
                );
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            },
            Err(e) => {
                warn!(
                    error = %e,
                    "SIGTERM handler installation failed - SIGTERM shutdown unavailable"
                );
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown");
}

// =============================================================================
// CLI Definition
// =============================================================================

#[derive(Parser)]
#[command(name = "warehouse-admin")]
#[command(version)]
#[command(about = "Administration API for a cloud data warehouse", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to configuration file (overrides WAREHOUSE_CONFIG env var)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Override listen address (e.g., 0.0.0.0:8080)
    #[arg(short, long, global = true)]
    listen: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (default)
    Start,

    /// Validate configuration file without starting the server
    CheckConfig,
}

// =============================================================================
// CLI Command Handlers
// =============================================================================

/// Load configuration with the global CLI overrides applied
fn load_config_for_cli(cli: &Cli) -> (ServerConfig, ApplicationConfig) {
    if let Some(config_path) = &cli.config {
        std::env::set_var("WAREHOUSE_CONFIG", config_path);
    }

    let (config, app_config) = load_config_with_app();
    (config.with_listen_override(cli.listen.as_deref()), app_config)
}

/// Validate configuration and print summary
async fn cmd_check_config(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let (config, app_config) = load_config_for_cli(cli);
    app_config.validate()?;

    let warehouse = &app_config.warehouse;
    println!("Configuration is valid!");
    println!();
    println!("Server Settings:");
    println!("  Listen address: {}", config.listen_addr);
    println!("  Log level: {}", app_config.server.log_level);
    println!();
    println!("Warehouse:");
    println!("  Database: {}", warehouse.database);
    if let Some(workgroup) = &warehouse.workgroup_name {
        println!("  Workgroup: {}", workgroup);
    }
    if let Some(cluster) = &warehouse.cluster_identifier {
        println!("  Cluster: {}", cluster);
    }
    println!("  Region: {}", warehouse.region);
    println!();
    println!("Services:");
    let statement_endpoint = app_config
        .statement_service
        .endpoint
        .clone()
        .unwrap_or_else(|| warehouse.statement_endpoint());
    let metrics_endpoint = app_config
        .metrics_service
        .endpoint
        .clone()
        .unwrap_or_else(|| warehouse.metrics_endpoint());
    println!("  Statements: {}", sanitize_url(&statement_endpoint));
    println!("  Metrics: {}", sanitize_url(&metrics_endpoint));
    println!("  Max poll wait: {}s", app_config.polling.max_wait_secs);
    println!();
    println!("Monitoring:");
    println!("  Prometheus enabled: {}", config.enable_metrics);

    Ok(())
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::CheckConfig) => return cmd_check_config(&cli).await,
        Some(Commands::Start) | None => {},
    }

    let (config, app_config) = load_config_for_cli(&cli);

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&app_config.server.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    info!("Starting Warehouse Admin Server v{}", env!("CARGO_PKG_VERSION"));
    debug!(
        "Configuration: listen_addr={}, database={}",
        config.listen_addr, app_config.warehouse.database
    );

    let service = AdminService::from_config(&app_config)?;
    let state = Arc::new(AppState {
        service,
        prometheus_enabled: config.enable_metrics,
        cors_allowed_origins: config.cors_allowed_origins.clone(),
    });

    let app = build_router(state);

    let addr: SocketAddr = config.listen_addr.parse()?;
    info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listen_flag_applies_to_check_config() {
        let cli = Cli::try_parse_from([
            "warehouse-admin",
            "check-config",
            "--listen",
            "0.0.0.0:7070",
        ])
        .unwrap();
        assert!(matches!(cli.command, Some(Commands::CheckConfig)));

        let (config, _) = load_config_for_cli(&cli);
        assert_eq!(config.listen_addr, "0.0.0.0:7070");
    }
}
