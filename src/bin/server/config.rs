//! Server Configuration
//!
//! This module handles loading and managing server configuration.

use warehouse_admin::config::ApplicationConfig;

/// Server runtime configuration derived from ApplicationConfig
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP server address
    pub listen_addr: String,

    /// Enable Prometheus metrics endpoint
    pub enable_metrics: bool,

    /// CORS allowed origins (empty = allow all origins for development)
    pub cors_allowed_origins: Vec<String>,
}

impl From<&ApplicationConfig> for ServerConfig {
    fn from(app_config: &ApplicationConfig) -> Self {
        Self {
            listen_addr: app_config.server.listen_addr.clone(),
            enable_metrics: app_config.monitoring.prometheus_enabled,
            cors_allowed_origins: app_config.server.cors_allowed_origins.clone(),
        }
    }
}

impl ServerConfig {
    /// Replace the listen address when one was given on the command line
    pub fn with_listen_override(mut self, listen: Option<&str>) -> Self {
        if let Some(addr) = listen {
            self.listen_addr = addr.to_string();
        }
        self
    }
}

/// Load configuration from file or environment
///
/// Priority:
/// 1. WAREHOUSE_CONFIG environment variable
/// 2. application.toml
/// 3. Default configuration with environment overrides
pub fn load_config_with_app() -> (ServerConfig, ApplicationConfig) {
    if let Ok(path) = std::env::var("WAREHOUSE_CONFIG") {
        match ApplicationConfig::load(&path) {
            Ok(config) => {
                eprintln!("[config] Loaded configuration from: {}", path);
                return (ServerConfig::from(&config), config);
            },
            Err(e) => {
                eprintln!(
                    "[config] Failed to load config from {}: {}. Trying defaults.",
                    path, e
                );
            },
        }
    }

    let app_toml_path = std::path::Path::new("application.toml");
    if app_toml_path.exists() {
        match ApplicationConfig::load("application.toml") {
            Ok(config) => {
                eprintln!("[config] Loaded configuration from application.toml");
                return (ServerConfig::from(&config), config);
            },
            Err(e) => {
                eprintln!(
                    "[config] Failed to parse application.toml: {}. Using defaults.",
                    e
                );
            },
        }
    } else {
        eprintln!(
            "[config] application.toml not found at: {:?}",
            app_toml_path
                .canonicalize()
                .unwrap_or_else(|_| app_toml_path.to_path_buf())
        );
    }

    eprintln!("[config] Using default configuration");
    let app_config = match ApplicationConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("[config] Failed to apply environment overrides: {}", e);
            ApplicationConfig::default()
        },
    };
    (ServerConfig::from(&app_config), app_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listen_override() {
        let config = ServerConfig::from(&ApplicationConfig::default());
        let default_addr = config.listen_addr.clone();

        let unchanged = config.clone().with_listen_override(None);
        assert_eq!(unchanged.listen_addr, default_addr);

        let overridden = config.with_listen_override(Some("127.0.0.1:9090"));
        assert_eq!(overridden.listen_addr, "127.0.0.1:9090");
    }
}
