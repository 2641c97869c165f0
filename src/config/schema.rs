//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::dependency::ResilienceConfiguration;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TenacityConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Admin API settings.
    pub admin: AdminConfig,

    /// HTTP boundary behavior.
    pub http: HttpConfig,

    /// Remote property refresh.
    pub properties: PropertiesConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Application-registered dependency configuration, keyed by name.
    pub dependencies: BTreeMap<String, ResilienceConfiguration>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    pub enabled: bool,

    /// Prefix every admin route is nested under.
    pub path_prefix: String,

    /// When set, admin routes require `Authorization: Bearer <api_key>`.
    pub api_key: Option<String>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path_prefix: "/tenacity".to_string(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Status returned when a throttling failure reaches the boundary.
    pub throttle_status_code: u16,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            throttle_status_code: 429,
            request_timeout_secs: 30,
        }
    }
}

/// Remote property sources.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PropertiesConfig {
    /// HTTP endpoint serving a JSON object of property overrides.
    pub poll_url: Option<String>,

    pub poll_interval_secs: u64,

    pub poll_timeout_secs: u64,

    /// TOML file of property overrides, watched for changes.
    pub overrides_file: Option<String>,
}

impl Default for PropertiesConfig {
    fn default() -> Self {
        Self {
            poll_url: None,
            poll_interval_secs: 30,
            poll_timeout_secs: 10,
            overrides_file: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Metrics endpoint address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dependency::IsolationStrategy;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: TenacityConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.admin.path_prefix, "/tenacity");
        assert_eq!(config.http.throttle_status_code, 429);
        assert_eq!(config.properties.poll_interval_secs, 30);
        assert_eq!(config.observability.log_format, LogFormat::Pretty);
        assert!(config.dependencies.is_empty());
    }

    #[test]
    fn test_dependency_sections_parse() {
        let config: TenacityConfig = toml::from_str(
            r#"
            [observability]
            log_format = "json"

            [dependencies.payments]
            executionTimeoutMs = 250
            isolationStrategy = "SEMAPHORE"

            [dependencies.payments.threadPool]
            coreSize = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.observability.log_format, LogFormat::Json);
        let payments = &config.dependencies["payments"];
        assert_eq!(payments.execution_timeout_ms(), 250);
        assert_eq!(payments.isolation_strategy(), IsolationStrategy::Semaphore);
        assert_eq!(payments.thread_pool().core_size(), 4);
        assert_eq!(payments.thread_pool().max_queue_size(), -1);
    }
}
