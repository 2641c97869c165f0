//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic and range checks)
//! - Validate addresses, URLs and status codes
//! - Check dependency names are valid keys
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: TenacityConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::TenacityConfig;
use crate::dependency::DependencyKey;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: '{value}' is not a valid socket address")]
    InvalidAddress { field: &'static str, value: String },

    #[error("properties.poll_url: {0}")]
    InvalidPollUrl(String),

    #[error("properties.poll_interval_secs must be greater than zero")]
    ZeroPollInterval,

    #[error("http.throttle_status_code: {0} is not a 4xx or 5xx status")]
    InvalidThrottleStatus(u16),

    #[error("dependencies.{name}: {reason}")]
    InvalidDependencyName { name: String, reason: String },

    #[error("admin.path_prefix: '{0}' must start with '/'")]
    InvalidPathPrefix(String),
}

/// Check everything serde cannot.
pub fn validate_config(config: &TenacityConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if let Some(raw) = &config.properties.poll_url {
        match Url::parse(raw) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => errors.push(ValidationError::InvalidPollUrl(format!(
                "unsupported scheme '{}'",
                url.scheme()
            ))),
            Err(e) => errors.push(ValidationError::InvalidPollUrl(e.to_string())),
        }
    }

    if config.properties.poll_interval_secs == 0 {
        errors.push(ValidationError::ZeroPollInterval);
    }

    if !(400..600).contains(&config.http.throttle_status_code) {
        errors.push(ValidationError::InvalidThrottleStatus(config.http.throttle_status_code));
    }

    if !config.admin.path_prefix.starts_with('/') {
        errors.push(ValidationError::InvalidPathPrefix(config.admin.path_prefix.clone()));
    }

    for name in config.dependencies.keys() {
        if let Err(e) = DependencyKey::new(name) {
            errors.push(ValidationError::InvalidDependencyName {
                name: name.clone(),
                reason: e.to_string(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert_eq!(validate_config(&TenacityConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = TenacityConfig::default();
        config.listener.bind_address = "nowhere".into();
        config.properties.poll_url = Some("ftp://example.com/props".into());
        config.properties.poll_interval_secs = 0;
        config.http.throttle_status_code = 200;
        config.admin.path_prefix = "tenacity".into();
        config
            .dependencies
            .insert("bad key".into(), Default::default());

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 6);
        assert!(errors.contains(&ValidationError::ZeroPollInterval));
        assert!(errors.contains(&ValidationError::InvalidThrottleStatus(200)));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidDependencyName { name, .. } if name == "bad key")));
    }

    #[test]
    fn test_metrics_address_only_checked_when_enabled() {
        let mut config = TenacityConfig::default();
        config.observability.metrics_address = "bogus".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert_eq!(validate_config(&config).unwrap_err().len(), 1);
    }
}
