//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check settings that only make sense together
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ConfigIssue>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::ServiceConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    /// Dotted path of the offending field, e.g. `listener.bind_address`.
    pub field: &'static str,
    pub message: String,
}

impl ConfigIssue {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a parsed configuration for values serde cannot reject on its own.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ConfigIssue>> {
    let mut issues = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        issues.push(ConfigIssue::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_connections == 0 {
        issues.push(ConfigIssue::new("listener.max_connections", "must be greater than 0"));
    }
    if let Some(tls) = &config.listener.tls {
        if tls.cert_path.trim().is_empty() {
            issues.push(ConfigIssue::new("listener.tls.cert_path", "must not be empty"));
        }
        if tls.key_path.trim().is_empty() {
            issues.push(ConfigIssue::new("listener.tls.key_path", "must not be empty"));
        }
    }

    if config.timeouts.request_secs == 0 {
        issues.push(ConfigIssue::new("timeouts.request_secs", "must be greater than 0"));
    }
    if config.timeouts.shutdown_grace_secs == 0 {
        issues.push(ConfigIssue::new("timeouts.shutdown_grace_secs", "must be greater than 0"));
    }

    if config.limits.max_body_bytes == 0 {
        issues.push(ConfigIssue::new("limits.max_body_bytes", "must be greater than 0"));
    }
    if config.limits.max_batch_size == 0 {
        issues.push(ConfigIssue::new("limits.max_batch_size", "must be greater than 0"));
    }

    let has_directory = config
        .schemas
        .directory
        .as_deref()
        .is_some_and(|d| !d.trim().is_empty());
    if config.schemas.directory.is_some() && !has_directory {
        issues.push(ConfigIssue::new("schemas.directory", "must not be empty"));
    }
    if config.schemas.watch && !has_directory {
        issues.push(ConfigIssue::new("schemas.watch", "requires schemas.directory"));
    }
    if config.schemas.persist && !has_directory {
        issues.push(ConfigIssue::new("schemas.persist", "requires schemas.directory"));
    }

    if config.validation.max_errors == 0 {
        issues.push(ConfigIssue::new("validation.max_errors", "must be greater than 0"));
    }

    if config.rate_limit.enabled {
        if config.rate_limit.requests_per_second == 0 {
            issues.push(ConfigIssue::new(
                "rate_limit.requests_per_second",
                "must be greater than 0 when rate limiting is enabled",
            ));
        }
        if config.rate_limit.burst_size == 0 {
            issues.push(ConfigIssue::new(
                "rate_limit.burst_size",
                "must be greater than 0 when rate limiting is enabled",
            ));
        }
    }

    if let Some(key) = &config.admin.api_key {
        if key.trim().is_empty() {
            issues.push(ConfigIssue::new("admin.api_key", "must not be empty when set"));
        }
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        issues.push(ConfigIssue::new(
            "observability.log_level",
            format!("unknown level '{}'", config.observability.log_level),
        ));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        issues.push(ConfigIssue::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}
