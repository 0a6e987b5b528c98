//! Configuration validation.
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Pure function: ClockworkConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ClockworkConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("core.max_requests must be at least 1")]
    ZeroCapacity,

    #[error("core.sweep_interval_secs must be at least 1 when the sweeper is enabled")]
    ZeroSweepInterval,

    #[error("http.path must start with '/': {0}")]
    RelativePath(String),

    #[error("http.snapshot_limit must be at least 1")]
    ZeroSnapshotLimit,

    #[error("invalid {field} address '{value}'")]
    InvalidAddress { field: &'static str, value: String },
}

/// Check a deserialized configuration for semantic errors.
pub fn validate_config(config: &ClockworkConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.core.max_requests == 0 {
        errors.push(ValidationError::ZeroCapacity);
    }
    if config.core.in_flight_ttl_secs > 0 && config.core.sweep_interval_secs == 0 {
        errors.push(ValidationError::ZeroSweepInterval);
    }
    if !config.http.path.starts_with('/') {
        errors.push(ValidationError::RelativePath(config.http.path.clone()));
    }
    if config.http.snapshot_limit == 0 {
        errors.push(ValidationError::ZeroSnapshotLimit);
    }
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

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
