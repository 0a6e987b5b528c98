//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files, and
//! every section has defaults so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};

use crate::core::sanitize::{SanitizeOptions, DEFAULT_REDACT_KEYS};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ClockworkConfig {
    /// Demo server listener.
    pub listener: ListenerConfig,

    /// Capture engine settings.
    pub core: CoreConfig,

    /// HTTP adapter settings.
    pub http: HttpConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:3000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:3000".to_string(),
        }
    }
}

/// Capture engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CoreConfig {
    /// Store capacity: how many finished requests are kept.
    pub max_requests: usize,

    /// In-flight requests older than this are swept (0 disables the sweeper).
    pub in_flight_ttl_secs: u64,

    /// How often the sweeper runs.
    pub sweep_interval_secs: u64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            max_requests: 100,
            in_flight_ttl_secs: 0,
            sweep_interval_secs: 30,
        }
    }
}

/// HTTP adapter configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    /// Base path of the data API (no trailing slash).
    pub path: String,

    /// Number of requests returned by the snapshot endpoint.
    pub snapshot_limit: usize,

    /// Header/body keys to redact (case-insensitive substring match).
    pub redact_keys: Vec<String>,

    /// Maximum characters captured per body string.
    pub max_body_size: usize,

    /// Maximum nesting captured per body.
    pub max_body_depth: usize,

    /// Maximum characters captured per header value.
    pub max_header_length: usize,

    pub capture_request_body: bool,

    pub capture_response_body: bool,

    /// Requests whose path starts with any of these are not captured.
    pub ignore_starts_with: Vec<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            path: "/__clockwork".to_string(),
            snapshot_limit: 50,
            redact_keys: DEFAULT_REDACT_KEYS.iter().map(|k| k.to_string()).collect(),
            max_body_size: 10_000,
            max_body_depth: 10,
            max_header_length: 500,
            capture_request_body: true,
            capture_response_body: true,
            ignore_starts_with: Vec::new(),
        }
    }
}

impl HttpConfig {
    /// Base path with trailing slashes removed, falling back to the default.
    pub fn base_path(&self) -> String {
        let trimmed = self.path.trim_end_matches('/');
        if trimmed.is_empty() {
            HttpConfig::default().path
        } else {
            trimmed.to_string()
        }
    }

    pub fn sanitize_options(&self) -> SanitizeOptions {
        SanitizeOptions {
            max_length: self.max_body_size,
            max_header_length: self.max_header_length,
            max_depth: self.max_body_depth,
            ..Default::default()
        }
        .with_redact_keys(&self.redact_keys)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
