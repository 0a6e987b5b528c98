//! Structured logging.
//!
//! # Design Decisions
//! - `RUST_LOG` wins over the configured level when set
//! - The capture layer shares the registry with the fmt layer, so every event
//!   the host logs inside a request also lands in that request's snapshot

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;
use crate::core::MonitorCore;
use crate::plugins::CaptureLayer;

/// Filter from `RUST_LOG`, else `<crate>=<level>,tower_http=<level>`.
pub fn env_filter(config: &ObservabilityConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = config.log_level.as_str();
        format!("{}={level},tower_http={level},{level}", env!("CARGO_CRATE_NAME")).into()
    })
}

/// Install the global subscriber with request capture enabled.
///
/// Returns false if a global subscriber was already set.
pub fn init_logging(config: &ObservabilityConfig, core: Arc<MonitorCore>) -> bool {
    tracing_subscriber::registry()
        .with(env_filter(config))
        .with(tracing_subscriber::fmt::layer())
        .with(CaptureLayer::new(core))
        .try_init()
        .is_ok()
}
