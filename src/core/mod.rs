//! Request capture engine.
//!
//! # Data Flow
//! ```text
//! transport adapter / plugins
//!     → monitor.rs (capture_request → in-flight table)
//!     → monitor.rs (capture_log / add_query / add_event while in flight)
//!     → monitor.rs (finalize_request → sanitize.rs → ring_buffer.rs)
//!
//! query API
//!     → monitor.rs (get_request: in-flight, then store)
//!     → monitor.rs (get_snapshot: store list + metrics.rs + sampler.rs)
//! ```
//!
//! # Design Decisions
//! - Memory is bounded by the store capacity, not by traffic rate
//! - Metrics are derived from stored snapshots on demand
//! - Capture operations degrade to no-ops instead of failing

pub mod id;
pub mod metrics;
pub mod monitor;
pub mod ring_buffer;
pub mod sampler;
pub mod sanitize;
pub mod types;

pub use metrics::{MetricsReport, MetricsSpan, SpanWindow};
pub use monitor::{EventTimer, MonitorCore};
pub use ring_buffer::{RequestRingBuffer, RequestStorage};
pub use sampler::{FixedSampler, OsGauges, ProcessGauges, ProcessSampler, SystemSampler};
pub use sanitize::SanitizeOptions;
pub use types::{
    EventData, Finalize, LogEntry, LogLevel, LogSource, QueryData, RequestInit, RequestMetadata,
    RequestSnapshot, Snapshot,
};
