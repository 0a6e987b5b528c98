//! Clockwork request monitor.
//!
//! In-process request debugging: every HTTP request gets an id, and logs,
//! queries and timeline events emitted while it runs are attached to it, even
//! across `.await` points shared with other requests. Finished requests land
//! in a bounded store and feed a rolling metrics window.

pub mod config;
pub mod context;
pub mod core;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod plugins;

pub use config::ClockworkConfig;
pub use core::MonitorCore;
pub use http::{Clockwork, HttpServer};
pub use lifecycle::Shutdown;
