//! Lifecycle management.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Build core → Install plugins → Start sweeper → Serve
//!
//! Shutdown (shutdown.rs):
//!     Ctrl+C → Shutdown::trigger → server drains, sweeper exits
//! ```

pub mod shutdown;
pub mod sweeper;

pub use shutdown::{Shutdown, ShutdownSignal};
pub use sweeper::spawn_sweeper;
