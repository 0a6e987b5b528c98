//! Ambient request context.
//!
//! # Data Flow
//! ```text
//! capture middleware
//!     → context::run(id, handler future)
//!         → handler awaits I/O, other requests interleave on the runtime
//!         → tracing events / DB helpers call context::current_id()
//!         → context::spawn(..) carries the id into child tasks
//! ```
//!
//! # Design Decisions
//! - Backed by a tokio task-local: the id lives in the future, not the thread,
//!   so it survives suspension and work-stealing across worker threads
//! - Scopes nest: an inner `run` shadows the outer id and restores it on exit
//! - Work that was not spawned through this module (tasks created before the
//!   request, global timers) sees no id; callers treat that as "no request"
//! - Missing context is never an error

mod scope;

pub use scope::{current, current_id, run, run_sync, spawn, spawn_blocking, Propagate, Scoped};
