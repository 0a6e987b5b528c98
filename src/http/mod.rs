//! HTTP transport adapter.
//!
//! # Data Flow
//! ```text
//! inbound request
//!     → middleware.rs (data path? → handlers.rs)
//!     → middleware.rs (ignored prefix? → host app untouched)
//!     → middleware.rs (sanitize → capture_request → context::run(host app))
//!     → middleware.rs (tag headers → finalize_request)
//!     → Send to client
//! ```
//!
//! The host app is any axum `Router`; `Clockwork::attach` layers the
//! middleware on top. `server.rs` binds and serves it.

pub mod adapter;
pub mod handlers;
pub mod middleware;
pub mod server;

pub use adapter::{AdapterOptions, Clockwork};
pub use middleware::{X_CLOCKWORK_ID, X_CLOCKWORK_PATH, X_CLOCKWORK_VERSION};
pub use server::HttpServer;
