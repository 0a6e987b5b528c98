//! Instrumentation plugins.
//!
//! # Data Flow
//! ```text
//! host library event (tracing event, panic, DB call)
//!     → plugin reads context::current_id()
//!     → None: ignored (startup, background jobs)
//!     → Some(id): MonitorCore capture API
//! ```
//!
//! # Design Decisions
//! - Plugins see the core only through `PluginContext`; the core knows
//!   nothing about the libraries being instrumented
//! - Every install returns a restore action; `PluginGuard` runs them in
//!   reverse order on drop

pub mod capture_layer;
pub mod db;
pub mod panic;

use std::sync::Arc;

use crate::context;
use crate::core::MonitorCore;

pub use capture_layer::CaptureLayer;
pub use db::QueryRecorder;
pub use panic::PanicCapturePlugin;

/// Undo action returned by [`Plugin::install`].
pub type Restore = Box<dyn FnOnce() + Send>;

/// Handle given to plugins at install time.
#[derive(Clone)]
pub struct PluginContext {
    core: Arc<MonitorCore>,
}

impl PluginContext {
    pub fn new(core: Arc<MonitorCore>) -> Self {
        Self { core }
    }

    pub fn core(&self) -> &Arc<MonitorCore> {
        &self.core
    }

    /// The request the calling code belongs to, if any.
    pub fn request_id(&self) -> Option<String> {
        context::current_id()
    }

    /// Query recorder bound to this context's core.
    pub fn query_recorder(&self, connection: impl Into<String>) -> QueryRecorder {
        QueryRecorder::new(Arc::clone(&self.core)).with_connection(connection)
    }
}

/// An instrumentation hook for some library or runtime facility.
pub trait Plugin: Send + Sync {
    fn name(&self) -> &'static str;

    /// Install the hook and return how to remove it.
    fn install(&self, ctx: &PluginContext) -> Restore;
}

/// Installed plugins; restores them in reverse order when dropped.
pub struct PluginGuard {
    restores: Vec<(&'static str, Restore)>,
}

impl PluginGuard {
    pub fn names(&self) -> Vec<&'static str> {
        self.restores.iter().map(|(name, _)| *name).collect()
    }
}

impl Drop for PluginGuard {
    fn drop(&mut self) {
        while let Some((name, restore)) = self.restores.pop() {
            restore();
            tracing::debug!(plugin = name, "Plugin restored");
        }
    }
}

/// Install `plugins` in order.
pub fn install_plugins(core: &Arc<MonitorCore>, plugins: &[Box<dyn Plugin>]) -> PluginGuard {
    let ctx = PluginContext::new(Arc::clone(core));
    let restores = plugins
        .iter()
        .map(|plugin| {
            tracing::info!(plugin = plugin.name(), "Installing plugin");
            (plugin.name(), plugin.install(&ctx))
        })
        .collect();
    PluginGuard { restores }
}

/// The plugins enabled by default.
pub fn default_plugins() -> Vec<Box<dyn Plugin>> {
    vec![Box::new(PanicCapturePlugin)]
}
