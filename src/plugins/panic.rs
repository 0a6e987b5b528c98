//! Panic capture.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::futures::TaskLocalFuture;

use super::{Plugin, PluginContext, Restore};
use crate::context;

tokio::task_local! {
    static RECORDED: Arc<AtomicBool>;
}

/// Run `future` with `recorded` set whenever the hook logs a panic raised
/// while polling it. Tasks spawned from `future` do not share the flag.
pub fn track_recorded<F>(
    recorded: Arc<AtomicBool>,
    future: F,
) -> TaskLocalFuture<Arc<AtomicBool>, F>
where
    F: Future,
{
    RECORDED.scope(recorded, future)
}

/// Records panics raised inside a request scope into that request's log.
///
/// The previously installed hook still runs afterwards.
pub struct PanicCapturePlugin;

impl Plugin for PanicCapturePlugin {
    fn name(&self) -> &'static str {
        "panic"
    }

    fn install(&self, ctx: &PluginContext) -> Restore {
        let previous = Arc::new(std::panic::take_hook());
        let core = Arc::clone(ctx.core());
        let chained = Arc::clone(&previous);

        std::panic::set_hook(Box::new(move |info| {
            if let Some(id) = context::current_id() {
                let location = info.location().map(|l| l.to_string());
                core.capture_panic(info.payload(), location, Some(id.as_str()));
                let _ = RECORDED.try_with(|flag| flag.store(true, Ordering::Relaxed));
            }
            (chained.as_ref())(info);
        }));

        Box::new(move || {
            let _ = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| (previous.as_ref())(info)));
        })
    }
}
