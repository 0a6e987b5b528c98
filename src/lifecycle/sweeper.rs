//! Periodic removal of abandoned in-flight requests.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time;

use super::shutdown::ShutdownSignal;
use crate::core::MonitorCore;

/// Run `sweep_stale(ttl)` every `interval` until shutdown.
pub fn spawn_sweeper(
    core: Arc<MonitorCore>,
    interval: Duration,
    ttl: Duration,
    mut shutdown: ShutdownSignal,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(
            interval_secs = interval.as_secs(),
            ttl_secs = ttl.as_secs(),
            "In-flight sweeper starting"
        );
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        // first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    core.sweep_stale(ttl);
                }
                _ = shutdown.recv() => {
                    tracing::info!("In-flight sweeper stopping");
                    break;
                }
            }
        }
    })
}
