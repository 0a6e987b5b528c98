//! Configuration file watcher for hot reload of adapter options.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::{ClockworkConfig, HttpConfig};

/// Keeps the file watch alive; dropping it stops reloads.
pub struct ConfigWatcher {
    path: PathBuf,
    _watcher: RecommendedWatcher,
}

impl ConfigWatcher {
    /// Watch `path`, starting from `current`.
    ///
    /// Every valid change to the `[http]` section is sent on the returned
    /// channel. Changes elsewhere are logged and ignored because they only take
    /// effect at startup. Invalid files keep the current configuration.
    pub fn start(
        path: &Path,
        current: ClockworkConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<HttpConfig>), notify::Error> {
        let (tx, rx) = mpsc::unbounded_channel();
        let last = Mutex::new(current);
        let reload_path = path.to_path_buf();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let event = match res {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::error!(error = %e, "Config watch error");
                        return;
                    }
                };
                if !(event.kind.is_modify() || event.kind.is_create()) {
                    return;
                }

                let next = match load_config(&reload_path) {
                    Ok(next) => next,
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to reload config, keeping current");
                        return;
                    }
                };

                let mut last = last.lock().unwrap_or_else(|e| e.into_inner());
                if next.core != last.core || next.listener != last.listener {
                    tracing::warn!("Core/listener config changed; restart required to apply");
                }
                if next.http != last.http {
                    tracing::info!(path = %next.http.base_path(), "HTTP adapter config reloaded");
                    let _ = tx.send(next.http.clone());
                }
                *last = next;
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(path, RecursiveMode::NonRecursive)?;
        tracing::info!(path = ?path, "Config watcher started");

        Ok((
            Self {
                path: path.to_path_buf(),
                _watcher: watcher,
            },
            rx,
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
