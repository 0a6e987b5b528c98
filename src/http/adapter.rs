//! Shared adapter state: the core plus hot-reloadable HTTP options.

use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::Router;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::middleware::capture_middleware;
use crate::config::HttpConfig;
use crate::core::{MonitorCore, SanitizeOptions};

/// Resolved HTTP adapter options.
#[derive(Debug, Clone)]
pub struct AdapterOptions {
    pub config: HttpConfig,
    pub base_path: String,
    pub sanitize: SanitizeOptions,
}

impl AdapterOptions {
    pub fn new(config: HttpConfig) -> Self {
        Self {
            base_path: config.base_path(),
            sanitize: config.sanitize_options(),
            config,
        }
    }

    /// Whether `path` is served by the data API.
    pub fn is_data_path(&self, path: &str) -> bool {
        match path.strip_prefix(self.base_path.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    pub fn should_ignore(&self, path: &str) -> bool {
        self.config
            .ignore_starts_with
            .iter()
            .any(|prefix| !prefix.is_empty() && path.starts_with(prefix.as_str()))
    }
}

/// Axum-facing handle: clone it into the middleware state.
#[derive(Clone)]
pub struct Clockwork {
    core: Arc<MonitorCore>,
    options: Arc<ArcSwap<AdapterOptions>>,
}

impl Clockwork {
    pub fn new(core: Arc<MonitorCore>, config: HttpConfig) -> Self {
        core.set_sanitizer(config.sanitize_options());
        Self {
            core,
            options: Arc::new(ArcSwap::from_pointee(AdapterOptions::new(config))),
        }
    }

    pub fn core(&self) -> &Arc<MonitorCore> {
        &self.core
    }

    /// Current options; cheap, lock-free.
    pub fn options(&self) -> Arc<AdapterOptions> {
        self.options.load_full()
    }

    /// Swap in new options. In-flight requests keep the request-side options
    /// they started with; response bodies use whatever is current at finalize.
    pub fn reload(&self, config: HttpConfig) {
        let options = AdapterOptions::new(config);
        self.core.set_sanitizer(options.sanitize.clone());
        self.options.store(Arc::new(options));
    }

    /// Apply every config received on `updates` until the sender is dropped.
    pub fn spawn_reloader(&self, mut updates: mpsc::UnboundedReceiver<HttpConfig>) -> JoinHandle<()> {
        let adapter = self.clone();
        tokio::spawn(async move {
            while let Some(config) = updates.recv().await {
                adapter.reload(config);
            }
        })
    }

    /// Wrap `router` with request capture and the data API.
    pub fn attach<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router.layer(axum::middleware::from_fn_with_state(
            self.clone(),
            capture_middleware,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_path_matching() {
        let options = AdapterOptions::new(HttpConfig::default());
        assert!(options.is_data_path("/__clockwork"));
        assert!(options.is_data_path("/__clockwork/abc"));
        assert!(!options.is_data_path("/__clockworkx"));
        assert!(!options.is_data_path("/api"));
    }

    #[test]
    fn test_ignore_prefixes() {
        let options = AdapterOptions::new(HttpConfig {
            ignore_starts_with: vec!["/health".into(), String::new()],
            ..Default::default()
        });
        assert!(options.should_ignore("/healthz"));
        assert!(!options.should_ignore("/api"));
    }

    #[test]
    fn test_reload_swaps_options() {
        let adapter = Clockwork::new(Arc::new(MonitorCore::default()), HttpConfig::default());
        adapter.reload(HttpConfig {
            path: "/debug/".into(),
            ..Default::default()
        });
        assert_eq!(adapter.options().base_path, "/debug");
    }

    #[test]
    fn test_reload_updates_core_sanitizer() {
        let core = Arc::new(MonitorCore::default());
        let adapter = Clockwork::new(Arc::clone(&core), HttpConfig::default());
        adapter.reload(HttpConfig {
            redact_keys: vec!["password".into()],
            max_body_size: 100_000,
            ..Default::default()
        });
        assert_eq!(core.sanitizer().max_length, 100_000);
    }
}
