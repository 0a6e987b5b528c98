//! HTTP server setup.
//!
//! # Responsibilities
//! - Wrap the host router with request capture
//! - Wire up the tracing layer
//! - Bind server to listener
//! - Drain on shutdown

use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use super::adapter::Clockwork;
use crate::lifecycle::ShutdownSignal;

/// Serves a host application with Clockwork attached.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Attach `clockwork` to `app`.
    pub fn new(app: Router, clockwork: &Clockwork) -> Self {
        let router = clockwork
            .attach(app)
            .layer(TraceLayer::new_for_http());
        Self { router }
    }

    /// The fully layered router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(self, listener: TcpListener, mut shutdown: ShutdownSignal) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
