//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use clockwork_monitor::config::{CoreConfig, HttpConfig};
use clockwork_monitor::core::{FixedSampler, Finalize, MonitorCore, RequestInit};
use clockwork_monitor::http::Clockwork;

/// Core with constant gauges so memory deltas are deterministic.
pub fn core_with_capacity(max_requests: usize) -> Arc<MonitorCore> {
    let config = CoreConfig {
        max_requests,
        ..Default::default()
    };
    Arc::new(MonitorCore::new(&config).with_sampler(Arc::new(FixedSampler::default())))
}

pub fn core() -> Arc<MonitorCore> {
    core_with_capacity(100)
}

/// Capture and immediately finalize a GET request.
pub fn complete(core: &MonitorCore, uri: &str, status: u16, duration: f64) -> String {
    let id = core.capture_request(RequestInit::new("GET", uri));
    core.finalize_request(&id, Finalize::new(status, duration));
    id
}

/// `app` wrapped by an adapter over a fresh core.
pub fn attached(app: Router, config: HttpConfig) -> (Router, Clockwork) {
    let clockwork = Clockwork::new(core(), config);
    (clockwork.attach(app), clockwork)
}

/// Send one request through `router` in-process.
pub async fn send(router: &Router, request: Request<Body>) -> Response {
    router.clone().oneshot(request).await.unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
