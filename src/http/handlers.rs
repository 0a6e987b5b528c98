//! Data API served under the configured base path.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use super::adapter::{AdapterOptions, Clockwork};

/// Route a path relative to the base path.
///
/// `""` or `index` returns the snapshot, `metrics` the metrics report,
/// `latest` the newest stored request, anything else a request by id.
pub fn serve_data(clockwork: &Clockwork, options: &AdapterOptions, relative: &str) -> Response {
    let core = clockwork.core();
    let segment = relative.split('/').next().unwrap_or_default();

    match segment {
        "" | "index" => Json(core.get_snapshot(options.config.snapshot_limit)).into_response(),
        "metrics" => Json(core.metrics()).into_response(),
        "latest" => match core.latest() {
            Some(request) => Json(request).into_response(),
            None => not_found("No requests found"),
        },
        id => match core.get_request(id) {
            Some(request) => Json(request).into_response(),
            None => not_found("Request not found"),
        },
    }
}

fn not_found(message: &str) -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
}
