//! Capture middleware.
//!
//! # Responsibilities
//! - Answer data API paths before the host app sees them
//! - Sanitize and record the inbound request
//! - Run the rest of the stack inside the request's context scope
//! - Tag the response and finalize the snapshot

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::body::{Body, Bytes, HttpBody};
use axum::extract::{MatchedPath, Query, Request, State};
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE, COOKIE};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use futures_util::FutureExt;
use serde_json::{Map, Value};

use super::adapter::{AdapterOptions, Clockwork};
use super::handlers::serve_data;
use crate::context;
use crate::core::sanitize::{truncate, TRUNCATED_SUFFIX};
use crate::core::{Finalize, RequestInit};
use crate::plugins::panic::track_recorded;

/// Largest body buffered for capture, in either direction.
pub const MAX_BUFFERED_BODY: usize = 1024 * 1024;

pub const X_CLOCKWORK_ID: HeaderName = HeaderName::from_static("x-clockwork-id");
pub const X_CLOCKWORK_VERSION: HeaderName = HeaderName::from_static("x-clockwork-version");
pub const X_CLOCKWORK_PATH: HeaderName = HeaderName::from_static("x-clockwork-path");

const PROTOCOL_VERSION: &str = "2.0";

/// Axum middleware installed by [`Clockwork::attach`].
pub async fn capture_middleware(
    State(clockwork): State<Clockwork>,
    request: Request,
    next: Next,
) -> Response {
    let options = clockwork.options();
    let path = request.uri().path().to_string();

    if options.is_data_path(&path) {
        let relative = path[options.base_path.len()..].trim_start_matches('/');
        return serve_data(&clockwork, &options, relative);
    }
    if options.should_ignore(&path) {
        return next.run(request).await;
    }

    let started = Instant::now();
    let (parts, body) = request.into_parts();

    let headers = options.sanitize.headers(&header_map(&parts.headers));
    let get_data = Query::<Vec<(String, String)>>::try_from_uri(&parts.uri)
        .map(|Query(pairs)| options.sanitize.body_map(&pairs_to_map(pairs)))
        .unwrap_or_default();
    let cookies = parse_cookies(&parts.headers).map(|c| options.sanitize.headers(&c));
    let controller = parts
        .extensions
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string());

    let (body, post_data) = if options.config.capture_request_body && fits_buffer(&parts.headers) {
        match axum::body::to_bytes(body, MAX_BUFFERED_BODY).await {
            Ok(bytes) => {
                let captured = body_value(&bytes).map(|v| options.sanitize.body(&v));
                (Body::from(bytes), captured)
            }
            Err(e) => {
                tracing::debug!(error = %e, "Failed to read request body");
                return (StatusCode::BAD_REQUEST, "Invalid request body").into_response();
            }
        }
    } else {
        (body, None)
    };

    let id = clockwork.core().capture_request(RequestInit {
        id: None,
        method: parts.method.to_string(),
        uri: parts.uri.to_string(),
        headers,
        get_data,
        post_data,
        cookies,
        controller,
    });

    let request = Request::from_parts(parts, body);
    let hooked = Arc::new(AtomicBool::new(false));
    let outcome = context::run(
        id.as_str(),
        track_recorded(
            Arc::clone(&hooked),
            AssertUnwindSafe(next.run(request)).catch_unwind(),
        ),
    )
    .await;

    let mut response = match outcome {
        Ok(response) => response,
        Err(payload) => {
            if !hooked.load(Ordering::Relaxed) {
                clockwork
                    .core()
                    .capture_panic(&*payload, None, Some(id.as_str()));
            }
            internal_error()
        }
    };

    let duration = started.elapsed().as_secs_f64() * 1000.0;
    let mut captured = None;

    if options.config.capture_response_body {
        let (parts, body) = response.into_parts();
        response = match capture_response_body(body, &parts.headers, &options).await {
            Ok((body, value)) => {
                captured = value;
                Response::from_parts(parts, body)
            }
            Err(e) => {
                tracing::warn!(id = %id, error = %e, "Failed to buffer response body");
                internal_error()
            }
        };
    }

    tag_response(response.headers_mut(), &options, &id);

    let mut finalize = Finalize::new(response.status().as_u16(), duration);
    if let Some(captured) = captured {
        finalize = finalize.with_body(captured);
    }
    clockwork.core().finalize_request(&id, finalize);
    response
}

fn tag_response(headers: &mut HeaderMap, options: &AdapterOptions, id: &str) {
    if let Ok(value) = HeaderValue::from_str(id) {
        headers.insert(X_CLOCKWORK_ID, value);
    }
    headers.insert(X_CLOCKWORK_VERSION, HeaderValue::from_static(PROTOCOL_VERSION));
    if let Ok(value) = HeaderValue::from_str(&format!("{}/{}", options.base_path, id)) {
        headers.insert(X_CLOCKWORK_PATH, value);
    }
}

fn internal_error() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
}

/// Buffer and record a response body whose size is known and bounded.
/// Streaming bodies pass through untouched. Sanitizing is left to the core.
async fn capture_response_body(
    body: Body,
    headers: &HeaderMap,
    options: &AdapterOptions,
) -> Result<(Body, Option<Value>), axum::Error> {
    let bounded = match body.size_hint().exact() {
        Some(n) => n > 0 && n as usize <= MAX_BUFFERED_BODY,
        None => fits_buffer(headers),
    };
    if !bounded {
        return Ok((body, None));
    }

    let bytes = axum::body::to_bytes(body, MAX_BUFFERED_BODY).await?;

    let limit = options.config.max_body_size;
    let captured = if bytes.len() > limit {
        let text = String::from_utf8_lossy(&bytes);
        let mut kept = truncate(&text, limit);
        if !kept.ends_with(TRUNCATED_SUFFIX) {
            kept.push_str(TRUNCATED_SUFFIX);
        }
        Some(Value::String(kept))
    } else if is_json(headers) {
        body_value(&bytes)
    } else {
        Some(Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };

    Ok((Body::from(bytes), captured))
}

fn fits_buffer(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
        .is_some_and(|len| len > 0 && len <= MAX_BUFFERED_BODY)
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("json"))
}

/// JSON when it parses, text otherwise.
fn body_value(bytes: &Bytes) -> Option<Value> {
    if bytes.is_empty() {
        return None;
    }
    serde_json::from_slice(bytes)
        .ok()
        .or_else(|| Some(Value::String(String::from_utf8_lossy(bytes).into_owned())))
}

/// Repeated header names are joined with ", ".
fn header_map(headers: &HeaderMap) -> Map<String, Value> {
    let mut map = Map::new();
    for name in headers.keys() {
        let joined = headers
            .get_all(name)
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .collect::<Vec<_>>()
            .join(", ");
        map.insert(name.as_str().to_string(), Value::String(joined));
    }
    map
}

/// Repeated query keys become arrays.
fn pairs_to_map(pairs: Vec<(String, String)>) -> Map<String, Value> {
    let mut map = Map::new();
    for (key, value) in pairs {
        match map.get_mut(&key) {
            Some(Value::Array(items)) => items.push(Value::String(value)),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, Value::String(value)]);
            }
            None => {
                map.insert(key, Value::String(value));
            }
        }
    }
    map
}

fn parse_cookies(headers: &HeaderMap) -> Option<Map<String, Value>> {
    let mut cookies = Map::new();
    for header in headers.get_all(COOKIE) {
        let Ok(raw) = header.to_str() else { continue };
        for pair in raw.split(';') {
            if let Some((name, value)) = pair.split_once('=') {
                let name = name.trim();
                if !name.is_empty() {
                    cookies.insert(name.to_string(), Value::String(value.trim().to_string()));
                }
            }
        }
    }
    (!cookies.is_empty()).then_some(cookies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_repeated_headers_are_joined() {
        let mut headers = HeaderMap::new();
        headers.append("accept", HeaderValue::from_static("text/html"));
        headers.append("accept", HeaderValue::from_static("application/json"));
        let map = header_map(&headers);
        assert_eq!(map["accept"], json!("text/html, application/json"));
    }

    #[test]
    fn test_repeated_query_keys_become_arrays() {
        let map = pairs_to_map(vec![
            ("a".into(), "1".into()),
            ("a".into(), "2".into()),
            ("a".into(), "3".into()),
            ("b".into(), "x".into()),
        ]);
        assert_eq!(map["a"], json!(["1", "2", "3"]));
        assert_eq!(map["b"], json!("x"));
    }

    #[test]
    fn test_cookie_parsing() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; session=abc; junk"));
        let cookies = parse_cookies(&headers).unwrap();
        assert_eq!(cookies["theme"], json!("dark"));
        assert_eq!(cookies["session"], json!("abc"));
        assert_eq!(cookies.len(), 2);
        assert!(parse_cookies(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_body_value_prefers_json() {
        assert_eq!(body_value(&Bytes::from_static(b"{\"a\":1}")), Some(json!({"a": 1})));
        assert_eq!(body_value(&Bytes::from_static(b"plain")), Some(json!("plain")));
        assert_eq!(body_value(&Bytes::new()), None);
    }
}
