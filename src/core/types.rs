//! Data model for captured requests.
//!
//! All types serialize with camelCase field names so the JSON matches what the
//! dashboard reads.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Severity of a captured log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl From<&tracing::Level> for LogLevel {
    fn from(level: &tracing::Level) -> Self {
        match *level {
            tracing::Level::ERROR => LogLevel::Error,
            tracing::Level::WARN => LogLevel::Warning,
            tracing::Level::INFO => LogLevel::Info,
            _ => LogLevel::Debug,
        }
    }
}

/// Where a log entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSource {
    /// Recorded explicitly through the capture API.
    Clockwork,
    /// Intercepted from the host's own logging.
    Native,
}

/// A single log line attached to a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Map<String, Value>>,
    /// Seconds elapsed since the request started.
    pub time: f64,
    pub source: LogSource,
}

/// A database query observed while the request was in flight.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryData {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bindings: Option<Vec<Value>>,
    /// Milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection: Option<String>,
}

impl QueryData {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn with_bindings(mut self, bindings: Vec<Value>) -> Self {
        self.bindings = Some(bindings);
        self
    }

    pub fn with_duration(mut self, duration_ms: f64) -> Self {
        self.duration = Some(duration_ms);
        self
    }

    pub fn with_connection(mut self, connection: impl Into<String>) -> Self {
        self.connection = Some(connection.into());
        self
    }
}

/// A named interval on the request timeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventData {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl EventData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Complete recorded state of one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSnapshot {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub method: String,
    pub uri: String,
    pub headers: Map<String, Value>,
    pub get_data: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookies: Option<Map<String, Value>>,
    pub response_status: u16,
    /// Epoch milliseconds at capture.
    pub response_time: f64,
    /// Milliseconds, 0 until finalized.
    pub response_duration: f64,
    /// Baseline bytes while in flight, delta bytes once finalized.
    pub memory_usage: i64,
    /// Start time in fractional epoch seconds.
    pub time: f64,
    pub log: Vec<LogEntry>,
    pub database_queries: Vec<QueryData>,
    pub timeline_data: Vec<EventData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub controller: Option<String>,
}

impl RequestSnapshot {
    /// Whether `finalize_request` has sealed this snapshot.
    pub fn is_finalized(&self) -> bool {
        self.response_status != 0
    }

    pub fn metadata(&self) -> RequestMetadata {
        RequestMetadata {
            id: self.id.clone(),
            method: self.method.clone(),
            uri: self.uri.clone(),
            controller: self.controller.clone(),
            response_status: self.response_status,
            response_duration: self.response_duration,
            time: self.time,
        }
    }
}

/// Fields supplied by the transport when a request starts.
#[derive(Debug, Clone, Default)]
pub struct RequestInit {
    /// Caller-supplied id; one is generated when absent.
    pub id: Option<String>,
    pub method: String,
    pub uri: String,
    pub headers: Map<String, Value>,
    pub get_data: Map<String, Value>,
    pub post_data: Option<Value>,
    pub cookies: Option<Map<String, Value>>,
    pub controller: Option<String>,
}

impl RequestInit {
    pub fn new(method: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            uri: uri.into(),
            ..Default::default()
        }
    }
}

/// Values applied when a request completes.
#[derive(Debug, Clone, Default)]
pub struct Finalize {
    pub status: u16,
    /// Milliseconds.
    pub duration: f64,
    pub response_body: Option<Value>,
}

impl Finalize {
    pub fn new(status: u16, duration: f64) -> Self {
        Self {
            status,
            duration,
            response_body: None,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.response_body = Some(body);
        self
    }
}

/// List-view summary of a stored request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestMetadata {
    pub id: String,
    pub method: String,
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub controller: Option<String>,
    pub response_status: u16,
    pub response_duration: f64,
    pub time: f64,
}

/// Result of `get_snapshot`: newest-first request list plus metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub requests: Vec<RequestMetadata>,
    pub metrics: super::metrics::MetricsReport,
}
