//! Value shaping for captured headers and bodies.
//!
//! Sensitive keys are redacted, long strings truncated, deep structures cut
//! off and long arrays capped, so a single request cannot blow up the store.

use serde_json::{Map, Value};

pub const REDACTED: &str = "[REDACTED]";
pub const TRUNCATED_SUFFIX: &str = "...[truncated]";
pub const DEPTH_EXCEEDED: &str = "[depth exceeded]";

/// Maximum array items kept per level.
pub const MAX_ARRAY_ITEMS: usize = 50;

pub const DEFAULT_REDACT_KEYS: &[&str] = &[
    "authorization",
    "cookie",
    "set-cookie",
    "x-api-key",
    "x-auth-token",
    "password",
    "passwd",
    "secret",
    "token",
    "access_token",
    "refresh_token",
    "api_key",
    "apikey",
    "credential",
    "credentials",
];

/// Limits applied by the sanitizer.
#[derive(Debug, Clone, PartialEq)]
pub struct SanitizeOptions {
    /// Lowercased keys; matching is substring in either direction.
    pub redact_keys: Vec<String>,
    /// Maximum characters kept per body string.
    pub max_length: usize,
    /// Maximum characters kept per header value.
    pub max_header_length: usize,
    pub max_depth: usize,
}

impl Default for SanitizeOptions {
    fn default() -> Self {
        Self {
            redact_keys: DEFAULT_REDACT_KEYS.iter().map(|k| k.to_string()).collect(),
            max_length: 10_000,
            max_header_length: 500,
            max_depth: 10,
        }
    }
}

impl SanitizeOptions {
    pub fn with_redact_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.redact_keys = keys
            .into_iter()
            .map(|k| k.as_ref().to_lowercase())
            .collect();
        self
    }

    pub fn should_redact(&self, key: &str) -> bool {
        let lower = key.to_lowercase();
        self.redact_keys
            .iter()
            .any(|k| !k.is_empty() && (lower.contains(k.as_str()) || k.contains(lower.as_str())))
    }

    /// Redact and cap a flat map such as headers or cookies.
    pub fn headers(&self, map: &Map<String, Value>) -> Map<String, Value> {
        map.iter()
            .map(|(k, v)| {
                let shaped = if self.should_redact(k) {
                    Value::String(REDACTED.to_string())
                } else {
                    match v {
                        Value::String(s) => Value::String(truncate(s, self.max_header_length)),
                        other => other.clone(),
                    }
                };
                (k.clone(), shaped)
            })
            .collect()
    }

    /// Recursively shape an arbitrary body value.
    pub fn body(&self, value: &Value) -> Value {
        self.body_at_depth(value, 0)
    }

    /// Shape a map-valued body, keeping the map type.
    pub fn body_map(&self, map: &Map<String, Value>) -> Map<String, Value> {
        match self.body(&Value::Object(map.clone())) {
            Value::Object(shaped) => shaped,
            _ => Map::new(),
        }
    }

    fn body_at_depth(&self, value: &Value, depth: usize) -> Value {
        match value {
            Value::Null | Value::Bool(_) | Value::Number(_) => value.clone(),
            Value::String(s) => Value::String(truncate(s, self.max_length)),
            _ if depth >= self.max_depth => Value::String(DEPTH_EXCEEDED.to_string()),
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .take(MAX_ARRAY_ITEMS)
                    .map(|item| self.body_at_depth(item, depth + 1))
                    .collect(),
            ),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| {
                        let shaped = if self.should_redact(k) {
                            Value::String(REDACTED.to_string())
                        } else {
                            self.body_at_depth(v, depth + 1)
                        };
                        (k.clone(), shaped)
                    })
                    .collect(),
            ),
        }
    }
}

/// Cut `s` to at most `max_chars` characters, marking the cut.
pub fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{}", &s[..byte_idx], TRUNCATED_SUFFIX),
        None => s.to_string(),
    }
}

/// Wrap anything that is not a JSON object so it can serve as a log context.
pub fn coerce_context(value: Value) -> Option<Map<String, Value>> {
    match value {
        Value::Null => None,
        Value::Object(map) => Some(map),
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            Some(map)
        }
    }
}

/// Clamp durations to a finite, non-negative number of milliseconds.
pub fn coerce_duration(ms: f64) -> f64 {
    if ms.is_finite() && ms > 0.0 {
        ms
    } else {
        0.0
    }
}
