//! Rolling request metrics derived from the snapshot store.
//!
//! # Design Decisions
//! - Recomputed from stored snapshots on every call, never maintained
//!   incrementally, so there is no state to drift or reset
//! - Cost is O(n) in the sampled snapshots, bounded by `METRICS_REQUEST_LIMIT`
//! - The window is `(now - W, now]`; a snapshot stamped exactly `now` lands in
//!   the last bucket, anything later is treated as clock skew and dropped

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::sampler::{OsGauges, ProcessGauges};
use super::types::RequestSnapshot;

/// Width of the rolling window in seconds.
pub const ROLLING_WINDOW_SECS: f64 = 60.0;

/// Width of one bucket in seconds.
pub const SPAN_INTERVAL_SECS: f64 = 10.0;

/// Number of buckets in the window.
pub const SPAN_RETENTION: usize = (ROLLING_WINDOW_SECS / SPAN_INTERVAL_SECS) as usize;

/// How many stored snapshots feed the metrics (more than the list view shows).
pub const METRICS_REQUEST_LIMIT: usize = 500;

/// Bucketed statistics for one rolling window, oldest bucket first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSpan {
    /// Bucket width in seconds.
    pub interval: f64,
    /// Number of buckets.
    pub retention: usize,
    /// Mean response time per bucket in ms (0 for empty buckets).
    pub response_time: Vec<f64>,
    /// Requests per second per bucket.
    pub rps: Vec<f64>,
    /// Raw request count per bucket.
    pub counts: Vec<u64>,
    /// Status-class histogram per bucket, keyed `2xx`..`5xx`.
    pub status_codes: Vec<BTreeMap<String, u64>>,
}

/// Metrics section of a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub spans: Vec<MetricsSpan>,
    /// Epoch seconds when the report was built.
    pub timestamp: f64,
    pub os: OsGauges,
    pub process: ProcessGauges,
}

/// Window geometry used by [`build_span`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpanWindow {
    pub window_secs: f64,
    pub interval_secs: f64,
}

impl Default for SpanWindow {
    fn default() -> Self {
        Self {
            window_secs: ROLLING_WINDOW_SECS,
            interval_secs: SPAN_INTERVAL_SECS,
        }
    }
}

impl SpanWindow {
    pub fn bucket_count(&self) -> usize {
        if self.interval_secs <= 0.0 {
            return 0;
        }
        (self.window_secs / self.interval_secs).floor() as usize
    }

    /// Bucket for a request started at `time`, or `None` outside the window.
    pub fn bucket_index(&self, time: f64, now: f64) -> Option<usize> {
        let count = self.bucket_count();
        if count == 0 || !time.is_finite() || time > now {
            return None;
        }
        let offset = time - (now - self.window_secs);
        if offset < 0.0 {
            return None;
        }
        let index = (offset / self.interval_secs).floor() as usize;
        Some(index.min(count - 1))
    }
}

/// Status class label: `status / 100`, clamped to the 2xx..5xx range.
pub fn status_class(status: u16) -> &'static str {
    match (status / 100).clamp(2, 5) {
        2 => "2xx",
        3 => "3xx",
        4 => "4xx",
        _ => "5xx",
    }
}

/// Aggregate `requests` into one span ending at `now` (epoch seconds).
pub fn build_span<'a, I>(requests: I, now: f64, window: SpanWindow) -> MetricsSpan
where
    I: IntoIterator<Item = &'a RequestSnapshot>,
{
    let count = window.bucket_count();
    let mut durations = vec![0.0_f64; count];
    let mut counts = vec![0_u64; count];
    let mut status_codes: Vec<BTreeMap<String, u64>> = vec![BTreeMap::new(); count];

    for request in requests {
        if !request.is_finalized() {
            continue;
        }
        let Some(bucket) = window.bucket_index(request.time, now) else {
            continue;
        };
        durations[bucket] += request.response_duration;
        counts[bucket] += 1;
        *status_codes[bucket]
            .entry(status_class(request.response_status).to_string())
            .or_insert(0) += 1;
    }

    let response_time = durations
        .iter()
        .zip(&counts)
        .map(|(&sum, &n)| if n > 0 { sum / n as f64 } else { 0.0 })
        .collect();
    let rps = counts
        .iter()
        .map(|&n| n as f64 / window.interval_secs)
        .collect();

    MetricsSpan {
        interval: window.interval_secs,
        retention: count,
        response_time,
        rps,
        counts,
        status_codes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn finished(time: f64, status: u16, duration: f64) -> RequestSnapshot {
        RequestSnapshot {
            id: format!("{time}"),
            kind: "http".into(),
            method: "GET".into(),
            uri: "/".into(),
            headers: Map::new(),
            get_data: Map::new(),
            post_data: None,
            response_data: None,
            cookies: None,
            response_status: status,
            response_time: time * 1000.0,
            response_duration: duration,
            memory_usage: 0,
            time,
            log: Vec::new(),
            database_queries: Vec::new(),
            timeline_data: Vec::new(),
            controller: None,
        }
    }

    #[test]
    fn test_single_request_at_now_lands_in_last_bucket() {
        let now = 1_700_000_000.0;
        let requests = [finished(now, 200, 100.0)];
        let span = build_span(requests.iter(), now, SpanWindow::default());

        assert_eq!(span.retention, 6);
        assert_eq!(span.counts, vec![0, 0, 0, 0, 0, 1]);
        assert_eq!(span.response_time[5], 100.0);
        assert_eq!(span.status_codes[5].get("2xx"), Some(&1));
        for i in 0..5 {
            assert_eq!(span.response_time[i], 0.0);
            assert!(span.status_codes[i].is_empty());
        }
    }

    #[test]
    fn test_mean_and_status_classes() {
        let now = 1_000.0;
        let requests = [
            finished(now - 55.0, 200, 10.0),
            finished(now - 52.0, 404, 30.0),
            finished(now - 51.0, 503, 50.0),
            finished(now - 15.0, 301, 7.0),
        ];
        let span = build_span(requests.iter(), now, SpanWindow::default());

        assert_eq!(span.counts[0], 3);
        assert_eq!(span.response_time[0], 30.0);
        assert_eq!(span.rps[0], 0.3);
        assert_eq!(span.status_codes[0].get("4xx"), Some(&1));
        assert_eq!(span.status_codes[0].get("5xx"), Some(&1));
        assert_eq!(span.counts[4], 1);
        assert_eq!(span.status_codes[4].get("3xx"), Some(&1));
    }

    #[test]
    fn test_out_of_window_and_unfinished_are_dropped() {
        let now = 1_000.0;
        let requests = [
            finished(now - 61.0, 200, 10.0),
            finished(now + 5.0, 200, 10.0),
            finished(now - 1.0, 0, 10.0),
        ];
        let span = build_span(requests.iter(), now, SpanWindow::default());
        assert!(span.counts.iter().all(|&c| c == 0));
        assert!(span.response_time.iter().all(|&t| t == 0.0));
    }

    #[test]
    fn test_status_class_clamps() {
        assert_eq!(status_class(101), "2xx");
        assert_eq!(status_class(204), "2xx");
        assert_eq!(status_class(418), "4xx");
        assert_eq!(status_class(599), "5xx");
        assert_eq!(status_class(999), "5xx");
    }
}
