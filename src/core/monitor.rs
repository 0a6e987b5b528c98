//! Request lifecycle manager.
//!
//! # Responsibilities
//! - Create in-flight snapshots when a request starts
//! - Attach logs, queries and timeline events while the request runs
//! - Seal snapshots and move them into the store on finalize
//! - Answer list, detail and metrics queries
//!
//! # Design Decisions
//! - An id is either in flight or stored, never both; finalize removes the
//!   in-flight entry while holding the store lock
//! - Unknown ids are silent no-ops: late events from detached tasks and
//!   double finalizes are expected, not errors
//! - No public operation returns an error or panics; poisoned locks are
//!   recovered because the data is diagnostic only

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use arc_swap::ArcSwap;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::{json, Map, Value};

use super::id::generate_id;
use super::metrics::{build_span, status_class, MetricsReport, SpanWindow, METRICS_REQUEST_LIMIT};
use super::ring_buffer::{RequestRingBuffer, RequestStorage};
use super::sampler::{ProcessSampler, SystemSampler};
use super::sanitize::{coerce_context, coerce_duration, SanitizeOptions};
use super::types::{
    EventData, Finalize, LogEntry, LogLevel, LogSource, QueryData, RequestInit, RequestMetadata,
    RequestSnapshot, Snapshot,
};
use crate::config::CoreConfig;
use crate::observability::metrics;

/// A snapshot still being assembled.
struct InFlight {
    snapshot: RequestSnapshot,
    started: Instant,
}

impl InFlight {
    fn elapsed_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }
}

/// The monitoring engine shared by the transport adapter and plugins.
pub struct MonitorCore {
    in_flight: DashMap<String, InFlight>,
    store: Mutex<Box<dyn RequestStorage>>,
    sampler: Arc<dyn SystemSampler>,
    sanitize: ArcSwap<SanitizeOptions>,
    window: SpanWindow,
}

impl MonitorCore {
    /// Create a monitor with an in-memory ring buffer of `config.max_requests`.
    pub fn new(config: &CoreConfig) -> Self {
        Self {
            in_flight: DashMap::new(),
            store: Mutex::new(Box::new(RequestRingBuffer::new(config.max_requests))),
            sampler: Arc::new(ProcessSampler::new()),
            sanitize: ArcSwap::from_pointee(SanitizeOptions::default()),
            window: SpanWindow::default(),
        }
    }

    /// Replace the storage backend.
    pub fn with_storage(mut self, storage: Box<dyn RequestStorage>) -> Self {
        self.store = Mutex::new(storage);
        self
    }

    /// Replace the gauge sampler.
    pub fn with_sampler(mut self, sampler: Arc<dyn SystemSampler>) -> Self {
        self.sampler = sampler;
        self
    }

    /// Limits applied to response bodies at finalize.
    pub fn with_sanitizer(self, sanitize: SanitizeOptions) -> Self {
        self.set_sanitizer(sanitize);
        self
    }

    /// Swap the response body limits; requests finalized afterwards use them.
    pub fn set_sanitizer(&self, sanitize: SanitizeOptions) {
        self.sanitize.store(Arc::new(sanitize));
    }

    pub fn sanitizer(&self) -> Arc<SanitizeOptions> {
        self.sanitize.load_full()
    }

    pub fn with_window(mut self, window: SpanWindow) -> Self {
        self.window = window;
        self
    }

    fn store(&self) -> MutexGuard<'_, Box<dyn RequestStorage>> {
        self.store.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Apply `f` to the in-flight entry for `id`. Returns false if absent.
    fn with_in_flight(&self, id: &str, f: impl FnOnce(&mut InFlight)) -> bool {
        match self.in_flight.get_mut(id) {
            Some(mut entry) => {
                f(entry.value_mut());
                true
            }
            None => false,
        }
    }

    /// Begin capturing a request. Returns its id.
    ///
    /// A caller-supplied id that is already in use is replaced by a fresh one.
    pub fn capture_request(&self, init: RequestInit) -> String {
        let start = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let baseline = self.sampler.memory_used() as i64;

        let mut candidate = match init.id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => generate_id(),
        };

        let mut snapshot = RequestSnapshot {
            id: String::new(),
            kind: "http".to_string(),
            method: init.method,
            uri: init.uri,
            headers: init.headers,
            get_data: init.get_data,
            post_data: init.post_data,
            response_data: None,
            cookies: init.cookies,
            response_status: 0,
            response_time: start.as_secs_f64() * 1000.0,
            response_duration: 0.0,
            memory_usage: baseline,
            time: start.as_secs_f64(),
            log: Vec::new(),
            database_queries: Vec::new(),
            timeline_data: Vec::new(),
            controller: init.controller,
        };

        loop {
            if self.store().contains(&candidate) {
                tracing::warn!(id = %candidate, "Request id already stored, generating a new one");
                candidate = generate_id();
                continue;
            }
            match self.in_flight.entry(candidate.clone()) {
                Entry::Vacant(slot) => {
                    snapshot.id = candidate.clone();
                    slot.insert(InFlight {
                        snapshot,
                        started: Instant::now(),
                    });
                    break;
                }
                Entry::Occupied(_) => {}
            }
            tracing::warn!(id = %candidate, "Request id already in flight, generating a new one");
            candidate = generate_id();
        }

        metrics::record_captured();
        metrics::record_in_flight(self.in_flight.len());
        tracing::debug!(id = %candidate, "Request captured");
        candidate
    }

    /// Attach a log entry recorded through the capture API.
    pub fn capture_log(
        &self,
        id: &str,
        level: LogLevel,
        message: impl fmt::Display,
        context: Option<Value>,
    ) {
        self.with_in_flight(id, |entry| {
            let time = entry.elapsed_secs();
            entry.snapshot.log.push(LogEntry {
                level,
                message: message.to_string(),
                context: context.and_then(coerce_context),
                time,
                source: LogSource::Clockwork,
            });
        });
    }

    /// Attach a log entry intercepted from the host's own logging.
    ///
    /// `time_offset` (seconds since request start) skips the clock read when
    /// the caller already knows it.
    pub fn capture_native_log(
        &self,
        id: &str,
        level: LogLevel,
        message: impl fmt::Display,
        context: Option<Value>,
        time_offset: Option<f64>,
    ) {
        self.with_in_flight(id, |entry| {
            let time = match time_offset {
                Some(t) if t.is_finite() && t >= 0.0 => t,
                _ => entry.elapsed_secs(),
            };
            entry.snapshot.log.push(LogEntry {
                level,
                message: message.to_string(),
                context: context.and_then(coerce_context),
                time,
                source: LogSource::Native,
            });
        });
    }

    /// Record an error at `error` level. Dropped when there is no request.
    pub fn capture_error<E>(&self, error: &E, id: Option<&str>)
    where
        E: std::error::Error + ?Sized,
    {
        let Some(id) = id else {
            tracing::debug!(error = %error, "Dropping error outside a request");
            return;
        };

        let mut sources = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            sources.push(Value::String(cause.to_string()));
            source = cause.source();
        }

        let mut context = Map::new();
        context.insert("name".to_string(), json!(std::any::type_name::<E>()));
        if !sources.is_empty() {
            context.insert("sources".to_string(), Value::Array(sources));
        }
        self.capture_log(id, LogLevel::Error, error, Some(Value::Object(context)));
    }

    /// Record a panic payload at `error` level. Dropped when there is no request.
    pub fn capture_panic(&self, payload: &(dyn Any + Send), location: Option<String>, id: Option<&str>) {
        let Some(id) = id else { return };

        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "panic with non-string payload".to_string()
        };

        let mut context = Map::new();
        context.insert("name".to_string(), json!("panic"));
        if let Some(location) = location {
            context.insert("location".to_string(), json!(location));
        }
        self.capture_log(id, LogLevel::Error, message, Some(Value::Object(context)));
    }

    /// Append a database query to an in-flight request.
    pub fn add_query(&self, id: &str, mut query: QueryData) {
        query.duration = query.duration.map(coerce_duration);
        self.with_in_flight(id, |entry| entry.snapshot.database_queries.push(query));
    }

    /// Append a timeline event to an in-flight request.
    pub fn add_event(&self, id: &str, mut event: EventData) {
        event.duration = event.duration.map(coerce_duration);
        self.with_in_flight(id, |entry| entry.snapshot.timeline_data.push(event));
    }

    /// Start a timeline event that is recorded when the timer finishes.
    pub fn start_event(self: &Arc<Self>, id: &str, name: impl Into<String>) -> EventTimer {
        EventTimer {
            core: Arc::clone(self),
            id: id.to_string(),
            event: Some(EventData::new(name)),
            started: Instant::now(),
            started_at: epoch_secs(),
        }
    }

    /// Seal a request and move it into the store. No-op for unknown ids.
    pub fn finalize_request(&self, id: &str, update: Finalize) {
        let memory_now = self.sampler.memory_used() as i64;
        let duration = coerce_duration(update.duration);

        let mut store = self.store();
        let Some((id, mut entry)) = self.in_flight.remove(id) else {
            drop(store);
            tracing::debug!(id = %id, "Finalize for unknown request ignored");
            return;
        };

        let snapshot = &mut entry.snapshot;
        snapshot.response_status = update.status;
        snapshot.response_duration = duration;
        if let Some(body) = update.response_body {
            snapshot.response_data = Some(self.sanitize.load().body(&body));
        }
        snapshot.memory_usage = memory_now - snapshot.memory_usage;

        let evicted = store.push(id.clone(), entry.snapshot);
        drop(store);

        if let Some(evicted) = evicted {
            metrics::record_eviction();
            tracing::debug!(id = %evicted, "Evicted oldest request");
        }
        metrics::record_finalized(status_class(update.status), duration);
        metrics::record_in_flight(self.in_flight.len());
        tracing::debug!(id = %id, status = update.status, duration_ms = duration, "Request finalized");
    }

    /// Full snapshot for `id`, in flight or stored.
    pub fn get_request(&self, id: &str) -> Option<RequestSnapshot> {
        if let Some(entry) = self.in_flight.get(id) {
            return Some(entry.snapshot.clone());
        }
        self.store().get(id).map(|s| (*s).clone())
    }

    /// Most recently stored request.
    pub fn latest(&self) -> Option<RequestSnapshot> {
        self.store().latest().map(|s| (*s).clone())
    }

    /// Up to `limit` stored requests newest-first, plus metrics.
    pub fn get_snapshot(&self, limit: usize) -> Snapshot {
        let (requests, sampled) = {
            let store = self.store();
            let requests: Vec<RequestMetadata> =
                store.get_all(limit).iter().map(|s| s.metadata()).collect();
            (requests, store.get_all(METRICS_REQUEST_LIMIT))
        };

        Snapshot {
            requests,
            metrics: self.report(&sampled),
        }
    }

    /// Metrics only.
    pub fn metrics(&self) -> MetricsReport {
        let sampled = self.store().get_all(METRICS_REQUEST_LIMIT);
        self.report(&sampled)
    }

    fn report(&self, sampled: &[Arc<RequestSnapshot>]) -> MetricsReport {
        let now = epoch_secs();
        let span = build_span(sampled.iter().map(|s| s.as_ref()), now, self.window);
        let (os, process) = self.sampler.sample();
        MetricsReport {
            spans: vec![span],
            timestamp: now,
            os,
            process,
        }
    }

    /// Drop an in-flight request without storing it.
    pub fn cancel_request(&self, id: &str) -> bool {
        let removed = self.in_flight.remove(id).is_some();
        if removed {
            metrics::record_in_flight(self.in_flight.len());
            tracing::debug!(id = %id, "In-flight request cancelled");
        }
        removed
    }

    /// Drop in-flight requests older than `ttl`. Returns how many were removed.
    pub fn sweep_stale(&self, ttl: Duration) -> usize {
        let before = self.in_flight.len();
        self.in_flight.retain(|_, entry| entry.started.elapsed() < ttl);
        let removed = before.saturating_sub(self.in_flight.len());
        if removed > 0 {
            metrics::record_swept(removed);
            metrics::record_in_flight(self.in_flight.len());
            tracing::warn!(removed, ttl_secs = ttl.as_secs(), "Swept abandoned in-flight requests");
        }
        removed
    }

    pub fn is_in_flight(&self, id: &str) -> bool {
        self.in_flight.contains_key(id)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn stored_count(&self) -> usize {
        self.store().len()
    }
}

impl Default for MonitorCore {
    fn default() -> Self {
        Self::new(&CoreConfig::default())
    }
}

/// Timeline event measured from creation until `finish` or drop.
pub struct EventTimer {
    core: Arc<MonitorCore>,
    id: String,
    event: Option<EventData>,
    started: Instant,
    started_at: f64,
}

impl EventTimer {
    pub fn description(mut self, description: impl Into<String>) -> Self {
        if let Some(event) = self.event.as_mut() {
            event.description = Some(description.into());
        }
        self
    }

    pub fn data(mut self, data: Map<String, Value>) -> Self {
        if let Some(event) = self.event.as_mut() {
            event.data = Some(data);
        }
        self
    }

    /// Record the event now.
    pub fn finish(mut self) {
        self.record();
    }

    fn record(&mut self) {
        if let Some(mut event) = self.event.take() {
            let elapsed = self.started.elapsed().as_secs_f64();
            event.start = Some(self.started_at);
            event.end = Some(self.started_at + elapsed);
            event.duration = Some(elapsed * 1000.0);
            self.core.add_event(&self.id, event);
        }
    }
}

impl Drop for EventTimer {
    fn drop(&mut self) {
        self.record();
    }
}

fn epoch_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
