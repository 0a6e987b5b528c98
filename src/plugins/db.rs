//! Database query instrumentation.
//!
//! Drivers differ too much to patch generically, so instrumentation wraps the
//! call site instead: `QueryRecorder::time` measures a query future and
//! attaches it to whichever request is awaiting it.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;

use crate::context;
use crate::core::{MonitorCore, QueryData};

/// Records queries against the ambient request.
#[derive(Clone)]
pub struct QueryRecorder {
    core: Arc<MonitorCore>,
    connection: Option<String>,
}

impl QueryRecorder {
    pub fn new(core: Arc<MonitorCore>) -> Self {
        Self {
            core,
            connection: None,
        }
    }

    /// Label attached to every recorded query (e.g. "primary", "replica").
    pub fn with_connection(mut self, connection: impl Into<String>) -> Self {
        self.connection = Some(connection.into());
        self
    }

    /// Attach an already-measured query. Returns false outside a request.
    pub fn record(&self, mut query: QueryData) -> bool {
        let Some(id) = context::current() else {
            return false;
        };
        if query.connection.is_none() {
            query.connection = self.connection.clone();
        }
        self.core.add_query(&id, query);
        true
    }

    /// Await `fut` and record `sql` with its elapsed time.
    ///
    /// The request id is read when the query completes, so a query future
    /// moved to a detached task is not attributed.
    pub async fn time<F, T>(&self, sql: impl Into<String>, bindings: Option<Vec<Value>>, fut: F) -> T
    where
        F: Future<Output = T>,
    {
        let sql = sql.into();
        let started = Instant::now();
        let output = fut.await;

        let mut query = QueryData::new(sql).with_duration(started.elapsed().as_secs_f64() * 1000.0);
        query.bindings = bindings;
        self.record(query);
        output
    }
}
