//! Clockwork demo server.
//!
//! Serves a small app with request capture attached, so the data API under
//! `/__clockwork` has something to show.
//!
//! ```text
//! clockwork-monitor [config.toml]
//!
//!   GET  /             hello, one log line
//!   GET  /users/{id}   simulated query + timeline event
//!   GET  /report       work fanned out to child tasks
//!   POST /echo         echoes the JSON body
//!   GET  /panic        panics inside the handler
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use clockwork_monitor::config::{load_config, ClockworkConfig, ConfigWatcher};
use clockwork_monitor::context;
use clockwork_monitor::core::{MonitorCore, QueryData};
use clockwork_monitor::http::{Clockwork, HttpServer};
use clockwork_monitor::lifecycle::{spawn_sweeper, Shutdown};
use clockwork_monitor::observability::{logging, metrics};
use clockwork_monitor::plugins::{self, QueryRecorder};

#[derive(Clone)]
struct DemoState {
    core: Arc<MonitorCore>,
    queries: QueryRecorder,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = match &config_path {
        Some(path) => load_config(path)?,
        None => ClockworkConfig::default(),
    };

    let core = Arc::new(MonitorCore::new(&config.core));

    logging::init_logging(&config.observability, Arc::clone(&core));
    tracing::info!("clockwork-monitor v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_requests = config.core.max_requests,
        path = %config.http.base_path(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let _plugins = plugins::install_plugins(&core, &plugins::default_plugins());

    let clockwork = Clockwork::new(Arc::clone(&core), config.http.clone());
    let _watcher = match &config_path {
        Some(path) => match ConfigWatcher::start(path, config.clone()) {
            Ok((watcher, updates)) => {
                clockwork.spawn_reloader(updates);
                Some(watcher)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Config hot reload unavailable");
                None
            }
        },
        None => None,
    };

    let shutdown = Shutdown::new();
    let sweeper = (config.core.in_flight_ttl_secs > 0).then(|| {
        spawn_sweeper(
            Arc::clone(&core),
            Duration::from_secs(config.core.sweep_interval_secs),
            Duration::from_secs(config.core.in_flight_ttl_secs),
            shutdown.subscribe(),
        )
    });
    tokio::spawn(shutdown.clone().trigger_on_ctrl_c());

    let state = DemoState {
        queries: QueryRecorder::new(Arc::clone(&core)).with_connection("demo"),
        core,
    };
    let server = HttpServer::new(demo_app(state), &clockwork);

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    server.run(listener, shutdown.subscribe()).await?;

    if let Some(sweeper) = sweeper {
        let _ = sweeper.await;
    }
    tracing::info!("Shutdown complete");
    Ok(())
}

fn demo_app(state: DemoState) -> Router {
    Router::new()
        .route("/", get(hello))
        .route("/users/{id}", get(show_user))
        .route("/report", get(report))
        .route("/echo", post(echo))
        .route("/panic", get(explode))
        .with_state(state)
}

async fn hello() -> Json<Value> {
    tracing::info!("Saying hello");
    Json(json!({ "message": "hello" }))
}

async fn show_user(State(state): State<DemoState>, Path(id): Path<u64>) -> Json<Value> {
    let timer = context::current_id().map(|request| {
        state
            .core
            .start_event(&request, "load user")
            .description(format!("user {id}"))
    });

    let name = state
        .queries
        .time(
            "SELECT name FROM users WHERE id = ?",
            Some(vec![json!(id)]),
            async {
                tokio::time::sleep(Duration::from_millis(15)).await;
                format!("user-{id}")
            },
        )
        .await;

    if let Some(timer) = timer {
        timer.finish();
    }
    tracing::debug!(user = id, "User loaded");
    Json(json!({ "id": id, "name": name }))
}

async fn report(State(state): State<DemoState>) -> Json<Value> {
    let parts = (0..3u64).map(|part| {
        let queries = state.queries.clone();
        context::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5 * (3 - part))).await;
            queries.record(QueryData::new(format!("SELECT * FROM report_part_{part}")).with_duration(1.0));
            tracing::info!(part, "Report part ready");
            part
        })
    });

    let mut done = Vec::new();
    for handle in parts.collect::<Vec<_>>() {
        if let Ok(part) = handle.await {
            done.push(part);
        }
    }
    Json(json!({ "parts": done }))
}

async fn echo(Json(body): Json<Value>) -> Json<Value> {
    tracing::info!("Echoing body");
    Json(body)
}

async fn explode() -> &'static str {
    tracing::warn!("About to panic");
    panic!("demo panic");
}
