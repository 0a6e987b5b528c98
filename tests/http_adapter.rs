//! HTTP adapter tests: capture middleware and data API.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::Path;
use axum::http::header::CONTENT_LENGTH;
use axum::http::{Request, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing_subscriber::layer::SubscriberExt;

use clockwork_monitor::config::HttpConfig;
use clockwork_monitor::core::{LogLevel, LogSource, QueryData};
use clockwork_monitor::http::{HttpServer, X_CLOCKWORK_ID, X_CLOCKWORK_PATH, X_CLOCKWORK_VERSION};
use clockwork_monitor::lifecycle::Shutdown;
use clockwork_monitor::plugins::{CaptureLayer, QueryRecorder};

mod common;

fn app() -> Router {
    Router::new()
        .route("/", get(|| async { "hello" }))
        .route("/users/{id}", get(|Path(id): Path<u32>| async move { Json(json!({ "id": id })) }))
        .route("/echo", post(|Json(body): Json<Value>| async move { Json(body) }))
        .route("/health", get(|| async { "ok" }))
        .route("/boom", get(|| async { panic!("handler exploded") as () }))
        .route(
            "/session",
            get(|| async { Json(json!({ "token": "abc", "password": "pw", "blob": "x".repeat(20_000) })) }),
        )
        .route(
            "/broken",
            get(|| async {
                let chunks = futures_util::stream::iter(vec![Err::<Bytes, std::io::Error>(
                    std::io::Error::other("upstream closed"),
                )]);
                ([(CONTENT_LENGTH, "5")], Body::from_stream(chunks))
            }),
        )
}

#[tokio::test]
async fn test_request_is_captured_and_tagged() {
    let (router, clockwork) = common::attached(app(), HttpConfig::default());

    let response = common::send(
        &router,
        Request::builder()
            .uri("/users/7?tab=posts&tag=a&tag=b")
            .header("authorization", "Bearer secret")
            .header("cookie", "theme=dark; session_token=abc")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let id = response.headers()[X_CLOCKWORK_ID].to_str().unwrap().to_string();
    assert_eq!(response.headers()[X_CLOCKWORK_VERSION], "2.0");
    assert_eq!(
        response.headers()[X_CLOCKWORK_PATH].to_str().unwrap(),
        format!("/__clockwork/{id}")
    );

    let snapshot = clockwork.core().get_request(&id).unwrap();
    assert_eq!(snapshot.method, "GET");
    assert_eq!(snapshot.uri, "/users/7?tab=posts&tag=a&tag=b");
    assert_eq!(snapshot.response_status, 200);
    assert_eq!(snapshot.controller.as_deref(), Some("/users/{id}"));
    assert_eq!(snapshot.headers["authorization"], json!("[REDACTED]"));
    assert_eq!(snapshot.get_data["tab"], json!("posts"));
    assert_eq!(snapshot.get_data["tag"], json!(["a", "b"]));

    let cookies = snapshot.cookies.unwrap();
    assert_eq!(cookies["theme"], json!("dark"));
    assert_eq!(cookies["session_token"], json!("[REDACTED]"));
    assert_eq!(snapshot.response_data, Some(json!({ "id": 7 })));
}

#[tokio::test]
async fn test_json_request_body_is_sanitized() {
    let (router, clockwork) = common::attached(app(), HttpConfig::default());
    let payload = json!({ "user": "ana", "password": "hunter2" });

    let response = common::send(
        &router,
        Request::builder()
            .method("POST")
            .uri("/echo")
            .header("content-type", "application/json")
            .header("content-length", payload.to_string().len().to_string())
            .body(Body::from(payload.to_string()))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let id = response.headers()[X_CLOCKWORK_ID].to_str().unwrap().to_string();
    // the handler still receives the original body
    assert_eq!(common::json_body(response).await, payload);

    let snapshot = clockwork.core().get_request(&id).unwrap();
    let post = snapshot.post_data.unwrap();
    assert_eq!(post["user"], json!("ana"));
    assert_eq!(post["password"], json!("[REDACTED]"));
}

#[tokio::test]
async fn test_data_api_routes() {
    let (router, _clockwork) = common::attached(app(), HttpConfig::default());

    let latest = common::send(&router, common::get("/__clockwork/latest")).await;
    assert_eq!(latest.status(), StatusCode::NOT_FOUND);
    assert_eq!(common::json_body(latest).await, json!({ "error": "No requests found" }));

    let first = common::send(&router, common::get("/")).await;
    let first_id = first.headers()[X_CLOCKWORK_ID].to_str().unwrap().to_string();
    let second = common::send(&router, common::get("/users/1")).await;
    let second_id = second.headers()[X_CLOCKWORK_ID].to_str().unwrap().to_string();

    let snapshot = common::json_body(common::send(&router, common::get("/__clockwork")).await).await;
    let listed: Vec<&str> = snapshot["requests"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_str().unwrap())
        .collect();
    assert_eq!(listed, vec![second_id.as_str(), first_id.as_str()]);
    assert_eq!(snapshot["metrics"]["spans"][0]["counts"][5], json!(2));

    let latest = common::json_body(common::send(&router, common::get("/__clockwork/latest")).await).await;
    assert_eq!(latest["id"], json!(second_id));
    assert_eq!(latest["type"], json!("http"));

    let by_id = common::send(&router, common::get(&format!("/__clockwork/{first_id}"))).await;
    assert_eq!(by_id.status(), StatusCode::OK);
    assert_eq!(common::json_body(by_id).await["uri"], json!("/"));

    let metrics = common::json_body(common::send(&router, common::get("/__clockwork/metrics")).await).await;
    assert_eq!(metrics["spans"][0]["retention"], json!(6));

    let missing = common::send(&router, common::get("/__clockwork/nope")).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    assert_eq!(common::json_body(missing).await, json!({ "error": "Request not found" }));
}

#[tokio::test]
async fn test_data_api_requests_are_not_captured() {
    let (router, clockwork) = common::attached(app(), HttpConfig::default());
    common::send(&router, common::get("/__clockwork")).await;
    common::send(&router, common::get("/__clockwork/metrics")).await;
    assert_eq!(clockwork.core().stored_count(), 0);
}

#[tokio::test]
async fn test_ignored_prefix_passes_through() {
    let config = HttpConfig {
        ignore_starts_with: vec!["/health".to_string()],
        ..Default::default()
    };
    let (router, clockwork) = common::attached(app(), config);

    let response = common::send(&router, common::get("/health")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(X_CLOCKWORK_ID).is_none());
    assert_eq!(clockwork.core().stored_count(), 0);
}

#[tokio::test]
async fn test_panicking_handler_is_finalized_as_500() {
    let (router, clockwork) = common::attached(app(), HttpConfig::default());

    let response = common::send(&router, common::get("/boom")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let id = response.headers()[X_CLOCKWORK_ID].to_str().unwrap().to_string();

    let snapshot = clockwork.core().get_request(&id).unwrap();
    assert_eq!(snapshot.response_status, 500);
    let panics: Vec<_> = snapshot
        .log
        .iter()
        .filter(|entry| entry.message == "handler exploded")
        .collect();
    assert_eq!(panics.len(), 1);
    assert_eq!(panics[0].level, LogLevel::Error);
}

#[tokio::test]
async fn test_handler_panic_recorded_after_earlier_panic_entry() {
    let core = common::core();
    let clockwork = clockwork_monitor::http::Clockwork::new(Arc::clone(&core), HttpConfig::default());
    let recorder = Arc::clone(&core);
    let app = Router::new().route(
        "/retry",
        get(move || {
            let core = Arc::clone(&recorder);
            async move {
                let id = clockwork_monitor::context::current_id();
                core.capture_panic(&"worker crashed", None, id.as_deref());
                panic!("handler gave up") as ()
            }
        }),
    );
    let router = clockwork.attach(app);

    let response = common::send(&router, common::get("/retry")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let id = response.headers()[X_CLOCKWORK_ID].to_str().unwrap().to_string();

    let snapshot = core.get_request(&id).unwrap();
    let messages: Vec<&str> = snapshot.log.iter().map(|e| e.message.as_str()).collect();
    assert_eq!(messages, vec!["worker crashed", "handler gave up"]);
}

#[tokio::test]
async fn test_reload_moves_data_api() {
    let (router, clockwork) = common::attached(app(), HttpConfig::default());
    clockwork.reload(HttpConfig {
        path: "/debug".to_string(),
        ..Default::default()
    });

    let response = common::send(&router, common::get("/debug/metrics")).await;
    assert_eq!(response.status(), StatusCode::OK);

    let old = common::send(&router, common::get("/__clockwork/metrics")).await;
    // the old path is now an ordinary, captured request
    assert_eq!(old.status(), StatusCode::NOT_FOUND);
    assert!(old.headers().get(X_CLOCKWORK_ID).is_some());
}

#[tokio::test]
async fn test_reload_applies_to_response_bodies() {
    let (router, clockwork) = common::attached(app(), HttpConfig::default());
    clockwork.reload(HttpConfig {
        redact_keys: vec!["password".to_string()],
        max_body_size: 100_000,
        ..Default::default()
    });

    let response = common::send(&router, common::get("/session")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let id = response.headers()[X_CLOCKWORK_ID].to_str().unwrap().to_string();

    let body = clockwork.core().get_request(&id).unwrap().response_data.unwrap();
    assert_eq!(body["token"], json!("abc"));
    assert_eq!(body["password"], json!("[REDACTED]"));
    assert_eq!(body["blob"].as_str().unwrap().len(), 20_000);
}

#[tokio::test]
async fn test_unreadable_response_body_becomes_500() {
    let (router, clockwork) = common::attached(app(), HttpConfig::default());

    let response = common::send(&router, common::get("/broken")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let id = response.headers()[X_CLOCKWORK_ID].to_str().unwrap().to_string();
    assert!(response.headers().get(CONTENT_LENGTH).map_or(true, |len| len != "5"));

    let snapshot = clockwork.core().get_request(&id).unwrap();
    assert_eq!(snapshot.response_status, 500);
    assert!(snapshot.response_data.is_none());
}

#[tokio::test]
async fn test_handler_logs_and_queries_are_attached() {
    let core = common::core();
    let clockwork = clockwork_monitor::http::Clockwork::new(Arc::clone(&core), HttpConfig::default());
    let recorder = QueryRecorder::new(Arc::clone(&core)).with_connection("primary");

    let app = Router::new().route(
        "/work",
        get(move || {
            let recorder = recorder.clone();
            async move {
                tracing::info!(step = 1, "starting work");
                let rows = recorder
                    .time("SELECT * FROM jobs", None, async {
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        3
                    })
                    .await;
                recorder.record(QueryData::new("COMMIT"));
                tracing::warn!(rows, "work done");
                "done"
            }
        }),
    );
    let router = clockwork.attach(app);

    let subscriber = tracing_subscriber::registry().with(CaptureLayer::new(Arc::clone(&core)));
    let _guard = tracing::subscriber::set_default(subscriber);

    let response = common::send(&router, common::get("/work")).await;
    let id = response.headers()[X_CLOCKWORK_ID].to_str().unwrap().to_string();
    tracing::info!("outside any request");

    let snapshot = core.get_request(&id).unwrap();
    let ours: Vec<_> = snapshot
        .log
        .iter()
        .filter(|e| e.context.as_ref().is_some_and(|c| c.get("target") == Some(&json!("http_adapter"))))
        .collect();
    let messages: Vec<&str> = ours.iter().map(|e| e.message.as_str()).collect();
    assert_eq!(messages, vec!["starting work", "work done"]);
    assert!(ours.iter().all(|e| e.source == LogSource::Native));
    assert_eq!(ours[1].level, LogLevel::Warning);
    assert_eq!(ours[1].context.as_ref().unwrap()["rows"], json!(3));

    let queries: Vec<&str> = snapshot.database_queries.iter().map(|q| q.query.as_str()).collect();
    assert_eq!(queries, vec!["SELECT * FROM jobs", "COMMIT"]);
    assert_eq!(snapshot.database_queries[0].connection.as_deref(), Some("primary"));
}

#[tokio::test]
async fn test_server_round_trip() {
    let (router, clockwork) = common::attached(app(), HttpConfig::default());
    drop(router);

    let server = HttpServer::new(app(), &clockwork);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));

    let client = reqwest::Client::new();
    let response = client.get(format!("http://{addr}/")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    let id = response.headers()["x-clockwork-id"].to_str().unwrap().to_string();

    let stored: Value = client
        .get(format!("http://{addr}/__clockwork/{id}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stored["responseStatus"], json!(200));
    assert_eq!(stored["responseData"], json!("hello"));

    drop(client);
    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}
