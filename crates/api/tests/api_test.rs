use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use hoststat_api::{create_app, AppState};
use hoststat_core::{
    config::{ApiConfig, AppConfig, CollectorConfig, ScriptingConfig, WorkerPoolConfig},
    models::{ColumnDef, TableSchema},
};
use hoststat_dispatcher::CollectionScheduler;
use hoststat_script::ScriptEngine;
use hoststat_testing_utils::{
    FixedCounterProvider, InMemoryMetricStore, InMemoryScriptRepository, RecordingMetricSource,
    TestEnv,
};
use hoststat_worker::WorkerPool;

const CPU_SCHEMA: TableSchema = TableSchema {
    table: "cpu_metrics",
    columns: &[ColumnDef::real("usage"), ColumnDef::text("label")],
};

struct TestApp {
    app: Router,
    scheduler: Arc<CollectionScheduler>,
    cpu: RecordingMetricSource,
    pool: Arc<WorkerPool>,
}

impl TestApp {
    async fn spawn() -> Self {
        let pool = Arc::new(
            WorkerPool::start(&WorkerPoolConfig {
                pool_size: 2,
                reserved_workers: 1,
            })
            .unwrap(),
        );
        let engine = Arc::new(ScriptEngine::new(
            Arc::new(InMemoryScriptRepository::new()),
            Arc::new(InMemoryMetricStore::new()),
            Arc::new(
                FixedCounterProvider::new()
                    .with_counter("cpu/usage", 10.0)
                    .with_counter("memory/available", 512.0),
            ),
            pool.clone(),
            &ScriptingConfig::default(),
        ));
        engine.register_all().await.unwrap();

        let cpu = RecordingMetricSource::new("cpu", &CPU_SCHEMA);
        let scheduler = Arc::new(CollectionScheduler::new(
            pool.clone(),
            vec![Arc::new(cpu.clone())],
            vec![engine.clone()],
            CollectorConfig::default(),
        ));

        let state = AppState {
            engine,
            scheduler: scheduler.clone(),
            config: Arc::new(AppConfig::default()),
            hostname: "test-host".to_string(),
        };

        Self {
            app: create_app(state, &ApiConfig::default()),
            scheduler,
            cpu,
            pool,
        }
    }

    async fn request(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, json)
    }
}

fn script(name: &str, source: &str, counter: &str) -> Value {
    json!({ "name": name, "sourceText": source, "counterPath": counter })
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = TestApp::spawn().await;

    let (status, body) = app.request("GET", "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");

    app.pool.shutdown().await;
}

#[tokio::test]
async fn test_info_endpoint() {
    let app = TestApp::spawn().await;

    let (status, body) = app.request("GET", "/api/info", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["isActive"], false);
    assert_eq!(body["data"]["providerNames"], json!(["cpu"]));
    assert_eq!(body["data"]["hostname"], "test-host");
    assert_eq!(body["data"]["currentEpoch"], 0);

    app.pool.shutdown().await;
}

#[tokio::test]
async fn test_config_endpoint() {
    let app = TestApp::spawn().await;

    let (status, body) = app.request("GET", "/api/config", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["worker_pool"]["pool_size"], 2);
    assert_eq!(body["data"]["collector"]["metric_fetch_interval_ms"], 10000);

    app.pool.shutdown().await;
}

#[tokio::test]
async fn test_script_crud_round_trip() {
    let app = TestApp::spawn().await;

    let (status, body) = app
        .request(
            "POST",
            "/api/script/save",
            Some(script("doubler", "fn execute() { persist(getCounterValue() * 2.0); }", "cpu/usage")),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);

    let (status, body) = app
        .request(
            "PATCH",
            "/api/script/patch",
            Some(script("doubler", "fn execute() { persist(getCounterValue()); }", "memory/available")),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, body) = app.request("GET", "/api/script", None).await;
    assert_eq!(status, StatusCode::OK);
    let scripts = body["data"]["scripts"].as_array().unwrap();
    assert_eq!(scripts.len(), 1);
    assert_eq!(scripts[0]["name"], "doubler");
    assert_eq!(scripts[0]["counterPath"], "memory/available");
    assert_eq!(scripts[0]["sourceText"], "fn execute() { persist(getCounterValue()); }");

    let (status, _) = app.request("DELETE", "/api/script/delete/doubler", None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.request("GET", "/api/script", None).await;
    assert_eq!(body["data"]["scripts"], json!([]));

    app.pool.shutdown().await;
}

#[tokio::test]
async fn test_script_registry_errors() {
    let app = TestApp::spawn().await;
    let original = script("dup", "fn execute() { persist(1.0); }", "cpu/usage");

    let (status, _) = app.request("POST", "/api/script/save", Some(original)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .request(
            "POST",
            "/api/script/save",
            Some(script("dup", "fn execute() { persist(2.0); }", "cpu/usage")),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["type"], "SCRIPT_ALREADY_EXISTS");

    let (status, _) = app
        .request(
            "PATCH",
            "/api/script/patch",
            Some(script("missing", "fn execute() {}", "cpu/usage")),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.request("DELETE", "/api/script/delete/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .request(
            "POST",
            "/api/script/save",
            Some(script("broken", "fn execute( {", "cpu/usage")),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "SCRIPT_COMPILE_ERROR");

    let (status, _) = app
        .request(
            "POST",
            "/api/script/save",
            Some(script("bad path", "fn execute() {}", "cpu/usage")),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    app.pool.shutdown().await;
}

#[tokio::test]
async fn test_provider_endpoints() {
    let app = TestApp::spawn().await;

    app.scheduler.run_tick();
    app.scheduler.run_tick();
    let cpu = app.cpu.clone();
    assert!(TestEnv::wait_for(move || cpu.epochs().len() == 2, Duration::from_secs(5)).await);

    let (status, body) = app.request("GET", "/api/providers/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["cpu"].as_array().unwrap().len(), 1);

    let (status, _) = app.request("GET", "/api/providers/0", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .request("GET", "/api/provider/aggregate?provider=cpu&column=usage", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["count"], 2);

    let (status, _) = app
        .request("GET", "/api/provider/aggregate?provider=gpu&column=usage", None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .request("GET", "/api/provider/aggregate?provider=cpu&column=label", None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    app.pool.shutdown().await;
}
