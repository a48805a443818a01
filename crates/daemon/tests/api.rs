//! HTTP-level tests driving the router in-process.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use gramseva_daemon::http::{router, AppState};
use gramseva_daemon::leak_store::LeakStore;
use gramseva_daemon::prediction::{PredictionManager, PredictionSettings};
use gramseva_daemon::realtime::Broadcaster;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

async fn dead_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

async fn test_app() -> (Router, TempDir) {
    test_app_with_runtime("python3").await
}

async fn test_app_with_runtime(runtime: &str) -> (Router, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let settings = PredictionSettings {
        base_url: dead_url().await,
        runtime: runtime.into(),
        script: PathBuf::from("ml/app.py"),
        workdir: None,
        packages: vec![],
        probe_timeout: Duration::from_millis(500),
        settle_delay: Duration::from_millis(10),
        settle_probe_timeout: Duration::from_millis(500),
        predict_timeout: Duration::from_secs(2),
    };
    let state = AppState {
        leaks: Arc::new(LeakStore::new(dir.path().join("leak_reports.txt"))),
        prediction: Arc::new(PredictionManager::new(settings)),
        realtime: Arc::new(Broadcaster::new(Duration::from_secs(60), 16)),
    };
    (router(state), dir)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            req = req.header(header::CONTENT_TYPE, "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let resp = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn submit_then_list_leak() {
    let (app, _dir) = test_app().await;

    let (status, created) = send(
        &app,
        Method::POST,
        "/api/water/leaks",
        Some(json!({"location": "Main St", "description": "pipe burst"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "pending");
    let id = created["id"].as_str().unwrap().to_string();
    assert!(!id.is_empty());

    let (status, listed) = send(&app, Method::GET, "/api/water/leaks", None).await;
    assert_eq!(status, StatusCode::OK);
    let found = listed
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["id"] == id.as_str())
        .expect("created report listed");
    assert_eq!(found["location"], "Main St");
    assert_eq!(found["description"], "pipe burst");
}

#[tokio::test]
async fn leak_fields_default_to_empty() {
    let (app, _dir) = test_app().await;
    let (status, created) = send(&app, Method::POST, "/api/water/leaks", Some(json!({}))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["location"], "");
    assert_eq!(created["description"], "");
}

#[tokio::test]
async fn empty_store_lists_nothing() {
    let (app, _dir) = test_app().await;
    let (status, listed) = send(&app, Method::GET, "/api/water/leaks", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed, json!([]));
}

#[tokio::test]
async fn predict_without_service_is_503() {
    let (app, _dir) = test_app().await;
    let (status, body) = send(&app, Method::POST, "/api/health/predict", Some(json!({}))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, json!({"error": "Prediction service is not ready"}));
}

#[tokio::test]
async fn prediction_status_reports_not_ready() {
    let (app, _dir) = test_app().await;
    let (status, body) = send(&app, Method::GET, "/api/health/prediction-status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "not_ready"}));

    let (_, supervisor) = send(&app, Method::GET, "/api/health/prediction-server", None).await;
    assert_eq!(supervisor["state"], "absent");
}

#[tokio::test]
async fn malformed_facility_query_is_500() {
    let (app, _dir) = test_app().await;
    let (status, body) =
        send(&app, Method::GET, "/api/health/facilities?lat=abc&lng=20", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let details = body["details"].as_str().unwrap().to_lowercase();
    assert!(details.contains("invalid coordinate format"));
}

#[tokio::test]
async fn facility_coordinates_must_be_paired_and_in_range() {
    let (app, _dir) = test_app().await;
    for uri in [
        "/api/health/facilities?lat=21.1",
        "/api/health/facilities?lng=79.0",
        "/api/health/facilities?lat=21.1&lng=200",
        "/api/health/facilities?lat=-91&lng=79.0",
    ] {
        let (status, body) = send(&app, Method::GET, uri, None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{uri}");
        assert_eq!(body["error"], "Failed to fetch health facilities", "{uri}");
    }
}

#[tokio::test]
async fn facility_query_with_coordinates() {
    let (app, _dir) = test_app().await;
    let (status, body) = send(
        &app,
        Method::GET,
        "/api/health/facilities?location=Rampur&lat=21.1&lng=79.0",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn start_server_reports_missing_runtime() {
    let (app, _dir) = test_app_with_runtime("definitely-not-python-gramseva").await;
    let (status, body) = send(&app, Method::GET, "/api/start-prediction-server", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let error = body["error"].as_str().unwrap();
    assert!(error.contains("definitely-not-python-gramseva"), "{error}");
    assert!(error.contains("is not installed"), "{error}");
    assert!(body["details"].is_string());

    let (_, supervisor) = send(&app, Method::GET, "/api/health/prediction-server", None).await;
    assert_eq!(supervisor["state"], "failed");
}

#[tokio::test]
async fn symptom_check_requires_array() {
    let (app, _dir) = test_app().await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/health/symptom-check",
        Some(json!({"symptoms": "fever"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Symptoms must be an array");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/health/symptom-check",
        Some(json!({"symptoms": ["fever", "cough"]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["symptoms"], json!(["fever", "cough"]));
}

#[tokio::test]
async fn mock_endpoints_answer_json() {
    let (app, _dir) = test_app().await;
    for uri in [
        "/api/water/quality",
        "/api/water/quality/trends",
        "/api/water/stats",
        "/api/water/purification-guides",
        "/api/farmer/weather",
        "/api/farmer/crop-prices",
        "/api/health/stats",
        "/api/health/advisories",
        "/api/education/schools",
        "/api/climate/forecast",
        "/api/jobs/listings",
        "/api/gender/stats",
    ] {
        let (status, body) = send(&app, Method::GET, uri, None).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert!(!body.is_null(), "{uri}");
    }
}

#[tokio::test]
async fn unknown_route_is_json_404() {
    let (app, _dir) = test_app().await;
    let (status, body) = send(&app, Method::GET, "/api/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not found");
}
