// Shared fixtures for the integration tests

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceExt;

use xai_api::{build_router, AppState};
use xai_data::Dataset;
use xai_ml::ExplainerChoice;
use xai_services::{MetricsCollector, ModelRegistry, PredictorService};

pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

/// Predictor over `fixtures/players.csv` and the v2 fixture models.
pub fn create_test_predictor(choice: ExplainerChoice) -> Arc<PredictorService> {
    let dir = fixtures_dir();
    let dataset = Dataset::from_path(&dir.join("players.csv")).unwrap();
    let registry = ModelRegistry::load(&dir.join("models"), "v2", choice).unwrap();

    Arc::new(PredictorService::new(
        Arc::new(dataset),
        Arc::new(registry),
        5,
        Arc::new(MetricsCollector::new().unwrap()),
    ))
}

pub fn create_test_app() -> Router {
    build_router(AppState::new(create_test_predictor(ExplainerChoice::Auto)))
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn send_raw(app: Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, body) = send_raw(app, request).await;
    (status, serde_json::from_str(&body).unwrap())
}
