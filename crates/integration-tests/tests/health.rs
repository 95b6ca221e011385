//! Health and readiness endpoints.

#![allow(clippy::unwrap_used)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use shopfleet_integration_tests::TestApp;

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_ok() {
    let app = TestApp::new();

    let (status, _) = app.send(get("/health")).await;

    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_readiness_follows_store() {
    let app = TestApp::new();

    let (status, _) = app.send(get("/health/ready")).await;
    assert_eq!(status, StatusCode::OK);

    app.store.set_unavailable(true);
    let (status, _) = app.send(get("/health/ready")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}
