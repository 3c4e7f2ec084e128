//! Integration tests for the monitor API endpoints

#[path = "../src/api.rs"]
#[allow(dead_code)]
mod api;

use api::AppState;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::Utc;
use monitor_lib::{health::components, HealthRegistry, MonitorMetrics};
use std::sync::Arc;
use tower::ServiceExt;

async fn setup_test_app() -> (Router, Arc<AppState>) {
    let health_registry = HealthRegistry::with_monitor_components().await;
    let metrics = MonitorMetrics::new();
    let state = Arc::new(AppState::new(health_registry, metrics));
    let router = api::create_router(state.clone());

    (router, state)
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_healthz_returns_ok_when_healthy() {
    let (app, _state) = setup_test_app().await;

    let (status, health) = get_json(app, "/healthz").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["incident_open"], false);
    assert!(health.get("last_poll").is_none());
}

#[tokio::test]
async fn test_healthz_returns_ok_when_degraded() {
    let (app, state) = setup_test_app().await;

    state
        .health_registry
        .set_degraded(components::NOTIFIER, "SMTP relay refused connection")
        .await;

    let (status, health) = get_json(app, "/healthz").await;

    // Degraded still returns 200 (operational)
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "degraded");
    assert_eq!(
        health["components"]["notifier"]["message"],
        "SMTP relay refused connection"
    );
}

#[tokio::test]
async fn test_healthz_returns_503_when_unhealthy() {
    let (app, state) = setup_test_app().await;

    state
        .health_registry
        .set_unhealthy(components::SAMPLER, "Mount point / not found")
        .await;

    let (status, health) = get_json(app, "/healthz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(health["status"], "unhealthy");
}

#[tokio::test]
async fn test_healthz_reports_open_incident() {
    let (app, state) = setup_test_app().await;

    state.health_registry.record_poll(Utc::now(), true).await;

    let (_, health) = get_json(app, "/healthz").await;

    assert_eq!(health["incident_open"], true);
    assert!(health["last_poll"].is_string());
}

#[tokio::test]
async fn test_readyz_returns_503_before_first_poll() {
    let (app, _state) = setup_test_app().await;

    let (status, readiness) = get_json(app, "/readyz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(readiness["ready"], false);
    assert!(readiness["reason"].is_string());
}

#[tokio::test]
async fn test_readyz_returns_ok_after_poll() {
    let (app, state) = setup_test_app().await;

    state.health_registry.record_poll(Utc::now(), false).await;

    let (status, readiness) = get_json(app, "/readyz").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(readiness["ready"], true);
}

#[tokio::test]
async fn test_readyz_returns_503_when_polled_but_unhealthy() {
    let (app, state) = setup_test_app().await;

    state.health_registry.record_poll(Utc::now(), false).await;
    state
        .health_registry
        .set_unhealthy(components::SAMPLER, "Failed")
        .await;

    let (status, _) = get_json(app, "/readyz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_metrics_endpoint_returns_prometheus_format() {
    let (app, state) = setup_test_app().await;

    state.metrics.observe_sample_latency(1.01);
    state.metrics.inc_polls();
    state.metrics.set_incident_open(true);

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("text/plain"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let metrics_text = String::from_utf8(body.to_vec()).unwrap();

    assert!(metrics_text.contains("spike_monitor_polls_total"));
    assert!(metrics_text.contains("spike_monitor_incident_open"));
    assert!(metrics_text.contains("spike_monitor_sample_latency_seconds_bucket"));
    assert!(metrics_text.contains("spike_monitor_sample_latency_seconds_count"));
}
