#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::routing::get as get_route;
use axum::{middleware, Router};
use serde_json::Value;
use tower::ServiceExt;

use winmetrics_core::Registry;
use winmetrics_gateway::instrument::{self, HttpStats, CLIENT_CLOSED};
use winmetrics_gateway::{app_state::AppState, config, router};

fn app() -> (AppState, Router) {
    let cfg = config::load_from_str(
        r#"
version: 1
metrics:
  windows:
    - { label: min, secs: 60 }
    - { label: hour, secs: 3600 }
"#,
    )
    .unwrap();
    let state = AppState::new(cfg).unwrap();
    let app = router::build_router(state.clone());
    (state, app)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, String) {
    let resp = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

async fn vars(app: &Router) -> BTreeMap<String, Value> {
    let (status, body) = get(app, "/debug/vars").await;
    assert_eq!(status, StatusCode::OK);
    serde_json::from_str(&body).unwrap()
}

#[tokio::test]
async fn echo_requests_are_counted_by_status() {
    let (state, app) = app();

    assert_eq!(get(&app, "/v1/echo?msg=hi").await, (StatusCode::OK, "hi".into()));
    assert_eq!(get(&app, "/v1/echo?msg=yo").await.0, StatusCode::OK);
    assert_eq!(get(&app, "/v1/echo").await.0, StatusCode::BAD_REQUEST);

    let stats = state.endpoint("echo").unwrap();
    let m = stats.stats();
    assert_eq!(m.value("requests"), Some(3));
    assert_eq!(m.value("responses"), Some(3));
    assert_eq!(m.value("responses.200"), Some(2));
    assert_eq!(m.value("responses.400"), Some(1));
    assert!(m.value("responses.200.total_ns").unwrap() >= 0);
    assert_eq!(m.value("requests_per_min"), Some(3));
    assert_eq!(m.value("responses_per_hour"), Some(3));
    assert_eq!(m.value("panics"), None);
}

#[tokio::test]
async fn faults_become_500_and_panics() {
    let (state, app) = app();

    let (status, body) = get(&app, "/v1/fault").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "server error");

    let m = state.endpoint("fault").unwrap().stats().clone();
    assert_eq!(m.value("panics"), Some(1));
    assert_eq!(m.value("responses"), Some(1));
    assert_eq!(m.value("responses.500"), Some(1));
    assert!(m.value("responses.500.total_ns").is_some());
}

#[tokio::test]
async fn debug_vars_publishes_index_and_endpoints() {
    let (_state, app) = app();
    get(&app, "/v1/echo?msg=a").await;

    let vars = vars(&app).await;
    assert_eq!(vars["exphttp"]["echo"], serde_json::json!(1));
    assert_eq!(vars["exphttp"]["fault"], serde_json::json!(1));
    assert_eq!(vars["echo"]["requests"], serde_json::json!(1));
    assert_eq!(vars["echo"]["responses.200"], serde_json::json!(1));
    assert_eq!(vars["echo"]["requests_per_min"], serde_json::json!(1));
    assert_eq!(vars["fault"]["requests_per_hour"], serde_json::json!(0));
    assert!(vars["exprpc"]["requests.per_min"].is_i64());

    // ops routes are not instrumented
    assert!(vars.get("healthz").is_none());
    assert!(vars.get("debug").is_none());
}

#[tokio::test]
async fn healthz_ok() {
    let (_state, app) = app();
    assert_eq!(get(&app, "/healthz").await, (StatusCode::OK, "ok".into()));
}

#[tokio::test]
async fn shutdown_keeps_snapshot_readable() {
    let (state, app) = app();
    get(&app, "/v1/echo?msg=a").await;
    state.shutdown();
    let vars = vars(&app).await;
    assert_eq!(vars["echo"]["requests_per_min"], serde_json::json!(1));
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn memstats_are_sampled_into_the_snapshot() {
    let (state, app) = app();

    let vars = vars(&app).await;
    let mem = vars["memstats"].as_object().unwrap();
    for key in ["rss_bytes", "rss_peak_bytes", "vm_size_bytes", "threads"] {
        assert!(mem[key].as_i64().unwrap() > 0, "{key} should be positive");
    }
    assert!(mem["vm_size_bytes"].as_i64() >= mem["rss_bytes"].as_i64());

    state.shutdown();
}

#[tokio::test]
async fn dropped_request_is_recorded_as_client_closed() {
    let reg = Registry::new();
    let stats = Arc::new(
        HttpStats::new(&reg, "slow", &[("min", Duration::from_secs(60))], 8).unwrap(),
    );
    let app: Router = Router::new()
        .route(
            "/slow",
            get_route(|| async { std::future::pending::<&'static str>().await }),
        )
        .route_layer(middleware::from_fn_with_state(stats.clone(), instrument::track));

    let req = Request::builder().uri("/slow").body(Body::empty()).unwrap();
    assert!(tokio::time::timeout(Duration::from_millis(20), app.oneshot(req))
        .await
        .is_err());

    let m = stats.stats();
    assert_eq!(m.value("requests"), Some(1));
    assert_eq!(m.value("responses"), Some(1));
    assert_eq!(m.value(&format!("responses.{CLIENT_CLOSED}")), Some(1));
    assert_eq!(m.value("responses_per_min"), Some(1));
    assert_eq!(m.value("panics"), None);
}
