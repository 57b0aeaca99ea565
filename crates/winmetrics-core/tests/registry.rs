#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use winmetrics_core::{Counter, Mode, Registry, Var, WindowedAverage, WindowedCounter};

#[test]
fn duplicate_names_are_rejected() {
    let reg = Registry::new();
    reg.new_map("api").unwrap();
    let err = reg.new_map("api").err().expect("must fail");
    assert_eq!(err.code().as_str(), "ALREADY_REGISTERED");

    let err = reg
        .publish_metric("api", Arc::new(Counter::default()))
        .expect_err("must fail");
    assert_eq!(err.code().as_str(), "ALREADY_REGISTERED");
}

#[test]
fn map_or_create_reuses_existing_map() {
    let reg = Registry::new();
    let a = reg.map_or_create("exphttp").unwrap();
    a.add("api", 1);
    let b = reg.map_or_create("exphttp").unwrap();
    assert_eq!(b.value("api"), Some(1));

    reg.publish_metric("uptime", Arc::new(Counter::new(1))).unwrap();
    assert!(reg.map_or_create("uptime").is_err());
}

#[test]
fn snapshot_is_numeric_json() {
    let reg = Registry::new();
    let stats = reg.new_map("api").unwrap();
    stats.add("requests", 3);
    stats.add("responses", 2);
    stats.add("responses.200.total_ns", 1_500_000);
    let avg = Arc::new(WindowedAverage::cumulative());
    avg.add(4);
    avg.add(8);
    stats.set("latency_avg", avg);
    reg.publish_metric("started", Arc::new(Counter::new(-1))).unwrap();

    let json = reg.to_json();
    let parsed: BTreeMap<String, serde_json::Value> = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed["started"], serde_json::json!(-1));
    let api = &parsed["api"];
    assert_eq!(api["requests"], serde_json::json!(3));
    assert_eq!(api["responses"], serde_json::json!(2));
    assert_eq!(api["responses.200.total_ns"], serde_json::json!(1_500_000));
    assert_eq!(api["latency_avg"], serde_json::json!(6));

    // keys come out sorted
    assert!(json.find("\"api\"").unwrap() < json.find("\"started\"").unwrap());
}

#[tokio::test]
async fn remove_unpublishes_and_reports_missing() {
    let reg = Registry::new();
    let stats = reg.new_map("api").unwrap();
    let rate = Arc::new(WindowedCounter::windowed(Duration::from_secs(60)));
    stats.set("requests_per_min", rate.clone());

    reg.remove("api").unwrap();
    assert!(reg.get("api").is_none());
    assert!(reg.names().is_empty());

    let err = reg.remove("api").expect_err("already gone");
    assert_eq!(err.code().as_str(), "NOT_FOUND");

    // the name is free again
    reg.new_map("api").unwrap();
}

#[tokio::test]
async fn close_keeps_values_readable() {
    let reg = Registry::new();
    let rate = Arc::new(WindowedCounter::windowed(Duration::from_secs(60)));
    assert!(matches!(rate.mode(), Mode::Windowed { .. }));
    reg.publish("rate", Var::Metric(rate.clone())).unwrap();
    rate.add(2);

    reg.close();
    rate.add(1);
    assert_eq!(reg.to_json(), r#"{"rate":3}"#);
}

#[test]
fn names_are_sorted() {
    let reg = Registry::new();
    reg.new_map("rpc").unwrap();
    reg.new_map("api").unwrap();
    reg.publish_metric("memo", Arc::new(Counter::default())).unwrap();
    assert_eq!(reg.names(), vec!["api", "memo", "rpc"]);
    assert!(reg.map("memo").is_none());
    assert!(reg.map("api").is_some());
}
