//! Gauges derived from one stats map.
//!
//! Every function here is pure so pollers other than `getstats` can reuse
//! the arithmetic. A zero denominator yields `0` rather than NaN/inf, which
//! collectd would reject.

use std::collections::BTreeMap;

/// Decoded stats map: key to value.
pub type Stats = BTreeMap<String, f64>;

const TOTAL_NS: &str = ".total_ns";

fn ratio(n: f64, d: f64) -> f64 {
    if d == 0.0 {
        0.0
    } else {
        n / d
    }
}

fn get(stats: &Stats, key: &str) -> f64 {
    stats.get(key).copied().unwrap_or(0.0)
}

/// Raw entries in key order, each `<prefix>.total_ns` followed by
/// `<prefix>.avg_ns = total_ns / <prefix>`.
pub fn with_averages(stats: &Stats) -> Vec<(String, f64)> {
    let mut out = Vec::with_capacity(stats.len() * 2);
    for (key, &value) in stats {
        out.push((key.clone(), value));
        if let Some(prefix) = key.strip_suffix(TOTAL_NS) {
            out.push((format!("{prefix}.avg_ns"), ratio(value, get(stats, prefix))));
        }
    }
    out
}

/// `requests - responses`.
pub fn queue_depth(stats: &Stats) -> f64 {
    get(stats, "requests") - get(stats, "responses")
}

/// HTTP endpoint map: averages, queue depth, and 200-based success/error
/// percentages.
pub fn http_endpoint(stats: &Stats) -> Vec<(String, f64)> {
    let requests = get(stats, "requests");
    let ok = get(stats, "responses.200");

    let mut out = with_averages(stats);
    out.push(("queue_depth".into(), queue_depth(stats)));
    out.push(("success_rate".into(), ratio(ok * 100.0, requests)));
    out.push((
        "error_rate".into(),
        ratio((get(stats, "responses") - ok) * 100.0, requests),
    ));
    out
}

/// RPC map: averages, queue depth, and `responses.error`-based percentages.
pub fn rpc(stats: &Stats) -> Vec<(String, f64)> {
    let requests = get(stats, "requests");
    let errors = get(stats, "responses.error");

    let mut out = with_averages(stats);
    out.push(("queue_depth".into(), queue_depth(stats)));
    out.push(("error_rate".into(), ratio(errors * 100.0, requests)));
    out.push((
        "success_rate".into(),
        ratio((get(stats, "responses") - errors) * 100.0, requests),
    ));
    out
}
