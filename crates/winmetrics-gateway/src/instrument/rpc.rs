//! RPC call instrumentation.
//!
//! Requests and responses are paired by sequence number so latency can be
//! attributed per method. Per-method rate counters are created on first use.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use winmetrics_core::{Registry, Result, StatsMap, WindowedCounter};

use super::nanos;

/// Registry map holding all RPC stats.
pub const RPC_MAP: &str = "exprpc";

/// Error recorded for a call whose future was dropped before it answered.
pub const CANCELLED: &str = "cancelled";

pub struct RpcStats {
    stats: Arc<StatsMap>,
    label: String,
    interval: Duration,
    granularity: usize,
    request_rate: Arc<WindowedCounter>,
    response_rate: Arc<WindowedCounter>,
    method_rates: DashMap<String, Arc<WindowedCounter>>,
    started: DashMap<u64, Instant>,
}

impl RpcStats {
    /// Publish the `exprpc` map with `requests.per_<label>` and
    /// `responses.per_<label>` rate counters over `interval`.
    pub fn new(
        registry: &Registry,
        label: &str,
        interval: Duration,
        granularity: usize,
    ) -> Result<Self> {
        let stats = registry.new_map(RPC_MAP)?;

        let request_rate = Arc::new(WindowedCounter::new(interval, granularity));
        let response_rate = Arc::new(WindowedCounter::new(interval, granularity));
        stats.set(format!("requests.per_{label}"), request_rate.clone());
        stats.set(format!("responses.per_{label}"), response_rate.clone());

        Ok(Self {
            stats,
            label: label.to_string(),
            interval,
            granularity,
            request_rate,
            response_rate,
            method_rates: DashMap::new(),
            started: DashMap::new(),
        })
    }

    pub fn stats(&self) -> &Arc<StatsMap> {
        &self.stats
    }

    /// Calls recorded but not yet answered.
    pub fn in_flight(&self) -> usize {
        self.started.len()
    }

    /// Record the request for call `seq` and return a guard that records
    /// its response. Dropping the guard unfinished records a [`CANCELLED`]
    /// error, so `requests - responses` never counts abandoned calls.
    pub fn begin<'a>(&'a self, seq: u64, method: &'a str) -> RpcCall<'a> {
        self.record_request(seq, method);
        RpcCall {
            stats: self,
            seq,
            method,
            finished: false,
        }
    }

    pub fn record_request(&self, seq: u64, method: &str) {
        self.request_rate.add(1);
        self.stats.add("requests", 1);
        self.stats.add(&format!("requests.{method}"), 1);
        self.method_rate(method).add(1);
        self.started.insert(seq, Instant::now());
    }

    /// Record the answer to call `seq`. Returns the measured latency, zero if
    /// the request was never recorded.
    pub fn record_response(&self, seq: u64, method: &str, error: Option<&str>) -> Duration {
        let elapsed = match self.started.remove(&seq) {
            Some((_, at)) => at.elapsed(),
            None => {
                tracing::debug!(seq, method, "response without recorded request");
                Duration::ZERO
            }
        };
        let ns = nanos(elapsed);

        self.response_rate.add(1);
        self.stats.add("responses", 1);
        self.stats.add("responses.total_ns", ns);
        self.stats.add(&format!("responses.{method}"), 1);
        self.stats.add(&format!("responses.{method}.total_ns"), ns);
        if error.is_some() {
            self.stats.add("responses.error", 1);
            self.stats.add("responses.error.total_ns", ns);
            self.stats.add(&format!("responses.{method}.error"), 1);
            self.stats.add(&format!("responses.{method}.error.total_ns"), ns);
        }

        tracing::debug!(
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            method,
            error = error.unwrap_or(""),
            "rpc response"
        );
        elapsed
    }

    fn method_rate(&self, method: &str) -> Arc<WindowedCounter> {
        if let Some(rc) = self.method_rates.get(method) {
            return Arc::clone(rc.value());
        }
        self.method_rates
            .entry(method.to_string())
            .or_insert_with(|| {
                let rc = Arc::new(WindowedCounter::new(self.interval, self.granularity));
                self.stats
                    .set(format!("requests.{method}.per_{}", self.label), rc.clone());
                rc
            })
            .value()
            .clone()
    }
}

/// An RPC call in flight. See [`RpcStats::begin`].
pub struct RpcCall<'a> {
    stats: &'a RpcStats,
    seq: u64,
    method: &'a str,
    finished: bool,
}

impl RpcCall<'_> {
    /// Record the answer; returns the measured latency.
    pub fn finish(mut self, error: Option<&str>) -> Duration {
        self.finished = true;
        self.stats.record_response(self.seq, self.method, error)
    }
}

impl Drop for RpcCall<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.stats
                .record_response(self.seq, self.method, Some(CANCELLED));
        }
    }
}
