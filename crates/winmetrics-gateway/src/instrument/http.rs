//! HTTP endpoint instrumentation.
//!
//! Each instrumented endpoint owns a [`StatsMap`] published under its name,
//! and is listed in the `exphttp` index map so pollers can discover it.
//! Handlers report unhandled failures by returning [`Fault`]; the middleware
//! turns that into a 500 and a `panics` count.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use winmetrics_core::{Registry, Result, StatsMap, WindowedCounter};

use super::nanos;

/// Registry map listing every instrumented endpoint (`name -> 1`).
pub const HTTP_INDEX: &str = "exphttp";

/// An unhandled handler failure, returned instead of panicking.
#[derive(Debug, Clone)]
pub struct Fault(pub String);

impl Fault {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

impl IntoResponse for Fault {
    fn into_response(self) -> Response {
        let mut resp = (StatusCode::INTERNAL_SERVER_ERROR, "server error").into_response();
        resp.extensions_mut().insert(self);
        resp
    }
}

/// Status recorded for requests dropped before the handler answered
/// (client closed the connection).
pub const CLIENT_CLOSED: u16 = 499;

/// How a request finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Status(StatusCode),
    Fault(String),
    /// The request future was dropped before a response existed.
    Cancelled,
}

impl Outcome {
    /// Status code recorded for this outcome; faults count as 500.
    pub fn code(&self) -> u16 {
        match self {
            Outcome::Status(s) => s.as_u16(),
            Outcome::Fault(_) => StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            Outcome::Cancelled => CLIENT_CLOSED,
        }
    }

    fn from_response(resp: &Response) -> Self {
        match resp.extensions().get::<Fault>() {
            Some(f) => Outcome::Fault(f.0.clone()),
            None => Outcome::Status(resp.status()),
        }
    }
}

pub struct HttpStats {
    name: String,
    stats: Arc<StatsMap>,
    request_rates: Vec<Arc<WindowedCounter>>,
    response_rates: Vec<Arc<WindowedCounter>>,
}

impl HttpStats {
    /// Publish stats for endpoint `name` with one request/response rate
    /// counter pair per `(label, interval)` window.
    pub fn new(
        registry: &Registry,
        name: &str,
        windows: &[(&str, Duration)],
        granularity: usize,
    ) -> Result<Self> {
        let stats = registry.new_map(name)?;

        let mut request_rates = Vec::with_capacity(windows.len());
        let mut response_rates = Vec::with_capacity(windows.len());
        for (label, interval) in windows {
            let req = Arc::new(WindowedCounter::new(*interval, granularity));
            let resp = Arc::new(WindowedCounter::new(*interval, granularity));
            stats.set(format!("requests_per_{label}"), req.clone());
            stats.set(format!("responses_per_{label}"), resp.clone());
            request_rates.push(req);
            response_rates.push(resp);
        }

        registry.map_or_create(HTTP_INDEX)?.add(name, 1);
        tracing::debug!(endpoint = name, windows = windows.len(), "http stats published");

        Ok(Self {
            name: name.to_string(),
            stats,
            request_rates,
            response_rates,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stats(&self) -> &Arc<StatsMap> {
        &self.stats
    }

    /// Record a request and return a guard that records its response.
    /// Dropping the guard unfinished records [`Outcome::Cancelled`].
    pub fn begin(&self) -> HttpCall<'_> {
        self.record_request();
        HttpCall {
            stats: self,
            start: Instant::now(),
            finished: false,
        }
    }

    pub fn record_request(&self) {
        self.stats.add("requests", 1);
        for rc in &self.request_rates {
            rc.add(1);
        }
    }

    pub fn record_response(&self, outcome: &Outcome, elapsed: Duration) {
        let ns = nanos(elapsed);

        self.stats.add("responses", 1);
        for rc in &self.response_rates {
            rc.add(1);
        }
        if let Outcome::Fault(_) = outcome {
            self.stats.add("panics", 1);
        }

        let code = outcome.code();
        self.stats.add(&format!("responses.{code}"), 1);
        self.stats.add(&format!("responses.{code}.total_ns"), ns);
    }
}

/// Middleware recording every request routed through it into `stats`.
///
/// ```ignore
/// get(handler).route_layer(middleware::from_fn_with_state(stats, track))
/// ```
pub async fn track(State(stats): State<Arc<HttpStats>>, req: Request, next: Next) -> Response {
    let uri = req.uri().clone();
    let call = stats.begin();
    let resp = next.run(req).await;

    let outcome = Outcome::from_response(&resp);
    let elapsed = call.finish(&outcome);
    match &outcome {
        Outcome::Fault(msg) => {
            tracing::error!(endpoint = %stats.name(), %uri, fault = %msg, "handler fault")
        }
        Outcome::Status(_) | Outcome::Cancelled => tracing::info!(
            endpoint = %stats.name(),
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            code = outcome.code(),
            %uri,
            "response"
        ),
    }

    resp
}

/// A request in flight. See [`HttpStats::begin`].
pub struct HttpCall<'a> {
    stats: &'a HttpStats,
    start: Instant,
    finished: bool,
}

impl HttpCall<'_> {
    /// Record the response; returns the measured latency.
    pub fn finish(mut self, outcome: &Outcome) -> Duration {
        self.finished = true;
        let elapsed = self.start.elapsed();
        self.stats.record_response(outcome, elapsed);
        elapsed
    }
}

impl Drop for HttpCall<'_> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::info!(endpoint = %self.stats.name(), "request cancelled");
            self.stats
                .record_response(&Outcome::Cancelled, self.start.elapsed());
        }
    }
}
