//! Request/response instrumentation on top of the windowed counters.
//!
//! - [`http`]: per-endpoint stats map plus an axum middleware
//! - [`rpc`]: the `exprpc` map fed by the RPC dispatcher
//! - [`memstats`]: process memory gauges read from procfs
//!
//! Key layout is what pollers depend on: `requests`, `responses`,
//! `responses.<code>`, `responses.<code>.total_ns`, `requests_per_<label>`,
//! `responses_per_<label>`, `panics`.

pub mod http;
pub mod memstats;
pub mod rpc;

use std::time::Duration;

pub use http::{track, Fault, HttpCall, HttpStats, Outcome, CLIENT_CLOSED, HTTP_INDEX};
pub use memstats::MEM_MAP;
pub use rpc::{RpcCall, RpcStats, CANCELLED, RPC_MAP};

/// Elapsed time as nanoseconds for `*.total_ns` keys, saturating.
pub(crate) fn nanos(d: Duration) -> i64 {
    i64::try_from(d.as_nanos()).unwrap_or(i64::MAX)
}
