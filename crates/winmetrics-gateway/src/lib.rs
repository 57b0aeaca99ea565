//! winmetrics gateway library entry.
//!
//! Wires configuration, the metric registry, HTTP and RPC instrumentation,
//! and the operational endpoints into one axum application. Consumed by the
//! binary (`main.rs`) and by integration tests.

pub mod app_state;
pub mod config;
pub mod dispatch;
pub mod instrument;
pub mod ops;
pub mod router;
pub mod services;
pub mod transport;
