//! winmetrics core: time-windowed counters, the metric registry, and the
//! error surface shared by the gateway and the poller.
//!
//! The windowed types never fail and never block on the hot path. Rotation
//! runs on a tokio task owned by each instance; everything else is plain
//! atomics.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! A metric must never take down the process it instruments.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod registry;
pub mod window;

/// Shared result type.
pub use error::{Result, WinMetricsError};
pub use registry::{Counter, Metric, Registry, StatsMap, Var};
pub use window::{Mode, WindowedAverage, WindowedCounter, DEFAULT_GRANULARITY};
