//! Poll a `/debug/vars` snapshot and emit derived gauges.
//!
//! The snapshot is the JSON rendering of a winmetrics registry. Endpoint
//! maps listed in `exphttp` and the `exprpc` map are expanded into raw
//! values plus `avg_ns`, `queue_depth`, `success_rate` and `error_rate`;
//! the `memstats` map is passed through unchanged.

pub mod collectd;
pub mod derive;
pub mod error;
pub mod poller;

pub use collectd::{CollectdRecorder, Recorder};
pub use error::Error;
pub use poller::Poller;
