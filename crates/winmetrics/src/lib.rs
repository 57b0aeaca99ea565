//! Top-level facade crate for winmetrics.
//!
//! Re-exports the windowed counters, the gateway instrumentation, and the
//! poller so users can depend on a single crate.

pub mod core {
    pub use winmetrics_core::*;
}

pub mod gateway {
    pub use winmetrics_gateway::*;
}

pub mod poller {
    pub use winmetrics_poller::*;
}
