//! Transport adapters (HTTP -> dispatcher).

pub mod rpc;
