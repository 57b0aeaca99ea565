//! Built-in endpoints and RPC methods served by the gateway.

pub mod arith;
pub mod echo;

pub use arith::ArithMultiply;
pub use echo::{echo, fault};

/// Instrumented HTTP endpoint names (also their stats map names).
pub const ECHO: &str = "echo";
pub const FAULT: &str = "fault";
