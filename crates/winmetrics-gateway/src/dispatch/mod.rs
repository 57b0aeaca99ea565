//! RPC method registry and dispatch.

pub mod dispatcher;

pub use dispatcher::{Dispatcher, RpcMethod, RpcRequest, RpcResponse, UNKNOWN_METHOD};
