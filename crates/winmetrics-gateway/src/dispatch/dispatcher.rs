use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::Value;

use winmetrics_core::error::{Result, WinMetricsError};

use crate::instrument::RpcStats;

/// Metric label used for calls to methods that are not registered, so
/// arbitrary client input cannot mint new metric keys.
pub const UNKNOWN_METHOD: &str = "unknown";

/// One RPC method, e.g. `Arith.Multiply`.
#[async_trait]
pub trait RpcMethod: Send + Sync {
    fn name(&self) -> &'static str;
    async fn call(&self, params: Option<&RawValue>) -> Result<Value>;
}

/// Inbound call. `id` is echoed back; it is not used for latency pairing.
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    pub id: u64,
    pub method: String,
    #[serde(default)]
    pub params: Option<Box<RawValue>>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct RpcResponse {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Stable error code, e.g. `NOT_FOUND`; set together with `error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Method registry. Every call is recorded into [`RpcStats`].
pub struct Dispatcher {
    methods: DashMap<&'static str, Arc<dyn RpcMethod>>,
    stats: Arc<RpcStats>,
    seq: AtomicU64,
}

impl Dispatcher {
    pub fn new(stats: Arc<RpcStats>) -> Self {
        Self {
            methods: DashMap::new(),
            stats,
            seq: AtomicU64::new(1),
        }
    }

    pub fn register(&self, method: Arc<dyn RpcMethod>) {
        self.methods.insert(method.name(), method);
    }

    pub fn registered_methods(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.methods.iter().map(|e| *e.key()).collect();
        names.sort_unstable();
        names
    }

    pub fn stats(&self) -> &Arc<RpcStats> {
        &self.stats
    }

    /// Run one call. Failures become an `error` field; this never fails.
    pub async fn dispatch(&self, req: RpcRequest) -> RpcResponse {
        // sequence numbers are ours so concurrent clients never collide
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);

        let handler = self.methods.get(req.method.as_str()).map(|e| e.value().clone());
        let label = match &handler {
            Some(h) => h.name(),
            None => UNKNOWN_METHOD,
        };

        let call = self.stats.begin(seq, label);
        let result = match handler {
            Some(h) => h.call(req.params.as_deref()).await,
            None => Err(WinMetricsError::NotFound(format!("unknown method: {}", req.method))),
        };

        let resp = match result {
            Ok(value) => RpcResponse {
                id: req.id,
                result: Some(value),
                error: None,
                code: None,
            },
            Err(e) => RpcResponse {
                id: req.id,
                result: None,
                error: Some(e.to_string()),
                code: Some(e.code().as_str().to_string()),
            },
        };
        call.finish(resp.error.as_deref());
        resp
    }
}
