//! Shared application state for the winmetrics gateway.
//!
//! Owns the metric registry handle; everything that publishes metrics gets
//! it from here, and `shutdown` tears it down.

use std::collections::HashMap;
use std::sync::Arc;

use winmetrics_core::error::Result;
use winmetrics_core::Registry;

use crate::config::GatewayConfig;
use crate::dispatch::Dispatcher;
use crate::instrument::{memstats, HttpStats, RpcStats};
use crate::services::{self, ArithMultiply};

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
    dispatcher: Arc<Dispatcher>,
}

struct AppStateInner {
    cfg: GatewayConfig,
    registry: Arc<Registry>,
    endpoints: HashMap<&'static str, Arc<HttpStats>>,
}

impl AppState {
    /// Build application state and publish all gateway metrics.
    pub fn new(cfg: GatewayConfig) -> Result<Self> {
        let registry = Arc::new(Registry::new());
        let granularity = cfg.metrics.granularity;
        let windows = cfg.metrics.window_specs();

        // 1) HTTP endpoints
        let mut endpoints = HashMap::new();
        for name in [services::ECHO, services::FAULT] {
            let stats = HttpStats::new(&registry, name, &windows, granularity)?;
            endpoints.insert(name, Arc::new(stats));
        }

        // 2) RPC
        let rpc_stats = RpcStats::new(
            &registry,
            &cfg.rpc.interval_label,
            cfg.rpc.interval(),
            granularity,
        )?;
        let dispatcher = Dispatcher::new(Arc::new(rpc_stats));
        dispatcher.register(Arc::new(ArithMultiply));

        // 3) process memory
        memstats::publish(&registry)?;

        tracing::info!(
            endpoints = endpoints.len(),
            rpc_methods = ?dispatcher.registered_methods(),
            granularity,
            "metrics published"
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                cfg,
                registry,
                endpoints,
            }),
            dispatcher: Arc::new(dispatcher),
        })
    }

    pub fn cfg(&self) -> &GatewayConfig {
        &self.inner.cfg
    }

    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.inner.registry)
    }

    pub fn endpoint(&self, name: &str) -> Option<Arc<HttpStats>> {
        self.inner.endpoints.get(name).cloned()
    }

    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        Arc::clone(&self.dispatcher)
    }

    /// Stop every rotation task. Metrics stay readable.
    pub fn shutdown(&self) {
        self.inner.registry.close();
    }
}
