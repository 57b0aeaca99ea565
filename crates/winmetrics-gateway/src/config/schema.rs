use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;
use winmetrics_core::error::{Result, WinMetricsError};
use winmetrics_core::DEFAULT_GRANULARITY;

const MAX_GRANULARITY: usize = 4096;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    pub version: u32,

    #[serde(default)]
    pub gateway: GatewaySection,

    #[serde(default)]
    pub metrics: MetricsSection,

    #[serde(default)]
    pub rpc: RpcSection,
}

impl GatewayConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(WinMetricsError::UnsupportedVersion);
        }

        self.gateway.validate()?;
        self.metrics.validate()?;
        self.rpc.validate()?;

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewaySection {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl GatewaySection {
    pub fn validate(&self) -> Result<()> {
        self.listen_addr().map(|_| ())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen.parse().map_err(|_| {
            WinMetricsError::BadRequest(format!(
                "gateway.listen must be a valid socket address, got {:?}",
                self.listen
            ))
        })
    }
}

fn default_listen() -> String {
    "0.0.0.0:9000".into()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsSection {
    #[serde(default = "default_granularity")]
    pub granularity: usize,

    #[serde(default = "default_windows")]
    pub windows: Vec<WindowConfig>,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            granularity: default_granularity(),
            windows: default_windows(),
        }
    }
}

impl MetricsSection {
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_GRANULARITY).contains(&self.granularity) {
            return Err(WinMetricsError::BadRequest(format!(
                "metrics.granularity must be between 1 and {MAX_GRANULARITY}"
            )));
        }
        if self.windows.is_empty() {
            return Err(WinMetricsError::BadRequest(
                "metrics.windows must not be empty".into(),
            ));
        }

        let mut seen = HashSet::new();
        for w in &self.windows {
            validate_label("metrics.windows.label", &w.label)?;
            if w.secs == 0 {
                return Err(WinMetricsError::BadRequest(format!(
                    "metrics.windows[{}].secs must be greater than 0",
                    w.label
                )));
            }
            if !seen.insert(w.label.as_str()) {
                return Err(WinMetricsError::BadRequest(format!(
                    "metrics.windows label {} is duplicated",
                    w.label
                )));
            }
        }
        Ok(())
    }

    /// `(label, interval)` pairs in declaration order.
    pub fn window_specs(&self) -> Vec<(&str, Duration)> {
        self.windows
            .iter()
            .map(|w| (w.label.as_str(), w.interval()))
            .collect()
    }
}

fn default_granularity() -> usize {
    DEFAULT_GRANULARITY
}

fn default_windows() -> Vec<WindowConfig> {
    vec![WindowConfig {
        label: "min".into(),
        secs: 60,
    }]
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WindowConfig {
    pub label: String,
    pub secs: u64,
}

impl WindowConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.secs)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RpcSection {
    #[serde(default = "default_rpc_label")]
    pub interval_label: String,

    #[serde(default = "default_rpc_secs")]
    pub interval_secs: u64,
}

impl Default for RpcSection {
    fn default() -> Self {
        Self {
            interval_label: default_rpc_label(),
            interval_secs: default_rpc_secs(),
        }
    }
}

impl RpcSection {
    pub fn validate(&self) -> Result<()> {
        validate_label("rpc.interval_label", &self.interval_label)?;
        if self.interval_secs == 0 {
            return Err(WinMetricsError::BadRequest(
                "rpc.interval_secs must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

fn default_rpc_label() -> String {
    "min".into()
}
fn default_rpc_secs() -> u64 {
    60
}

/// Labels end up inside metric keys (`requests_per_<label>`).
fn validate_label(field: &str, label: &str) -> Result<()> {
    let ok = !label.is_empty()
        && label
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_');
    if !ok {
        return Err(WinMetricsError::BadRequest(format!(
            "{field} must match [a-z0-9_]+, got {label:?}"
        )));
    }
    Ok(())
}
