//! Named metric registry with a JSON snapshot.
//!
//! A [`Registry`] is an explicit handle owned by whoever creates the metrics
//! (no process-global state). Top-level names map either to a single metric
//! or to a [`StatsMap`] of metrics. `to_json` renders every value from its
//! text form as a raw JSON number, sorted by key.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::value::RawValue;

use crate::error::{Result, WinMetricsError};

/// A stringable integer metric.
///
/// `as_text` must be a plain base-10 integer: pollers parse it as a JSON
/// number and do arithmetic on it.
pub trait Metric: Send + Sync + 'static {
    fn value(&self) -> i64;

    fn as_text(&self) -> String {
        self.value().to_string()
    }

    /// Release background resources (windowed metrics stop rotating).
    fn close(&self) {}
}

/// Plain cumulative integer.
#[derive(Debug, Default)]
pub struct Counter(AtomicI64);

impl Counter {
    pub fn new(v: i64) -> Self {
        Self(AtomicI64::new(v))
    }

    #[inline]
    pub fn add(&self, delta: i64) {
        self.0.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn get(&self) -> i64 {
        self.0.load(Ordering::Relaxed)
    }
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

impl Metric for Counter {
    fn value(&self) -> i64 {
        self.get()
    }
}

#[derive(Clone)]
enum Slot {
    Int(Arc<Counter>),
    Metric(Arc<dyn Metric>),
}

impl Slot {
    fn metric(&self) -> &dyn Metric {
        match self {
            Slot::Int(c) => c.as_ref(),
            Slot::Metric(m) => m.as_ref(),
        }
    }
}

/// Flat map of named metrics, e.g. the stats of one HTTP endpoint.
#[derive(Default)]
pub struct StatsMap {
    entries: DashMap<String, Slot>,
}

impl StatsMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `delta` to the counter at `key`, creating it at zero first.
    ///
    /// Keys holding a non-counter metric (set via [`StatsMap::set`]) are left
    /// untouched.
    pub fn add(&self, key: &str, delta: i64) {
        let existing = self.entries.get(key).map(|r| r.value().clone());
        let slot = match existing {
            Some(slot) => slot,
            None => self
                .entries
                .entry(key.to_string())
                .or_insert_with(|| Slot::Int(Arc::default()))
                .value()
                .clone(),
        };
        match slot {
            Slot::Int(c) => c.add(delta),
            Slot::Metric(_) => tracing::debug!(key, "add on non-counter metric ignored"),
        }
    }

    /// Store `metric` at `key`, replacing whatever was there.
    pub fn set(&self, key: impl Into<String>, metric: Arc<dyn Metric>) {
        self.entries.insert(key.into(), Slot::Metric(metric));
    }

    pub fn get(&self, key: &str) -> Option<Arc<dyn Metric>> {
        self.entries.get(key).map(|r| match r.value() {
            Slot::Int(c) => Arc::clone(c) as Arc<dyn Metric>,
            Slot::Metric(m) => Arc::clone(m),
        })
    }

    /// Current value at `key`.
    pub fn value(&self, key: &str) -> Option<i64> {
        self.entries.get(key).map(|r| r.value().metric().value())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sorted keys.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.iter().map(|r| r.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Render as a JSON object `{"key": <integer>, ...}` with sorted keys.
    pub fn to_json(&self) -> String {
        let mut out = BTreeMap::new();
        for r in self.entries.iter() {
            if let Some(raw) = raw_number(r.key(), r.value().metric()) {
                out.insert(r.key().clone(), raw);
            }
        }
        encode(&out)
    }

    pub fn close(&self) {
        for r in self.entries.iter() {
            if let Slot::Metric(m) = r.value() {
                m.close();
            }
        }
    }
}

/// A published top-level value.
#[derive(Clone)]
pub enum Var {
    Map(Arc<StatsMap>),
    Metric(Arc<dyn Metric>),
}

impl Var {
    fn to_raw(&self, name: &str) -> Option<Box<RawValue>> {
        match self {
            Var::Map(m) => match RawValue::from_string(m.to_json()) {
                Ok(raw) => Some(raw),
                Err(e) => {
                    tracing::warn!(name, error = %e, "stats map rendered invalid json");
                    None
                }
            },
            Var::Metric(m) => raw_number(name, m.as_ref()),
        }
    }

    fn close(&self) {
        match self {
            Var::Map(m) => m.close(),
            Var::Metric(m) => m.close(),
        }
    }
}

/// Registry of published metrics. Writes happen once per name at creation
/// time; reads are concurrent.
#[derive(Default)]
pub struct Registry {
    vars: DashMap<String, Var>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `var` under `name`. Names are unique.
    pub fn publish(&self, name: impl Into<String>, var: Var) -> Result<()> {
        let name = name.into();
        match self.vars.entry(name) {
            Entry::Occupied(e) => {
                tracing::warn!(name = %e.key(), "metric name already published");
                Err(WinMetricsError::AlreadyRegistered(e.key().clone()))
            }
            Entry::Vacant(e) => {
                e.insert(var);
                Ok(())
            }
        }
    }

    /// Publish a single metric under `name`.
    pub fn publish_metric(&self, name: impl Into<String>, metric: Arc<dyn Metric>) -> Result<()> {
        self.publish(name, Var::Metric(metric))
    }

    /// Publish a fresh, empty map under `name`.
    pub fn new_map(&self, name: impl Into<String>) -> Result<Arc<StatsMap>> {
        let map = Arc::new(StatsMap::new());
        self.publish(name, Var::Map(Arc::clone(&map)))?;
        Ok(map)
    }

    /// The map under `name`, publishing an empty one if the name is free.
    pub fn map_or_create(&self, name: &str) -> Result<Arc<StatsMap>> {
        let var = self
            .vars
            .entry(name.to_string())
            .or_insert_with(|| Var::Map(Arc::new(StatsMap::new())))
            .value()
            .clone();
        match var {
            Var::Map(m) => Ok(m),
            Var::Metric(_) => Err(WinMetricsError::AlreadyRegistered(format!(
                "{name} is published as a scalar metric"
            ))),
        }
    }

    pub fn map(&self, name: &str) -> Option<Arc<StatsMap>> {
        match self.get(name)? {
            Var::Map(m) => Some(m),
            Var::Metric(_) => None,
        }
    }

    pub fn get(&self, name: &str) -> Option<Var> {
        self.vars.get(name).map(|r| r.value().clone())
    }

    /// Unpublish `name` and stop any windowed metrics it held.
    pub fn remove(&self, name: &str) -> Result<()> {
        let (_, var) = self
            .vars
            .remove(name)
            .ok_or_else(|| WinMetricsError::NotFound(name.to_string()))?;
        var.close();
        Ok(())
    }

    /// Sorted published names.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.vars.iter().map(|r| r.key().clone()).collect();
        names.sort();
        names
    }

    /// Render every published var as one JSON object.
    pub fn to_json(&self) -> String {
        let mut out = BTreeMap::new();
        for r in self.vars.iter() {
            if let Some(raw) = r.value().to_raw(r.key()) {
                out.insert(r.key().clone(), raw);
            }
        }
        encode(&out)
    }

    /// Stop every windowed metric. Values stay readable.
    pub fn close(&self) {
        for r in self.vars.iter() {
            r.value().close();
        }
        tracing::debug!(vars = self.vars.len(), "registry closed");
    }
}

fn raw_number(key: &str, metric: &dyn Metric) -> Option<Box<RawValue>> {
    match RawValue::from_string(metric.as_text()) {
        Ok(raw) => Some(raw),
        Err(e) => {
            tracing::warn!(key, error = %e, "metric text is not a json number; skipped");
            None
        }
    }
}

fn encode(map: &BTreeMap<String, Box<RawValue>>) -> String {
    serde_json::to_string(map).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "metrics snapshot encoding failed");
        "{}".to_string()
    })
}
