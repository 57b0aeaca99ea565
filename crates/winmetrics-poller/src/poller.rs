use std::collections::{BTreeMap, HashMap};
use std::time::SystemTime;

use serde_json::value::RawValue;

use crate::collectd::Recorder;
use crate::derive::{self, Stats};
use crate::error::Error;

const HTTP_INDEX: &str = "exphttp";
const RPC_MAP: &str = "exprpc";
const MEM_MAP: &str = "memstats";

/// Holds the most recent snapshot fetched from `base_url`.
pub struct Poller {
    base_url: String,
    client: reqwest::Client,
    fetch_time: SystemTime,
    vars: HashMap<String, Box<RawValue>>,
}

impl Poller {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, reqwest::Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into(),
            client,
            fetch_time: SystemTime::UNIX_EPOCH,
            vars: HashMap::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn fetch_time(&self) -> SystemTime {
        self.fetch_time
    }

    /// Names present in the last snapshot.
    pub fn var_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.vars.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// GET the snapshot and replace the held one.
    pub async fn fetch(&mut self) -> Result<(), Error> {
        let body = self
            .client
            .get(&self.base_url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        self.load(&body)
    }

    /// Replace the held snapshot with `body`, stamped now.
    pub fn load(&mut self, body: &str) -> Result<(), Error> {
        self.vars = serde_json::from_str(body)?;
        self.fetch_time = SystemTime::now();
        tracing::debug!(url = %self.base_url, vars = self.vars.len(), "snapshot loaded");
        Ok(())
    }

    fn stats(&self, name: &str) -> Result<Option<Stats>, Error> {
        self.vars
            .get(name)
            .map(|raw| serde_json::from_str::<Stats>(raw.get()))
            .transpose()
            .map_err(Error::from)
    }

    /// Emit every endpoint listed in `exphttp` under plugin `http`, keys
    /// prefixed with the endpoint name. No-op if the index is absent.
    pub fn http_stats(&self, rec: &mut impl Recorder) -> Result<(), Error> {
        let Some(raw) = self.vars.get(HTTP_INDEX) else {
            return Ok(());
        };
        let index: BTreeMap<String, f64> = serde_json::from_str(raw.get())?;

        for endpoint in index.keys() {
            let stats = self
                .stats(endpoint)?
                .ok_or_else(|| Error::MissingVar(endpoint.clone()))?;
            for (key, value) in derive::http_endpoint(&stats) {
                rec.record("http", &format!("{endpoint}.{key}"), value, self.fetch_time);
            }
        }
        Ok(())
    }

    /// Emit the `exprpc` map under plugin `rpc`. No-op if absent.
    pub fn rpc_stats(&self, rec: &mut impl Recorder) -> Result<(), Error> {
        let Some(stats) = self.stats(RPC_MAP)? else {
            return Ok(());
        };
        for (key, value) in derive::rpc(&stats) {
            rec.record("rpc", &key, value, self.fetch_time);
        }
        Ok(())
    }

    /// Emit the `memstats` process gauges as-is under plugin `memstats`.
    /// No-op if absent.
    pub fn mem_stats(&self, rec: &mut impl Recorder) -> Result<(), Error> {
        let Some(stats) = self.stats(MEM_MAP)? else {
            return Ok(());
        };
        for (key, value) in &stats {
            rec.record("memstats", key, *value, self.fetch_time);
        }
        Ok(())
    }
}
