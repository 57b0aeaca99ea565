//! Output sinks for polled values.

use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};

/// Receives every emitted `(plugin, key, value)` for one fetch.
pub trait Recorder {
    fn record(&mut self, plugin: &str, key: &str, value: f64, at: SystemTime);
}

impl<F> Recorder for F
where
    F: FnMut(&str, &str, f64, SystemTime),
{
    fn record(&mut self, plugin: &str, key: &str, value: f64, at: SystemTime) {
        self(plugin, key, value, at)
    }
}

/// Writes collectd exec-plugin `PUTVAL` lines:
///
/// ```text
/// PUTVAL <host>/<plugin>[-<instance>]/gauge-<key> interval=<secs> <unix>:<value>
/// ```
pub struct CollectdRecorder<W> {
    out: W,
    host: String,
    instance: Option<String>,
    interval_secs: u64,
}

impl<W: Write> CollectdRecorder<W> {
    pub fn new(out: W, host: impl Into<String>, instance: Option<String>, interval_secs: u64) -> Self {
        Self {
            out,
            host: host.into(),
            instance: instance.filter(|i| !i.is_empty()),
            interval_secs,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&self, plugin: &str, key: &str, value: f64, at: SystemTime) -> String {
        let unix = at.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
        let plugin = match &self.instance {
            Some(i) => format!("{plugin}-{i}"),
            None => plugin.to_string(),
        };
        format!(
            "PUTVAL {}/{}/gauge-{} interval={} {}:{}\n",
            self.host, plugin, key, self.interval_secs, unix, value
        )
    }
}

impl<W: Write> Recorder for CollectdRecorder<W> {
    fn record(&mut self, plugin: &str, key: &str, value: f64, at: SystemTime) {
        let line = self.line(plugin, key, value, at);
        if let Err(e) = self.out.write_all(line.as_bytes()) {
            tracing::warn!(error = %e, key, "write PUTVAL failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn putval_format() {
        let at = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let mut rec = CollectdRecorder::new(Vec::new(), "web1", Some("blue".into()), 10);
        rec.record("http", "echo.requests", 12.0, at);
        rec.record("rpc", "responses.avg_ns", 1250.5, at);
        let out = String::from_utf8(rec.into_inner()).unwrap_or_default();
        assert_eq!(
            out,
            "PUTVAL web1/http-blue/gauge-echo.requests interval=10 1700000000:12\n\
             PUTVAL web1/rpc-blue/gauge-responses.avg_ns interval=10 1700000000:1250.5\n"
        );
    }

    #[test]
    fn empty_instance_is_omitted_and_large_values_stay_decimal() {
        let at = UNIX_EPOCH + Duration::from_secs(5);
        let mut rec = CollectdRecorder::new(Vec::new(), "h", Some(String::new()), 1);
        rec.record("http", "x.total_ns", 3.0e12, at);
        let out = String::from_utf8(rec.into_inner()).unwrap_or_default();
        assert_eq!(out, "PUTVAL h/http/gauge-x.total_ns interval=1 5:3000000000000\n");
    }
}
