//! Process memory gauges under the `memstats` map.
//!
//! Values are read from `/proc/self/status` each time the map is rendered,
//! so a snapshot always carries the current figures. Only published on
//! Linux.

use winmetrics_core::{Registry, Result};

/// Registry map holding the process memory gauges.
pub const MEM_MAP: &str = "memstats";

/// Publish the `memstats` map. A no-op where procfs is unavailable.
pub fn publish(registry: &Registry) -> Result<()> {
    #[cfg(target_os = "linux")]
    {
        let map = registry.new_map(MEM_MAP)?;
        for field in linux::FIELDS {
            map.set(field.key(), std::sync::Arc::new(linux::StatusGauge(field)));
        }
        tracing::debug!(fields = linux::FIELDS.len(), "memstats published");
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = registry;
        tracing::debug!("memstats need procfs; not published on this platform");
    }
    Ok(())
}

#[cfg(target_os = "linux")]
mod linux {
    use procfs::process::{Process, Status};
    use winmetrics_core::Metric;

    const BYTES_PER_KIBIBYTE: u64 = 1024;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(super) enum Field {
        Rss,
        RssPeak,
        VmSize,
        VmPeak,
        VmData,
        Threads,
    }

    pub(super) const FIELDS: [Field; 6] = [
        Field::Rss,
        Field::RssPeak,
        Field::VmSize,
        Field::VmPeak,
        Field::VmData,
        Field::Threads,
    ];

    impl Field {
        pub(super) fn key(self) -> &'static str {
            match self {
                Field::Rss => "rss_bytes",
                Field::RssPeak => "rss_peak_bytes",
                Field::VmSize => "vm_size_bytes",
                Field::VmPeak => "vm_peak_bytes",
                Field::VmData => "vm_data_bytes",
                Field::Threads => "threads",
            }
        }

        fn read(self, status: &Status) -> Option<u64> {
            let kib = match self {
                Field::Rss => status.vmrss,
                Field::RssPeak => status.vmhwm,
                Field::VmSize => status.vmsize,
                Field::VmPeak => status.vmpeak,
                Field::VmData => status.vmdata,
                Field::Threads => return Some(status.threads),
            };
            kib.map(|v| v.saturating_mul(BYTES_PER_KIBIBYTE))
        }
    }

    /// One `/proc/self/status` field, sampled on read. Reads as `0` if the
    /// status file cannot be parsed.
    pub(super) struct StatusGauge(pub(super) Field);

    impl Metric for StatusGauge {
        fn value(&self) -> i64 {
            match Process::myself().and_then(|p| p.status()) {
                Ok(status) => self
                    .0
                    .read(&status)
                    .and_then(|v| i64::try_from(v).ok())
                    .unwrap_or(0),
                Err(e) => {
                    tracing::debug!(field = self.0.key(), error = %e, "status read failed");
                    0
                }
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn keys_are_unique() {
            let mut keys: Vec<&str> = FIELDS.iter().map(|f| f.key()).collect();
            keys.sort_unstable();
            keys.dedup();
            assert_eq!(keys.len(), FIELDS.len());
        }

        #[test]
        fn own_process_has_memory_and_threads() {
            assert!(StatusGauge(Field::Rss).value() > 0);
            assert!(StatusGauge(Field::VmSize).value() >= StatusGauge(Field::Rss).value());
            assert!(StatusGauge(Field::Threads).value() >= 1);
        }
    }
}
