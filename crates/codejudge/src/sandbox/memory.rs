//! Peak memory sampling
//!
//! Linux exposes a process's resident high-water mark as `VmHWM` in
//! `/proc/<pid>/status`. The value only grows, so sampling it periodically and
//! keeping the last readable value tracks the peak until the process exits.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;

/// Parsed `/proc/<pid>/status`
#[derive(Debug, Clone, Default)]
pub(crate) struct ProcStatus {
    entries: HashMap<String, String>,
}

impl ProcStatus {
    /// Lenient `key: value` parsing; malformed lines are skipped
    pub(crate) fn parse(content: &str) -> Self {
        let entries = content
            .lines()
            .filter_map(|line| line.split_once(':'))
            .map(|(key, value)| (key.trim(), value.trim()))
            .filter(|(key, _)| !key.is_empty())
            .map(|(key, value)| (key.to_owned(), value.to_owned()))
            .collect();
        Self { entries }
    }

    /// A `<n> kB` field in kilobytes
    pub(crate) fn kilobytes(&self, key: &str) -> Option<u64> {
        let value = self.entries.get(key)?;
        let number = value.strip_suffix("kB").unwrap_or(value).trim();
        number.parse().ok()
    }

    pub(crate) fn peak_resident_kb(&self) -> Option<u64> {
        self.kilobytes("VmHWM")
    }
}

async fn sample(pid: u32) -> Option<u64> {
    let content = tokio::fs::read_to_string(format!("/proc/{pid}/status"))
        .await
        .ok()?;
    ProcStatus::parse(&content).peak_resident_kb()
}

/// Background sampler for one running process
#[derive(Debug)]
pub(crate) struct MemorySampler {
    peak_kb: Arc<AtomicU64>,
    handle: JoinHandle<()>,
}

impl MemorySampler {
    pub(crate) fn start(pid: u32, interval: Duration) -> Self {
        let peak_kb = Arc::new(AtomicU64::new(0));
        let shared = Arc::clone(&peak_kb);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                // Exited or reaped processes stop reporting; keep the last value
                match sample(pid).await {
                    Some(kb) => {
                        shared.fetch_max(kb, Ordering::Relaxed);
                    }
                    None => break,
                }
            }
        });
        Self { peak_kb, handle }
    }

    /// Stop sampling; `None` when no sample was ever taken
    pub(crate) fn finish(self) -> Option<u64> {
        self.handle.abort();
        match self.peak_kb.load(Ordering::Relaxed) {
            0 => None,
            kb => Some(kb),
        }
    }
}
