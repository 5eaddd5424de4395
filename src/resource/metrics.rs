use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide sync outcome counters shared by every resource actor.
#[derive(Debug, Default)]
pub struct SyncCounters {
    succeeded: AtomicU64,
    failed: AtomicU64,
}

impl SyncCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the new success total.
    pub fn record_success(&self) -> u64 {
        self.succeeded.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Returns the new failure total.
    pub fn record_failure(&self) -> u64 {
        self.failed.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn succeeded(&self) -> u64 {
        self.succeeded.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }
}
