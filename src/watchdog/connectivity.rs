//! Egress health as last observed by the keep-alive watchdog

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Written only by the watchdog; everyone else reads
#[derive(Debug)]
pub struct ConnectivityState {
    ok: AtomicBool,
    consecutive_failures: AtomicU64,
}

impl Default for ConnectivityState {
    fn default() -> Self {
        Self {
            ok: AtomicBool::new(true),
            consecutive_failures: AtomicU64::new(0),
        }
    }
}

impl ConnectivityState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the last probe succeeded; informational only
    pub fn is_ok(&self) -> bool {
        self.ok.load(Ordering::Acquire)
    }

    pub fn consecutive_failures(&self) -> u64 {
        self.consecutive_failures.load(Ordering::Acquire)
    }

    pub fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Release);
        self.ok.store(true, Ordering::Release);
    }

    /// Returns the failure count including this one
    pub fn record_failure(&self) -> u64 {
        self.ok.store(false, Ordering::Release);
        self.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1
    }
}
