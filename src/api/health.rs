//! Shared health state for the /health endpoint.
//! Updated by the ingest handler, read by the API.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct HealthState {
    /// Nanosecond timestamp of the last completed ingest cycle (0 = none).
    pub last_cycle_at_ns: AtomicU64,
    /// Total ingest cycles processed since startup.
    pub cycles_processed: AtomicU64,
    /// Total snapshots received across all cycles.
    pub snapshots_received: AtomicU64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cycle(&self, at_ns: u64, snapshots: u64) {
        self.last_cycle_at_ns.store(at_ns, Ordering::Relaxed);
        self.cycles_processed.fetch_add(1, Ordering::Relaxed);
        self.snapshots_received.fetch_add(snapshots, Ordering::Relaxed);
    }

    pub fn last_cycle_at_ns(&self) -> u64 {
        self.last_cycle_at_ns.load(Ordering::Relaxed)
    }

    pub fn cycles_processed(&self) -> u64 {
        self.cycles_processed.load(Ordering::Relaxed)
    }

    pub fn snapshots_received(&self) -> u64 {
        self.snapshots_received.load(Ordering::Relaxed)
    }
}
