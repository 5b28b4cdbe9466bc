//! The relocation-stall statistic.
//!
//! Reduced from `mmtk-core`'s phase-bucketed `Counter`/`Diffable` machinery
//! (`util::statistics::counter`) down to the single cumulative timer this
//! crate needs: total time spent blocked in `wait_page_released`, and how
//! many times that happened.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Accumulates wall-clock time spent blocked waiting for a region to be
/// released, plus a count of how many waits actually blocked.
#[derive(Default)]
pub struct RelocationStallStat {
    total_nanos: AtomicU64,
    stall_count: AtomicU64,
}

impl RelocationStallStat {
    pub const fn new() -> Self {
        Self {
            total_nanos: AtomicU64::new(0),
            stall_count: AtomicU64::new(0),
        }
    }

    /// Start timing a stall. The returned guard records its elapsed time
    /// into this statistic when dropped.
    pub fn start(&self) -> StallTimer<'_> {
        StallTimer {
            stat: self,
            start: Instant::now(),
        }
    }

    pub fn total_nanos(&self) -> u64 {
        self.total_nanos.load(Ordering::Relaxed)
    }

    pub fn stall_count(&self) -> u64 {
        self.stall_count.load(Ordering::Relaxed)
    }
}

/// RAII scoped timer for a single relocation stall, scoped to the blocking
/// section of `wait_page_released`.
#[must_use = "dropping this immediately would record a near-zero stall"]
pub struct StallTimer<'s> {
    stat: &'s RelocationStallStat,
    start: Instant,
}

impl Drop for StallTimer<'_> {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        self.stat
            .total_nanos
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
        self.stat.stall_count.fetch_add(1, Ordering::Relaxed);
    }
}
