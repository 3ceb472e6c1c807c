//! Conversion statistics shared by all jobs of one run.
//!
//! Writers update related counters inside one critical section; readers only
//! ever get a copied `StatsSnapshot`.

use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub attempted: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub processing_time: Duration,
}

impl StatsSnapshot {
    /// Jobs that were started but have not recorded an outcome yet.
    pub fn in_flight(&self) -> u64 {
        self.attempted.saturating_sub(self.succeeded + self.failed)
    }
}

#[derive(Debug, Default)]
pub struct ConversionStats {
    inner: Mutex<StatsSnapshot>,
}

impl ConversionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_attempt(&self) {
        let mut stats = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        stats.attempted += 1;
    }

    pub fn record_outcome(&self, success: bool, elapsed: Duration) {
        let mut stats = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if success {
            stats.succeeded += 1;
        } else {
            stats.failed += 1;
        }
        stats.processing_time += elapsed;
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        *self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
