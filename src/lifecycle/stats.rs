//! Lifecycle Counters

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by the lifecycle manager
#[derive(Debug, Default)]
pub struct LifecycleStats {
    pub creates: AtomicU64,
    pub create_failures: AtomicU64,
    pub deletes: AtomicU64,
    pub delete_failures: AtomicU64,
    pub rollbacks: AtomicU64,
    /// Rollback requests that themselves failed
    pub rollback_failures: AtomicU64,
}

impl LifecycleStats {
    #[inline]
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Create a snapshot of current stats
    pub fn snapshot(&self) -> LifecycleStatsSnapshot {
        LifecycleStatsSnapshot {
            creates: self.creates.load(Ordering::Relaxed),
            create_failures: self.create_failures.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            delete_failures: self.delete_failures.load(Ordering::Relaxed),
            rollbacks: self.rollbacks.load(Ordering::Relaxed),
            rollback_failures: self.rollback_failures.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of lifecycle statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleStatsSnapshot {
    pub creates: u64,
    pub create_failures: u64,
    pub deletes: u64,
    pub delete_failures: u64,
    pub rollbacks: u64,
    pub rollback_failures: u64,
}
