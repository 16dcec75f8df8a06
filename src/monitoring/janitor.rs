use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use super::snapshot_cache::SnapshotCache;
use crate::core::MonitorMetrics;

pub const CACHE_RETENTION_HOURS: i64 = 24;

/// Evicts snapshots not refreshed within the retention window.
pub struct CacheJanitor {
    cache: Arc<SnapshotCache>,
    retention: Duration,
    metrics: MonitorMetrics,
}

impl CacheJanitor {
    pub fn new(cache: Arc<SnapshotCache>, metrics: MonitorMetrics) -> Self {
        Self {
            cache,
            retention: Duration::hours(CACHE_RETENTION_HOURS),
            metrics,
        }
    }

    pub fn sweep(&self) -> usize {
        self.sweep_at(Utc::now())
    }

    pub fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.retention;
        let removed = self.cache.remove_where(|observed_at| observed_at < cutoff);

        self.metrics.snapshots_evicted.inc_by(removed as u64);
        self.metrics.cache_size.set(self.cache.size() as i64);

        if removed > 0 {
            tracing::debug!(removed, remaining = self.cache.size(), "evicted stale snapshots");
        }
        removed
    }
}
