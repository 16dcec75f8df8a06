use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::janitor::CacheJanitor;
use super::scan_engine::ScanEngine;

/// The two independent timers: scan cadence and janitor cadence.
pub struct Scheduler {
    scan_task: JoinHandle<()>,
    janitor_task: JoinHandle<()>,
}

impl Scheduler {
    pub fn start(
        engine: Arc<ScanEngine>,
        janitor: Arc<CacheJanitor>,
        poll_interval: Duration,
        janitor_interval: Duration,
    ) -> Self {
        tracing::info!(
            poll_interval_ms = poll_interval.as_millis() as u64,
            janitor_interval_secs = janitor_interval.as_secs(),
            "starting price monitor timers"
        );

        let scan_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(poll_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                // Each cycle runs as its own task so a panic ends that cycle only.
                let engine = engine.clone();
                let cycle = tokio::spawn(async move {
                    engine.run_scan_cycle().await;
                });
                if let Err(e) = cycle.await {
                    tracing::error!("price monitoring poll aborted: {}", e);
                }
            }
        });

        let janitor_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(janitor_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; nothing can be stale yet.
            interval.tick().await;

            loop {
                interval.tick().await;
                janitor.sweep();
            }
        });

        Self {
            scan_task,
            janitor_task,
        }
    }

    pub fn shutdown(self) {
        self.scan_task.abort();
        self.janitor_task.abort();
        tracing::info!("price monitor timers stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::LocalEventBus;
    use crate::catalog::{CatalogStore, Item, MockCatalogStore};
    use crate::core::{MonitorMetrics, MonitorResult};
    use crate::monitoring::journal::ChangeJournal;
    use crate::monitoring::notifier::NotifierGate;
    use crate::monitoring::scan_engine::ScanSettings;
    use crate::monitoring::snapshot_cache::{Snapshot, SnapshotCache};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn wire(
        catalog: Arc<dyn CatalogStore>,
        cache: Arc<SnapshotCache>,
        metrics: &MonitorMetrics,
    ) -> (Arc<ScanEngine>, Arc<CacheJanitor>) {
        let notifier = Arc::new(NotifierGate::new(
            Arc::new(LocalEventBus::new(8)),
            "price-changes",
            true,
            Duration::from_secs(1),
            Arc::new(ChangeJournal::new(8)),
            metrics.clone(),
        ));
        let engine = Arc::new(ScanEngine::new(
            catalog,
            cache.clone(),
            notifier,
            ScanSettings::default(),
            metrics.clone(),
        ));
        let janitor = Arc::new(CacheJanitor::new(cache, metrics.clone()));
        (engine, janitor)
    }

    #[tokio::test(start_paused = true)]
    async fn test_cadences_and_shutdown() {
        let mut catalog = MockCatalogStore::new();
        catalog.expect_find_changed_since().returning(|_| Ok(vec![]));

        let cache = Arc::new(SnapshotCache::new());
        cache.put(
            1,
            Snapshot {
                item_id: 1,
                price: Some("3".parse().unwrap()),
                observed_at: Utc::now() - chrono::Duration::hours(25),
                revision: 0,
            },
        );
        let metrics = MonitorMetrics::new().unwrap();
        let (engine, janitor) = wire(Arc::new(catalog), cache.clone(), &metrics);

        let scheduler = Scheduler::start(
            engine,
            janitor,
            Duration::from_secs(30),
            Duration::from_secs(300),
        );

        // Scan fires immediately; the janitor's first tick is swallowed.
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(metrics.cycles_run.get(), 1);
        assert_eq!(metrics.snapshots_evicted.get(), 0);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(metrics.cycles_run.get(), 3);
        assert_eq!(metrics.snapshots_evicted.get(), 0);

        tokio::time::sleep(Duration::from_secs(240)).await;
        assert_eq!(metrics.cycles_run.get(), 11);
        assert_eq!(metrics.snapshots_evicted.get(), 1);
        assert_eq!(cache.size(), 0);

        scheduler.shutdown();
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(metrics.cycles_run.get(), 11);
        assert_eq!(metrics.snapshots_evicted.get(), 1);
    }

    /// Catalog whose first query panics.
    #[derive(Default)]
    struct PanicsOnce {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CatalogStore for PanicsOnce {
        async fn find_changed_since(&self, _since: DateTime<Utc>) -> MonitorResult<Vec<Item>> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("catalog driver bug");
            }
            Ok(vec![])
        }

        async fn find_all_active(&self) -> MonitorResult<Vec<Item>> {
            Ok(vec![])
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_cycle_does_not_stop_polling() {
        let catalog = Arc::new(PanicsOnce::default());
        let metrics = MonitorMetrics::new().unwrap();
        let (engine, janitor) = wire(catalog.clone(), Arc::new(SnapshotCache::new()), &metrics);

        let scheduler = Scheduler::start(
            engine,
            janitor,
            Duration::from_secs(30),
            Duration::from_secs(300),
        );

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(catalog.calls.load(Ordering::SeqCst), 3);
        assert_eq!(metrics.cycles_run.get(), 2);

        scheduler.shutdown();
    }
}
