use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use super::events::{ChangeEvent, POLLING_REASON};
use super::notifier::NotifierGate;
use super::snapshot_cache::{Snapshot, SnapshotCache};
use crate::catalog::{CatalogStore, Item};
use crate::core::{HealthChecker, MonitorError, MonitorMetrics, MonitorResult};

#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub poll_interval: Duration,
    pub max_batch_size: usize,
    pub collaborator_timeout: Duration,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(30_000),
            max_batch_size: 100,
            collaborator_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleReport {
    pub fetched: usize,
    /// Items diffed this cycle, failures included.
    pub processed: usize,
    pub failed: usize,
    pub notifications: usize,
    /// Items beyond the batch limit, left for the next cycle.
    pub deferred: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Skipped,
    Completed(CycleReport),
    Failed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStatus {
    pub enabled: bool,
    pub last_poll_time: DateTime<Utc>,
    pub poll_interval_ms: u64,
    pub max_batch_size: usize,
    pub cached_items: usize,
}

/// Polls the catalog for items modified since the watermark, diffs them
/// against the snapshot cache and publishes a change event for each real
/// price movement.
pub struct ScanEngine {
    catalog: Arc<dyn CatalogStore>,
    cache: Arc<SnapshotCache>,
    notifier: Arc<NotifierGate>,
    settings: ScanSettings,
    watermark: RwLock<DateTime<Utc>>,
    metrics: MonitorMetrics,
    health: Option<Arc<HealthChecker>>,
}

impl ScanEngine {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        cache: Arc<SnapshotCache>,
        notifier: Arc<NotifierGate>,
        settings: ScanSettings,
        metrics: MonitorMetrics,
    ) -> Self {
        Self {
            catalog,
            cache,
            notifier,
            settings,
            watermark: RwLock::new(Utc::now() - ChronoDuration::minutes(5)),
            metrics,
            health: None,
        }
    }

    pub fn with_health(mut self, health: Arc<HealthChecker>) -> Self {
        self.health = Some(health);
        self
    }

    pub fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    pub async fn watermark(&self) -> DateTime<Utc> {
        *self.watermark.read().await
    }

    pub async fn set_watermark(&self, at: DateTime<Utc>) {
        *self.watermark.write().await = at;
    }

    pub async fn run_scan_cycle(&self) -> CycleOutcome {
        if !self.notifier.is_enabled() {
            tracing::debug!("price monitoring is disabled, skipping poll");
            self.metrics.cycles_skipped.inc();
            return CycleOutcome::Skipped;
        }

        let started = Instant::now();
        match self.scan().await {
            Ok(report) => {
                self.metrics.cycles_run.inc();
                self.mark_catalog(true).await;
                tracing::info!(
                    fetched = report.fetched,
                    processed = report.processed,
                    failed = report.failed,
                    notifications = report.notifications,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "price monitoring poll completed"
                );
                CycleOutcome::Completed(report)
            }
            Err(e) => {
                self.metrics.cycles_failed.inc();
                self.mark_catalog(false).await;
                tracing::error!("price monitoring poll failed, watermark kept: {}", e);
                CycleOutcome::Failed
            }
        }
    }

    async fn scan(&self) -> MonitorResult<CycleReport> {
        let cycle_start = Utc::now();
        let since = self.watermark().await;

        let items = self
            .bounded("catalog query", self.catalog.find_changed_since(since))
            .await?;

        tracing::info!("found {} items updated since {}", items.len(), since);

        let mut report = CycleReport {
            fetched: items.len(),
            ..Default::default()
        };

        let limit = self.settings.max_batch_size;
        if items.len() > limit {
            report.deferred = items.len() - limit;
            tracing::warn!(
                "reached maximum batch size of {}, {} items will be processed in a later poll",
                limit,
                report.deferred
            );
        }

        for item in items.iter().take(limit) {
            report.processed += 1;
            self.metrics.items_diffed.inc();
            match self.process_item(item).await {
                Ok(true) => report.notifications += 1,
                Ok(false) => {}
                Err(e) => {
                    report.failed += 1;
                    self.metrics.item_failures.inc();
                    tracing::warn!(item_id = item.id, "error processing price change: {}", e);
                }
            }
        }

        self.metrics.cache_size.set(self.cache.size() as i64);
        self.set_watermark(cycle_start).await;

        Ok(report)
    }

    /// Diffs one item against its cached snapshot. Returns whether a change
    /// notification was sent.
    pub async fn process_item(&self, item: &Item) -> MonitorResult<bool> {
        let current = Snapshot::observe(item, Utc::now());
        let previous = self.cache.get(item.id);
        self.cache.put(item.id, current.clone());

        let Some(previous) = previous else {
            tracing::debug!(item_id = item.id, "first sighting, storing initial snapshot");
            return Ok(false);
        };

        match (previous.price, current.price) {
            (Some(old), Some(new)) if old != new => {
                tracing::info!(
                    item_id = item.id,
                    revision = current.revision,
                    previous_revision = previous.revision,
                    "price change detected: {} -> {}",
                    old,
                    new
                );
                let event = ChangeEvent::from_prices(item, Some(old), new, POLLING_REASON)?;
                self.notifier.publish(event).await;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Re-seeds the cache from every active item. Publishes nothing.
    pub async fn force_full_scan(&self) -> MonitorResult<usize> {
        tracing::info!("starting forced full scan of all items");

        let items = match self
            .bounded("catalog query", self.catalog.find_all_active())
            .await
        {
            Ok(items) => items,
            Err(e) => {
                tracing::error!("forced full scan failed: {}", e);
                return Err(e);
            }
        };

        let now = Utc::now();
        for item in &items {
            self.cache.put(item.id, Snapshot::observe(item, now));
        }
        self.metrics.cache_size.set(self.cache.size() as i64);

        tracing::info!("full scan completed, cached {} snapshots", items.len());
        Ok(items.len())
    }

    pub async fn get_status(&self) -> EngineStatus {
        EngineStatus {
            enabled: self.notifier.is_enabled(),
            last_poll_time: self.watermark().await,
            poll_interval_ms: self.settings.poll_interval.as_millis() as u64,
            max_batch_size: self.settings.max_batch_size,
            cached_items: self.cache.size(),
        }
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = MonitorResult<T>>,
    ) -> MonitorResult<T> {
        let limit = self.settings.collaborator_timeout;
        tokio::time::timeout(limit, call)
            .await
            .unwrap_or_else(|_| {
                Err(MonitorError::Timeout {
                    operation,
                    after_ms: limit.as_millis() as u64,
                })
            })
    }

    async fn mark_catalog(&self, reachable: bool) {
        if let Some(health) = &self.health {
            health.update_component("catalog", reachable).await;
        }
    }
}
