#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use price_watch::broker::MessageBroker;
use price_watch::catalog::{CatalogStore, Item, ItemId};
use price_watch::core::MonitorMetrics;
use price_watch::monitoring::{
    ChangeJournal, NotifierGate, ScanEngine, ScanSettings, SnapshotCache,
};
use price_watch::{ChangeEvent, MonitorError, MonitorResult};

pub fn price(raw: &str) -> Decimal {
    raw.parse().unwrap()
}

/// Catalog kept in a vector; insertion order is the query order.
#[derive(Default)]
pub struct FakeCatalog {
    items: Mutex<Vec<(Item, bool)>>,
    pub changed_queries: AtomicUsize,
    pub fail_queries: AtomicBool,
}

impl FakeCatalog {
    pub fn upsert(&self, id: ItemId, category: &str, current_price: Option<&str>, active: bool) {
        let item = Item {
            id,
            name: format!("item-{}", id),
            category: category.to_string(),
            current_price: current_price.map(price),
            last_modified: Utc::now(),
            revision: 0,
        };
        let mut items = self.items.lock().unwrap();
        match items.iter_mut().find(|(existing, _)| existing.id == id) {
            Some(entry) => {
                let revision = entry.0.revision + 1;
                *entry = (Item { revision, ..item }, active);
            }
            None => items.push((item, active)),
        }
    }

    pub fn set_price(&self, id: ItemId, current_price: Option<&str>) {
        let mut items = self.items.lock().unwrap();
        if let Some((item, _)) = items.iter_mut().find(|(existing, _)| existing.id == id) {
            item.current_price = current_price.map(price);
            item.last_modified = Utc::now();
            item.revision += 1;
        }
    }
}

#[async_trait]
impl CatalogStore for FakeCatalog {
    async fn find_changed_since(&self, since: DateTime<Utc>) -> MonitorResult<Vec<Item>> {
        self.changed_queries.fetch_add(1, Ordering::SeqCst);
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(MonitorError::Catalog("catalog unreachable".into()));
        }
        let items = self.items.lock().unwrap();
        Ok(items
            .iter()
            .filter(|(item, _)| item.last_modified >= since)
            .map(|(item, _)| item.clone())
            .collect())
    }

    async fn find_all_active(&self) -> MonitorResult<Vec<Item>> {
        let items = self.items.lock().unwrap();
        Ok(items
            .iter()
            .filter(|(_, active)| *active)
            .map(|(item, _)| item.clone())
            .collect())
    }
}

/// Broker that remembers every publish call.
#[derive(Default)]
pub struct RecordingBroker {
    published: Mutex<Vec<(String, ChangeEvent)>>,
    pub fail: AtomicBool,
}

impl RecordingBroker {
    pub fn published(&self) -> Vec<(String, ChangeEvent)> {
        self.published.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.published.lock().unwrap().len()
    }
}

#[async_trait]
impl MessageBroker for RecordingBroker {
    async fn publish(&self, queue: &str, event: &ChangeEvent) -> MonitorResult<()> {
        self.published
            .lock()
            .unwrap()
            .push((queue.to_string(), event.clone()));
        if self.fail.load(Ordering::SeqCst) {
            return Err(MonitorError::Broker("broker unavailable".into()));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

pub struct Harness {
    pub catalog: Arc<FakeCatalog>,
    pub broker: Arc<RecordingBroker>,
    pub cache: Arc<SnapshotCache>,
    pub notifier: Arc<NotifierGate>,
    pub journal: Arc<ChangeJournal>,
    pub engine: ScanEngine,
    pub metrics: MonitorMetrics,
}

pub fn harness(max_batch_size: usize) -> Harness {
    let catalog = Arc::new(FakeCatalog::default());
    let broker = Arc::new(RecordingBroker::default());
    let cache = Arc::new(SnapshotCache::new());
    let journal = Arc::new(ChangeJournal::new(100));
    let metrics = MonitorMetrics::new().unwrap();

    let notifier = Arc::new(NotifierGate::new(
        broker.clone(),
        "price-changes",
        true,
        Duration::from_secs(1),
        journal.clone(),
        metrics.clone(),
    ));

    let engine = ScanEngine::new(
        catalog.clone(),
        cache.clone(),
        notifier.clone(),
        ScanSettings {
            poll_interval: Duration::from_millis(30_000),
            max_batch_size,
            collaborator_timeout: Duration::from_secs(1),
        },
        metrics.clone(),
    );

    Harness {
        catalog,
        broker,
        cache,
        notifier,
        journal,
        engine,
        metrics,
    }
}
