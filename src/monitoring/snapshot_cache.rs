use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::catalog::{Item, ItemId};

/// Last observed state of one item. Replaced wholesale on each observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub item_id: ItemId,
    pub price: Option<Decimal>,
    pub observed_at: DateTime<Utc>,
    /// Store-side version, kept for diagnostics only.
    pub revision: i64,
}

impl Snapshot {
    pub fn observe(item: &Item, observed_at: DateTime<Utc>) -> Self {
        Self {
            item_id: item.id,
            price: item.current_price,
            observed_at,
            revision: item.revision,
        }
    }
}

/// Item id -> last snapshot. Sharded internally, so the scan engine and the
/// janitor can use it concurrently without any outer lock.
#[derive(Debug, Default)]
pub struct SnapshotCache {
    entries: DashMap<ItemId, Snapshot>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, item_id: ItemId) -> Option<Snapshot> {
        self.entries.get(&item_id).map(|entry| entry.value().clone())
    }

    /// Stores `snapshot`, returning whatever it replaced.
    pub fn put(&self, item_id: ItemId, snapshot: Snapshot) -> Option<Snapshot> {
        self.entries.insert(item_id, snapshot)
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn remove_where<F>(&self, mut predicate: F) -> usize
    where
        F: FnMut(DateTime<Utc>) -> bool,
    {
        let mut removed = 0;
        self.entries.retain(|_, snapshot| {
            if predicate(snapshot.observed_at) {
                removed += 1;
                false
            } else {
                true
            }
        });
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Arc;

    fn snapshot(item_id: ItemId, price: &str, observed_at: DateTime<Utc>) -> Snapshot {
        Snapshot {
            item_id,
            price: Some(price.parse().unwrap()),
            observed_at,
            revision: 0,
        }
    }

    #[test]
    fn test_put_replaces_existing_entry() {
        let cache = SnapshotCache::new();
        let now = Utc::now();

        assert!(cache.put(1, snapshot(1, "10", now)).is_none());
        let previous = cache.put(1, snapshot(1, "12", now)).unwrap();

        assert_eq!(previous.price, Some("10".parse().unwrap()));
        assert_eq!(cache.size(), 1);
        assert_eq!(cache.get(1).unwrap().price, Some("12".parse().unwrap()));
        assert!(cache.get(2).is_none());
    }

    #[test]
    fn test_remove_where_counts_removed() {
        let cache = SnapshotCache::new();
        let now = Utc::now();
        for id in 0..10 {
            cache.put(id, snapshot(id, "1", now - Duration::hours(id)));
        }

        let cutoff = now - Duration::minutes(270);
        let removed = cache.remove_where(|observed_at| observed_at < cutoff);

        assert_eq!(removed, 5);
        assert_eq!(cache.size(), 5);
        assert!(cache.get(4).is_some());
        assert!(cache.get(5).is_none());
    }

    #[test]
    fn test_concurrent_writers_and_sweeper() {
        let cache = Arc::new(SnapshotCache::new());
        let now = Utc::now();

        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for i in 0..500 {
                        let id = worker * 1_000 + i;
                        cache.put(id, snapshot(id, "3", now));
                        if i % 50 == 0 {
                            cache.remove_where(|observed_at| observed_at < now);
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.size(), 2_000);
    }
}
