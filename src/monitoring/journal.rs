use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::events::{ChangeEvent, ChangeType};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeStatistics {
    pub total_changes: usize,
    pub increases: usize,
    pub decreases: usize,
    pub average_change_percentage: f64,
    pub last_updated: DateTime<Utc>,
}

/// Bounded log of the most recently published change events, oldest first.
///
/// Backs the read-only projections (offers, alerts, statistics). Entries
/// beyond `capacity` fall off the front.
pub struct ChangeJournal {
    capacity: usize,
    events: Mutex<VecDeque<ChangeEvent>>,
}

impl ChangeJournal {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            events: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
        }
    }

    fn with_events<T>(&self, f: impl FnOnce(&mut VecDeque<ChangeEvent>) -> T) -> T {
        let mut guard = self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut *guard)
    }

    pub fn record(&self, event: ChangeEvent) {
        let capacity = self.capacity;
        self.with_events(|events| {
            if events.len() == capacity {
                events.pop_front();
            }
            events.push_back(event);
        });
    }

    pub fn len(&self) -> usize {
        self.with_events(|events| events.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Newest first, at most `limit`.
    pub fn recent(&self, limit: usize) -> Vec<ChangeEvent> {
        self.with_events(|events| events.iter().rev().take(limit).cloned().collect())
    }

    fn filtered(&self, keep: impl Fn(&ChangeEvent) -> bool) -> Vec<ChangeEvent> {
        self.with_events(|events| events.iter().rev().filter(|e| keep(e)).cloned().collect())
    }

    pub fn offers(&self) -> Vec<ChangeEvent> {
        self.filtered(|e| e.change_amount < Decimal::ZERO)
    }

    pub fn offers_in(&self, category: &str) -> Vec<ChangeEvent> {
        self.filtered(|e| e.change_amount < Decimal::ZERO && e.category.eq_ignore_ascii_case(category))
    }

    pub fn increases(&self) -> Vec<ChangeEvent> {
        self.filtered(|e| e.change_amount > Decimal::ZERO)
    }

    pub fn significant(&self, threshold: f64) -> Vec<ChangeEvent> {
        self.filtered(|e| e.change_percentage.abs() >= threshold)
    }

    pub fn for_item(&self, item_id: i64) -> Option<ChangeEvent> {
        self.with_events(|events| events.iter().rev().find(|e| e.item_id == item_id).cloned())
    }

    pub fn statistics(&self) -> ChangeStatistics {
        self.with_events(|events| {
            let total_changes = events.len();
            let increases = events
                .iter()
                .filter(|e| e.change_type == ChangeType::Increase)
                .count();
            let decreases = events
                .iter()
                .filter(|e| e.change_type == ChangeType::Decrease)
                .count();
            let average = if total_changes == 0 {
                0.0
            } else {
                events.iter().map(|e| e.change_percentage).sum::<f64>() / total_changes as f64
            };

            ChangeStatistics {
                total_changes,
                increases,
                decreases,
                average_change_percentage: (average * 100.0).round() / 100.0,
                last_updated: Utc::now(),
            }
        })
    }
}
