pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::MonitorResult;

pub use sqlite::SqliteCatalog;

pub type ItemId = i64;

/// A catalog item as the store reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub category: String,
    pub current_price: Option<Decimal>,
    pub last_modified: DateTime<Utc>,
    pub revision: i64,
}

/// Read side of the catalog store consumed by the scan engine.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Items with `last_modified >= since`, in the order they should be diffed.
    async fn find_changed_since(&self, since: DateTime<Utc>) -> MonitorResult<Vec<Item>>;

    async fn find_all_active(&self) -> MonitorResult<Vec<Item>>;
}
