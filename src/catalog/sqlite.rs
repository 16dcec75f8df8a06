use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;

use super::{CatalogStore, Item, ItemId};
use crate::core::{MonitorError, MonitorResult};

const ITEM_COLUMNS: &str = "id, name, category, price, last_modified, version";

/// Catalog store backed by a SQLite `products` table.
///
/// Prices are kept as TEXT so decimals survive untouched; `last_modified`
/// is stored as epoch milliseconds so range queries compare numerically.
pub struct SqliteCatalog {
    pool: SqlitePool,
}

impl SqliteCatalog {
    pub async fn connect(database_url: &str) -> MonitorResult<Self> {
        let in_memory = database_url.contains(":memory:");

        if !in_memory {
            let path = database_url
                .trim_start_matches("sqlite://")
                .trim_start_matches("sqlite:")
                .split('?')
                .next()
                .unwrap_or_default();
            if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        MonitorError::Catalog(format!("cannot create {}: {}", parent.display(), e))
                    })?;
                }
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        // Every pooled connection to :memory: would open its own empty database.
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 5 })
            .connect_with(options)
            .await?;

        let catalog = Self { pool };
        catalog.initialize_schema().await?;

        Ok(catalog)
    }

    async fn initialize_schema(&self) -> MonitorResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS products (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                category TEXT NOT NULL,
                price TEXT,
                active INTEGER NOT NULL DEFAULT 1,
                last_modified INTEGER NOT NULL,
                version INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_products_last_modified
            ON products(last_modified, id)
            "#,
        )
        .execute(&self.pool)
        .await?;

        tracing::info!("catalog schema initialized");

        Ok(())
    }

    pub async fn upsert_item(&self, item: &Item, active: bool) -> MonitorResult<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, category, price, active, last_modified, version)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                category = excluded.category,
                price = excluded.price,
                active = excluded.active,
                last_modified = excluded.last_modified,
                version = excluded.version
            "#,
        )
        .bind(item.id)
        .bind(&item.name)
        .bind(&item.category)
        .bind(item.current_price.map(|p| p.to_string()))
        .bind(active)
        .bind(item.last_modified.timestamp_millis())
        .bind(item.revision)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Changes an item's price, bumping its version and modification time.
    /// Returns false when the item does not exist.
    pub async fn set_price(
        &self,
        id: ItemId,
        price: Option<Decimal>,
        at: DateTime<Utc>,
    ) -> MonitorResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET price = ?, last_modified = ?, version = version + 1
            WHERE id = ?
            "#,
        )
        .bind(price.map(|p| p.to_string()))
        .bind(at.timestamp_millis())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    fn collect_items(rows: Vec<SqliteRow>) -> MonitorResult<Vec<Item>> {
        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(item) = Self::row_to_item(&row)? {
                items.push(item);
            }
        }
        Ok(items)
    }

    fn row_to_item(row: &SqliteRow) -> MonitorResult<Option<Item>> {
        let id: i64 = row.try_get("id")?;
        let raw_price: Option<String> = row.try_get("price")?;
        let modified_ms: i64 = row.try_get("last_modified")?;

        let current_price = match raw_price {
            Some(raw) => match Decimal::from_str(raw.trim()) {
                Ok(price) => Some(price),
                Err(e) => {
                    tracing::warn!(item_id = id, price = %raw, "skipping row with unparsable price: {}", e);
                    return Ok(None);
                }
            },
            None => None,
        };

        let Some(last_modified) = Utc.timestamp_millis_opt(modified_ms).single() else {
            tracing::warn!(item_id = id, modified_ms, "skipping row with out-of-range timestamp");
            return Ok(None);
        };

        Ok(Some(Item {
            id,
            name: row.try_get("name")?,
            category: row.try_get("category")?,
            current_price,
            last_modified,
            revision: row.try_get("version")?,
        }))
    }
}

#[async_trait]
impl CatalogStore for SqliteCatalog {
    async fn find_changed_since(&self, since: DateTime<Utc>) -> MonitorResult<Vec<Item>> {
        let sql = format!(
            "SELECT {} FROM products WHERE last_modified >= ? ORDER BY last_modified ASC, id ASC",
            ITEM_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(since.timestamp_millis())
            .fetch_all(&self.pool)
            .await?;

        Self::collect_items(rows)
    }

    async fn find_all_active(&self) -> MonitorResult<Vec<Item>> {
        let sql = format!(
            "SELECT {} FROM products WHERE active = 1 ORDER BY id ASC",
            ITEM_COLUMNS
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;

        Self::collect_items(rows)
    }
}
