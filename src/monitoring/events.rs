use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::{Item, ItemId};
use crate::core::{MonitorError, MonitorResult};

pub const POLLING_REASON: &str = "external change detected via polling";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeType {
    Initial,
    Increase,
    Decrease,
    /// Reserved for price-cleared transitions; polling never emits it.
    Reset,
}

/// Outbound record describing one detected price transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub event_id: Uuid,
    pub item_id: ItemId,
    pub item_name: String,
    pub category: String,
    pub old_price: Option<Decimal>,
    pub new_price: Decimal,
    pub change_amount: Decimal,
    pub change_percentage: f64,
    pub change_type: ChangeType,
    pub occurred_at: DateTime<Utc>,
    pub reason: String,
}

impl ChangeEvent {
    pub fn from_prices(
        item: &Item,
        old_price: Option<Decimal>,
        new_price: Decimal,
        reason: impl Into<String>,
    ) -> MonitorResult<Self> {
        let (change_amount, change_percentage, change_type) = match old_price {
            Some(old) => {
                let amount = new_price
                    .checked_sub(old)
                    .ok_or_else(|| MonitorError::InvalidItem {
                        item_id: item.id,
                        reason: format!("price change {} -> {} is out of range", old, new_price),
                    })?;
                let change_type = if amount > Decimal::ZERO {
                    ChangeType::Increase
                } else {
                    ChangeType::Decrease
                };
                (amount, change_percentage(amount, old), change_type)
            }
            None => (Decimal::ZERO, 0.0, ChangeType::Initial),
        };

        Ok(Self {
            event_id: Uuid::new_v4(),
            item_id: item.id,
            item_name: item.name.clone(),
            category: item.category.clone(),
            old_price,
            new_price,
            change_amount,
            change_percentage,
            change_type,
            occurred_at: Utc::now(),
            reason: reason.into(),
        })
    }
}

/// Ratio rounded half-up to four places, then scaled to a percentage.
/// Zero unless the old price is strictly positive.
///
/// Ratios beyond what `Decimal` can hold are computed in `f64` instead;
/// four-place rounding is meaningless at that magnitude anyway.
pub fn change_percentage(amount: Decimal, old_price: Decimal) -> f64 {
    if old_price <= Decimal::ZERO {
        return 0.0;
    }
    let exact = amount
        .checked_div(old_price)
        .map(|ratio| ratio.round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .and_then(|pct| pct.to_f64());

    match exact {
        Some(pct) => pct,
        None => {
            let amount = amount.to_f64().unwrap_or(0.0);
            let old = old_price.to_f64().unwrap_or(0.0);
            if old == 0.0 {
                0.0
            } else {
                amount / old * 100.0
            }
        }
    }
}
