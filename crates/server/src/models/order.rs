//! Settled order model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use ironcart_core::{MinorUnits, OrderId, UserId};

/// One line of a settled order.
///
/// A snapshot taken at session-creation time, not a live catalog
/// reference.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

/// A finalized order, created exactly once per gateway session.
///
/// Never mutated after settlement. `source_session_id` is unique in the
/// database, which is what makes repeated settlement calls safe.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub line_items: Vec<OrderLine>,
    pub total_minor_units: MinorUnits,
    pub source_session_id: String,
    pub created_at: DateTime<Utc>,
}
