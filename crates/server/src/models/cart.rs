//! Cart line items as submitted by the client.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One line of a cart in a checkout request.
///
/// `unit_price` is taken as sent by the client; the API contract trusts
/// cart payload prices rather than re-reading the catalog. Quantity and
/// shape are validated before any side effect.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    /// Catalog product identifier.
    pub product_id: String,
    /// Display name forwarded to the payment gateway.
    pub name: String,
    /// Optional product image URL forwarded to the gateway.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Price per unit in major currency units (e.g., dollars).
    pub unit_price: Decimal,
    /// Number of units; must be positive.
    pub quantity: u32,
}
