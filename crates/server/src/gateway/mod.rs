//! Payment gateway collaborator contract.
//!
//! The gateway is an opaque external service: we hand it line items,
//! redirect targets, an optional discount reference, and a metadata blob,
//! and it hands back a session id. Settlement later reads the session back
//! and trusts the gateway's payment status and total. The metadata must be
//! sufficient to rebuild the order without re-querying any cart.

mod stripe;

pub use stripe::StripeGateway;

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use ironcart_core::{MinorUnits, UserId};

use crate::models::{CartLine, OrderLine};

/// Errors from gateway calls.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The gateway could not be reached or answered with a server-side
    /// failure; the caller may retry.
    #[error("payment gateway unavailable: {0}")]
    Unavailable(String),

    /// The gateway answered but the response violates the expected
    /// contract.
    #[error("payment gateway protocol error: {0}")]
    Protocol(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// Opaque blob attached to a checkout session, echoed back on retrieval.
///
/// Carries everything settlement needs: the owner, the applied coupon code
/// (if any), and a snapshot of the requested line items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionMetadata {
    pub user_id: UserId,
    pub coupon_code: Option<String>,
    pub items: Vec<OrderLine>,
}

impl SessionMetadata {
    /// Encode as the gateway's string-to-string metadata map.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Protocol` if the item snapshot cannot be
    /// serialized.
    pub fn to_string_map(&self) -> Result<HashMap<String, String>, GatewayError> {
        let items = serde_json::to_string(&self.items)
            .map_err(|e| GatewayError::Protocol(format!("metadata snapshot encode: {e}")))?;

        Ok(HashMap::from([
            ("user_id".to_owned(), self.user_id.to_string()),
            (
                "coupon_code".to_owned(),
                self.coupon_code.clone().unwrap_or_default(),
            ),
            ("items".to_owned(), items),
        ]))
    }

    /// Decode from the gateway's echoed metadata map.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Protocol` if required keys are missing or
    /// malformed.
    pub fn from_string_map(map: &HashMap<String, String>) -> Result<Self, GatewayError> {
        let user_id = map
            .get("user_id")
            .ok_or_else(|| GatewayError::Protocol("metadata missing user_id".to_owned()))?
            .parse::<i32>()
            .map_err(|e| GatewayError::Protocol(format!("metadata user_id: {e}")))?;

        let coupon_code = map
            .get("coupon_code")
            .filter(|code| !code.is_empty())
            .cloned();

        let items_raw = map
            .get("items")
            .ok_or_else(|| GatewayError::Protocol("metadata missing items".to_owned()))?;
        let items: Vec<OrderLine> = serde_json::from_str(items_raw)
            .map_err(|e| GatewayError::Protocol(format!("metadata snapshot decode: {e}")))?;

        Ok(Self {
            user_id: UserId::new(user_id),
            coupon_code,
            items,
        })
    }
}

/// Request to open a checkout session.
///
/// Line items carry undiscounted prices; the discount travels as a
/// gateway-native percent-off reference so the gateway computes its own
/// authoritative total.
#[derive(Debug, Clone)]
pub struct CreateSessionRequest {
    pub line_items: Vec<CartLine>,
    pub discount_percentage: Option<u8>,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: SessionMetadata,
}

/// A newly-created checkout session.
#[derive(Debug, Clone)]
pub struct CreatedSession {
    pub id: String,
}

/// Payment state of a retrieved session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentStatus {
    Paid,
    Unpaid,
    NoPaymentRequired,
}

impl PaymentStatus {
    fn parse(raw: &str) -> Result<Self, GatewayError> {
        match raw {
            "paid" => Ok(Self::Paid),
            "unpaid" => Ok(Self::Unpaid),
            "no_payment_required" => Ok(Self::NoPaymentRequired),
            other => Err(GatewayError::Protocol(format!(
                "unknown payment status: {other}"
            ))),
        }
    }
}

/// A retrieved session: status, authoritative total, echoed metadata.
#[derive(Debug, Clone)]
pub struct SessionDetails {
    pub id: String,
    pub payment_status: PaymentStatus,
    pub amount_total: MinorUnits,
    pub metadata: SessionMetadata,
}

/// The payment gateway seam.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a checkout session; returns its gateway-issued id.
    async fn create_checkout_session(
        &self,
        request: &CreateSessionRequest,
    ) -> Result<CreatedSession, GatewayError>;

    /// Retrieve a session's payment status, total, and metadata.
    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<SessionDetails, GatewayError>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn metadata() -> SessionMetadata {
        SessionMetadata {
            user_id: UserId::new(42),
            coupon_code: Some("GIFTAB12CD".to_owned()),
            items: vec![OrderLine {
                product_id: "prod_1".to_owned(),
                quantity: 2,
                unit_price: Decimal::new(1999, 2),
            }],
        }
    }

    #[test]
    fn test_metadata_map_shape() {
        let map = metadata().to_string_map().unwrap();
        assert_eq!(map.get("user_id").map(String::as_str), Some("42"));
        assert_eq!(
            map.get("coupon_code").map(String::as_str),
            Some("GIFTAB12CD")
        );
        assert!(map.get("items").is_some_and(|s| s.contains("prod_1")));
    }

    #[test]
    fn test_metadata_empty_coupon_is_none() {
        let map = HashMap::from([
            ("user_id".to_owned(), "7".to_owned()),
            ("coupon_code".to_owned(), String::new()),
            (
                "items".to_owned(),
                r#"[{"productId":"p","quantity":1,"unitPrice":"10.00"}]"#.to_owned(),
            ),
        ]);

        let parsed = SessionMetadata::from_string_map(&map).unwrap();
        assert_eq!(parsed.user_id, UserId::new(7));
        assert_eq!(parsed.coupon_code, None);
        assert_eq!(parsed.items.len(), 1);
        assert_eq!(parsed.items.first().unwrap().unit_price, Decimal::new(1000, 2));
    }

    #[test]
    fn test_metadata_roundtrip_carries_snapshot() {
        let original = metadata();
        let parsed = SessionMetadata::from_string_map(&original.to_string_map().unwrap()).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_metadata_missing_keys_rejected() {
        let map = HashMap::from([("user_id".to_owned(), "1".to_owned())]);
        assert!(matches!(
            SessionMetadata::from_string_map(&map),
            Err(GatewayError::Protocol(_))
        ));
    }

    #[test]
    fn test_payment_status_parse() {
        assert_eq!(PaymentStatus::parse("paid").unwrap(), PaymentStatus::Paid);
        assert_eq!(
            PaymentStatus::parse("unpaid").unwrap(),
            PaymentStatus::Unpaid
        );
        assert!(PaymentStatus::parse("definitely-not").is_err());
    }
}
