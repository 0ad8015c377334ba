//! Reward coupon model.

use chrono::{DateTime, Utc};
use serde::Serialize;

use ironcart_core::{CouponId, UserId};

/// A single-use, owner-scoped percentage discount.
///
/// At most one coupon row exists per owner (`user_id` is unique in the
/// database); issuing a new coupon replaces the previous one atomically.
/// A coupon past `expires_at` is deactivated lazily, on the first
/// validation that observes the expiry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub id: CouponId,
    #[serde(skip)]
    pub user_id: UserId,
    pub code: String,
    pub discount_percentage: u8,
    #[serde(rename = "expirationDate")]
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
}

impl Coupon {
    /// Whether the coupon's expiry has passed at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use ironcart_core::{CouponId, UserId};

    fn coupon(expires_at: DateTime<Utc>) -> Coupon {
        Coupon {
            id: CouponId::new(1),
            user_id: UserId::new(1),
            code: "GIFT3X7K2M".to_string(),
            discount_percentage: 10,
            expires_at,
            is_active: true,
        }
    }

    #[test]
    fn test_expiry_window() {
        let now = Utc::now();
        assert!(coupon(now - Duration::seconds(1)).is_expired_at(now));
        assert!(!coupon(now + Duration::days(30)).is_expired_at(now));
    }
}
