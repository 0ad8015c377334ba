//! Checkout session builder.
//!
//! Prices a cart in integer minor units, applies an optional coupon, asks
//! the payment gateway for a session, and issues a reward coupon when the
//! discounted total qualifies. Steps are ordered and short-circuit on the
//! first failure, so a rejected cart or coupon never reaches the gateway
//! and no partial session is left queryable.

use rust_decimal::Decimal;
use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use ironcart_core::{MinorUnits, UserId};

use crate::config::ServerConfig;
use crate::gateway::{CreateSessionRequest, GatewayError, PaymentGateway, SessionMetadata};
use crate::models::{CartLine, OrderLine};
use crate::services::coupon::{CouponError, CouponService};

/// Errors from building a checkout session.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Cart is empty or malformed.
    #[error("invalid cart: {0}")]
    InvalidCart(String),

    /// Coupon lookup or validation failed.
    #[error(transparent)]
    Coupon(#[from] CouponError),

    /// Gateway call failed.
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// What the client needs to hand off to the gateway's payment page.
#[derive(Debug)]
pub struct CheckoutSummary {
    /// Gateway-issued session id.
    pub session_id: String,
    /// Post-discount total, minor units.
    pub total: MinorUnits,
    /// Post-discount total in major units, for display.
    pub total_major: Decimal,
}

/// Builds gateway checkout sessions from priced carts.
pub struct CheckoutService<'a> {
    coupons: CouponService<'a>,
    gateway: &'a dyn PaymentGateway,
    config: &'a ServerConfig,
}

impl<'a> CheckoutService<'a> {
    /// Create a new checkout service.
    #[must_use]
    pub const fn new(
        pool: &'a PgPool,
        gateway: &'a dyn PaymentGateway,
        config: &'a ServerConfig,
    ) -> Self {
        Self {
            coupons: CouponService::new(pool, config.coupon),
            gateway,
            config,
        }
    }

    /// Price the cart, apply the coupon, and open a gateway session.
    ///
    /// Coupon issuance runs at session creation, before payment lands;
    /// an abandoned checkout that crossed the threshold still earns its
    /// owner a coupon. That is the intended business behavior.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::InvalidCart` for an empty/malformed cart,
    /// `CheckoutError::Coupon` when a supplied code fails validation, and
    /// `CheckoutError::Gateway` when the gateway call fails.
    #[instrument(skip(self, lines, coupon_code), fields(owner = %owner, lines = lines.len()))]
    pub async fn create_session(
        &self,
        owner: UserId,
        lines: Vec<CartLine>,
        coupon_code: Option<String>,
    ) -> Result<CheckoutSummary, CheckoutError> {
        validate_cart(&lines)?;
        let gross = price_cart(&lines)?;

        let mut total = gross;
        let mut discount_percentage = None;
        if let Some(code) = &coupon_code {
            let coupon = self.coupons.validate(owner, code).await?;
            total = gross.percent_off(coupon.discount_percentage);
            discount_percentage = Some(coupon.discount_percentage);
        }

        let metadata = SessionMetadata {
            user_id: owner,
            coupon_code,
            items: lines.iter().map(snapshot_line).collect(),
        };

        let request = CreateSessionRequest {
            line_items: lines,
            discount_percentage,
            success_url: format!(
                "{}/purchase-success?session_id={{CHECKOUT_SESSION_ID}}",
                self.config.client_url
            ),
            cancel_url: format!("{}/purchase-cancel", self.config.client_url),
            metadata,
        };

        let session = self.gateway.create_checkout_session(&request).await?;

        self.coupons.issue_if_qualifying(owner, total).await?;

        tracing::info!(session_id = %session.id, total = %total, "checkout session created");

        Ok(CheckoutSummary {
            session_id: session.id,
            total,
            total_major: total.to_major(),
        })
    }
}

/// Snapshot a cart line for the session metadata.
fn snapshot_line(line: &CartLine) -> OrderLine {
    OrderLine {
        product_id: line.product_id.clone(),
        quantity: line.quantity,
        unit_price: line.unit_price,
    }
}

/// Reject empty carts and malformed lines before any side effect.
fn validate_cart(lines: &[CartLine]) -> Result<(), CheckoutError> {
    if lines.is_empty() {
        return Err(CheckoutError::InvalidCart("cart is empty".to_owned()));
    }

    for line in lines {
        if line.quantity == 0 {
            return Err(CheckoutError::InvalidCart(format!(
                "non-positive quantity for product {}",
                line.product_id
            )));
        }
        if line.unit_price < Decimal::ZERO {
            return Err(CheckoutError::InvalidCart(format!(
                "negative unit price for product {}",
                line.product_id
            )));
        }
    }

    Ok(())
}

/// Total the cart in minor units.
///
/// Each line is rounded to minor units individually and multiplied by its
/// quantity before summation, so float-style drift cannot compound across
/// many lines.
fn price_cart(lines: &[CartLine]) -> Result<MinorUnits, CheckoutError> {
    lines.iter().try_fold(MinorUnits::ZERO, |sum, line| {
        let line_total = MinorUnits::line_total(line.unit_price, line.quantity)
            .ok_or_else(|| {
                CheckoutError::InvalidCart(format!(
                    "unrepresentable price for product {}",
                    line.product_id
                ))
            })?;
        sum.checked_add(line_total)
            .ok_or_else(|| CheckoutError::InvalidCart("cart total overflows".to_owned()))
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn line(product_id: &str, price: &str, quantity: u32) -> CartLine {
        CartLine {
            product_id: product_id.to_owned(),
            name: format!("Product {product_id}"),
            image: None,
            unit_price: Decimal::from_str(price).unwrap(),
            quantity,
        }
    }

    #[test]
    fn test_empty_cart_rejected() {
        assert!(matches!(
            validate_cart(&[]),
            Err(CheckoutError::InvalidCart(_))
        ));
    }

    #[test]
    fn test_zero_quantity_rejected() {
        assert!(matches!(
            validate_cart(&[line("p1", "10.00", 0)]),
            Err(CheckoutError::InvalidCart(_))
        ));
    }

    #[test]
    fn test_negative_price_rejected() {
        assert!(matches!(
            validate_cart(&[line("p1", "-1.00", 1)]),
            Err(CheckoutError::InvalidCart(_))
        ));
    }

    #[test]
    fn test_price_cart_single_line() {
        let total = price_cart(&[line("p1", "150.00", 1)]).unwrap();
        assert_eq!(total.as_i64(), 15000);
    }

    #[test]
    fn test_price_cart_sums_lines() {
        let total = price_cart(&[line("p1", "19.99", 2), line("p2", "0.01", 3)]).unwrap();
        assert_eq!(total.as_i64(), 3998 + 3);
    }

    #[test]
    fn test_price_cart_rounds_per_line_before_summing() {
        // Two lines at 0.005 each: rounded per line (1 + 1 = 2), not after
        // summation (round(0.01 * 100) = 1)
        let total = price_cart(&[line("p1", "0.005", 1), line("p2", "0.005", 1)]).unwrap();
        assert_eq!(total.as_i64(), 2);
    }

    #[test]
    fn test_discount_applied_to_presum_total() {
        // 10% off a 10000-minor-unit cart is one post-sum rounding step
        let total = price_cart(&[line("p1", "60.00", 1), line("p2", "40.00", 1)]).unwrap();
        assert_eq!(total.percent_off(10).as_i64(), 9000);
    }
}
