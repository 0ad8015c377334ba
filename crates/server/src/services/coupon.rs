//! Coupon service (incentive manager).
//!
//! Owns the coupon lifecycle: issued when a qualifying checkout total is
//! reached, consumed on confirmed payment, or lazily expired on the first
//! validation past the expiry date. Other services never touch coupon rows
//! directly.

use chrono::{Duration, Utc};
use rand::Rng;
use rand::distr::Alphanumeric;
use sqlx::PgPool;
use thiserror::Error;

use ironcart_core::{MinorUnits, UserId};

use crate::config::CouponConfig;
use crate::db::RepositoryError;
use crate::db::coupons::CouponRepository;
use crate::models::Coupon;

/// Prefix of generated coupon codes.
const CODE_PREFIX: &str = "GIFT";

/// Random characters appended to the prefix.
const CODE_RANDOM_LEN: usize = 6;

/// Errors from coupon operations.
#[derive(Debug, Error)]
pub enum CouponError {
    /// No active coupon matches the owner and code.
    #[error("coupon not found")]
    NotFound,

    /// The coupon was found but has expired; it has been deactivated.
    #[error("coupon expired")]
    Expired,

    /// Repository/database error.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Service for coupon validation, issuance, and consumption.
pub struct CouponService<'a> {
    coupons: CouponRepository<'a>,
    config: CouponConfig,
}

impl<'a> CouponService<'a> {
    /// Create a new coupon service.
    #[must_use]
    pub const fn new(pool: &'a PgPool, config: CouponConfig) -> Self {
        Self {
            coupons: CouponRepository::new(pool),
            config,
        }
    }

    /// The owner's active coupon, if any.
    ///
    /// # Errors
    ///
    /// Returns `CouponError::Repository` on database failure.
    pub async fn get_active(&self, owner: UserId) -> Result<Option<Coupon>, CouponError> {
        Ok(self.coupons.get_active(owner).await?)
    }

    /// Validate a coupon code for an owner.
    ///
    /// An active coupon past its expiry date is deactivated as a side
    /// effect and reported as `Expired` (lazy expiration; there is no
    /// background sweep). Once deactivated, later validations of the same
    /// code report `NotFound`, since only active rows are looked up.
    ///
    /// # Errors
    ///
    /// Returns `CouponError::NotFound`, `Expired`, or `Repository`.
    pub async fn validate(&self, owner: UserId, code: &str) -> Result<Coupon, CouponError> {
        let coupon = self
            .coupons
            .find_active(owner, code)
            .await?
            .ok_or(CouponError::NotFound)?;

        if coupon.is_expired_at(Utc::now()) {
            self.coupons.deactivate(owner, code).await?;
            tracing::info!(owner = %owner, code, "coupon expired, deactivated");
            return Err(CouponError::Expired);
        }

        Ok(coupon)
    }

    /// Issue a fresh coupon when the checkout total qualifies.
    ///
    /// Replaces any existing coupon for the owner in one atomic upsert;
    /// safe to call when none exists. Returns the new coupon when one was
    /// issued.
    ///
    /// # Errors
    ///
    /// Returns `CouponError::Repository` on database failure.
    pub async fn issue_if_qualifying(
        &self,
        owner: UserId,
        total: MinorUnits,
    ) -> Result<Option<Coupon>, CouponError> {
        if total.as_i64() < self.config.threshold_minor_units {
            return Ok(None);
        }

        let code = generate_code();
        let expires_at = Utc::now() + Duration::days(self.config.validity_days);
        let coupon = self
            .coupons
            .replace_for_owner(owner, &code, self.config.discount_percentage, expires_at)
            .await?;

        tracing::info!(owner = %owner, code = %coupon.code, "reward coupon issued");
        Ok(Some(coupon))
    }

    /// Deactivate the named coupon after a confirmed payment.
    ///
    /// Lenient on purpose: a missing row is logged and ignored so a
    /// settlement never fails because its coupon was already consumed.
    ///
    /// # Errors
    ///
    /// Returns `CouponError::Repository` on database failure.
    pub async fn consume(&self, owner: UserId, code: &str) -> Result<(), CouponError> {
        let deactivated = self.coupons.deactivate(owner, code).await?;
        if deactivated {
            tracing::info!(owner = %owner, code, "coupon consumed");
        } else {
            tracing::warn!(owner = %owner, code, "consume found no matching coupon");
        }
        Ok(())
    }
}

/// Generate a pseudo-random coupon code, e.g. `GIFTX3K9QZ`.
fn generate_code() -> String {
    let random: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(CODE_RANDOM_LEN)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect();

    format!("{CODE_PREFIX}{random}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_code_shape() {
        let code = generate_code();
        assert!(code.starts_with(CODE_PREFIX));
        assert_eq!(code.len(), CODE_PREFIX.len() + CODE_RANDOM_LEN);
        assert!(
            code.chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        );
    }

    #[test]
    fn test_generated_codes_differ() {
        // Pseudo-random, 36^6 space: two draws colliding means the
        // generator is broken
        assert_ne!(generate_code(), generate_code());
    }
}
