//! Coupon repository.
//!
//! The `coupons` table carries a unique constraint on `user_id`, so the
//! at-most-one-coupon-per-owner invariant is enforced by the database and
//! reissuing is a single atomic upsert rather than a delete-then-insert
//! pair that could race.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use ironcart_core::{CouponId, UserId};

use super::RepositoryError;
use crate::models::Coupon;

/// Raw database row for a coupon.
#[derive(sqlx::FromRow)]
struct CouponRow {
    id: i32,
    user_id: i32,
    code: String,
    discount_percentage: i16,
    expires_at: DateTime<Utc>,
    is_active: bool,
}

impl CouponRow {
    fn into_coupon(self) -> Result<Coupon, RepositoryError> {
        let discount_percentage = u8::try_from(self.discount_percentage).map_err(|_| {
            RepositoryError::DataCorruption(format!(
                "discount percentage out of range: {}",
                self.discount_percentage
            ))
        })?;

        Ok(Coupon {
            id: CouponId::new(self.id),
            user_id: UserId::new(self.user_id),
            code: self.code,
            discount_percentage,
            expires_at: self.expires_at,
            is_active: self.is_active,
        })
    }
}

const COUPON_COLUMNS: &str = "id, user_id, code, discount_percentage, expires_at, is_active";

/// Repository for coupon database operations.
pub struct CouponRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CouponRepository<'a> {
    /// Create a new coupon repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get the owner's active coupon, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_active(&self, owner: UserId) -> Result<Option<Coupon>, RepositoryError> {
        let row = sqlx::query_as::<_, CouponRow>(&format!(
            "SELECT {COUPON_COLUMNS} FROM coupons WHERE user_id = $1 AND is_active"
        ))
        .bind(owner.as_i32())
        .fetch_optional(self.pool)
        .await?;

        row.map(CouponRow::into_coupon).transpose()
    }

    /// Find an active coupon matching both owner and code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_active(
        &self,
        owner: UserId,
        code: &str,
    ) -> Result<Option<Coupon>, RepositoryError> {
        let row = sqlx::query_as::<_, CouponRow>(&format!(
            "SELECT {COUPON_COLUMNS} FROM coupons WHERE user_id = $1 AND code = $2 AND is_active"
        ))
        .bind(owner.as_i32())
        .bind(code)
        .fetch_optional(self.pool)
        .await?;

        row.map(CouponRow::into_coupon).transpose()
    }

    /// Deactivate the named coupon. Returns whether a row was updated.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn deactivate(&self, owner: UserId, code: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE coupons SET is_active = FALSE WHERE user_id = $1 AND code = $2",
        )
        .bind(owner.as_i32())
        .bind(code)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Atomically replace the owner's coupon (active or not) with a fresh
    /// active one.
    ///
    /// Safe to call when no coupon exists yet; the `user_id` unique
    /// constraint serializes concurrent calls per owner.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn replace_for_owner(
        &self,
        owner: UserId,
        code: &str,
        discount_percentage: u8,
        expires_at: DateTime<Utc>,
    ) -> Result<Coupon, RepositoryError> {
        let row = sqlx::query_as::<_, CouponRow>(&format!(
            r"
            INSERT INTO coupons (user_id, code, discount_percentage, expires_at, is_active)
            VALUES ($1, $2, $3, $4, TRUE)
            ON CONFLICT (user_id) DO UPDATE
            SET code = EXCLUDED.code,
                discount_percentage = EXCLUDED.discount_percentage,
                expires_at = EXCLUDED.expires_at,
                is_active = TRUE,
                created_at = now()
            RETURNING {COUPON_COLUMNS}
            "
        ))
        .bind(owner.as_i32())
        .bind(code)
        .bind(i16::from(discount_percentage))
        .bind(expires_at)
        .fetch_one(self.pool)
        .await?;

        row.into_coupon()
    }
}
