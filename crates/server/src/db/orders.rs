//! Order repository.
//!
//! `orders.source_session_id` is unique, so inserting the same gateway
//! session twice fails with a unique violation. Settlement maps that onto
//! "already settled" and returns the existing row instead of erroring.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::types::Json;

use ironcart_core::{MinorUnits, OrderId, UserId};

use super::{RepositoryError, is_unique_violation};
use crate::models::{Order, OrderLine};

/// Raw database row for an order.
#[derive(sqlx::FromRow)]
struct OrderRow {
    id: i32,
    user_id: i32,
    line_items: Json<Vec<OrderLine>>,
    total_minor_units: i64,
    source_session_id: String,
    created_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            id: OrderId::new(row.id),
            user_id: UserId::new(row.user_id),
            line_items: row.line_items.0,
            total_minor_units: MinorUnits::new(row.total_minor_units),
            source_session_id: row.source_session_id,
            created_at: row.created_at,
        }
    }
}

/// Result of an idempotent order insert.
#[derive(Debug)]
pub enum OrderInsert {
    /// A new order row was created by this call.
    Created(Order),
    /// An order for this session already existed; here it is.
    AlreadyExists(Order),
}

const ORDER_COLUMNS: &str =
    "id, user_id, line_items, total_minor_units, source_session_id, created_at";

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a settled order, treating a duplicate session as success.
    ///
    /// On a `source_session_id` unique violation the existing order is
    /// fetched and returned as [`OrderInsert::AlreadyExists`], so repeated
    /// settlement calls for one session converge on the same order id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails for any
    /// reason other than the duplicate-session case, and
    /// `RepositoryError::DataCorruption` if a duplicate is detected but
    /// the prior row cannot be found (constraint and data disagree).
    pub async fn create_for_session(
        &self,
        owner: UserId,
        line_items: &[OrderLine],
        total: MinorUnits,
        session_id: &str,
    ) -> Result<OrderInsert, RepositoryError> {
        let inserted = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            INSERT INTO orders (user_id, line_items, total_minor_units, source_session_id)
            VALUES ($1, $2, $3, $4)
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(owner.as_i32())
        .bind(Json(line_items))
        .bind(total.as_i64())
        .bind(session_id)
        .fetch_one(self.pool)
        .await;

        match inserted {
            Ok(row) => Ok(OrderInsert::Created(row.into())),
            Err(e) if is_unique_violation(&e) => {
                let existing = self.get_by_session(session_id).await?.ok_or_else(|| {
                    RepositoryError::DataCorruption(format!(
                        "duplicate settlement for session {session_id} but no order row found"
                    ))
                })?;
                Ok(OrderInsert::AlreadyExists(existing))
            }
            Err(e) => Err(RepositoryError::Database(e)),
        }
    }

    /// Get the order settled from a gateway session, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_session(
        &self,
        session_id: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE source_session_id = $1"
        ))
        .bind(session_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Order::from))
    }
}
