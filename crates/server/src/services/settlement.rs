//! Settlement handler.
//!
//! Converts a confirmed gateway payment into a persisted order, exactly
//! once. The handler is triggered by whoever learns of the payment first -
//! the redirected client or a gateway callback - and behaves identically
//! for both. Idempotency comes from the `source_session_id` uniqueness
//! constraint, not from trusting callers to call once.

use sqlx::PgPool;
use thiserror::Error;
use tracing::instrument;

use crate::config::CouponConfig;
use crate::db::RepositoryError;
use crate::db::orders::{OrderInsert, OrderRepository};
use crate::gateway::{GatewayError, PaymentGateway, PaymentStatus};
use crate::models::Order;
use crate::services::coupon::{CouponError, CouponService};

/// Errors from settlement.
///
/// Every variant is retryable from the caller's perspective: a failure
/// after the gateway confirmed payment but before the order row landed
/// must surface so the settlement is retried, never dropped.
#[derive(Debug, Error)]
pub enum SettlementError {
    /// Gateway retrieval failed.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Coupon consumption failed.
    #[error(transparent)]
    Coupon(#[from] CouponError),

    /// Order persistence failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Result of a settlement attempt.
#[derive(Debug)]
pub enum SettlementOutcome {
    /// The session exists but has not been paid; nothing was done.
    /// Confirmation may legitimately be checked before payment lands.
    Pending,

    /// An order exists for this session. `already_settled` tells whether
    /// this call created it or found it from an earlier settlement.
    Settled {
        order: Order,
        already_settled: bool,
    },
}

/// Settles paid gateway sessions into orders.
pub struct SettlementService<'a> {
    coupons: CouponService<'a>,
    orders: OrderRepository<'a>,
    gateway: &'a dyn PaymentGateway,
}

impl<'a> SettlementService<'a> {
    /// Create a new settlement service.
    #[must_use]
    pub const fn new(
        pool: &'a PgPool,
        gateway: &'a dyn PaymentGateway,
        coupon_config: CouponConfig,
    ) -> Self {
        Self {
            coupons: CouponService::new(pool, coupon_config),
            orders: OrderRepository::new(pool),
            gateway,
        }
    }

    /// Settle a session by id.
    ///
    /// Retrieves the session from the gateway; a non-paid session is a
    /// no-op reported as [`SettlementOutcome::Pending`]. For a paid
    /// session the metadata coupon (if any) is consumed, the order lines
    /// are rebuilt from the metadata snapshot, and one order row is
    /// persisted with the gateway-reported total as the authoritative
    /// amount. A repeat call returns the existing order with
    /// `already_settled = true`.
    ///
    /// # Errors
    ///
    /// Returns `SettlementError`; all variants are safe to retry.
    #[instrument(skip(self))]
    pub async fn settle(&self, session_id: &str) -> Result<SettlementOutcome, SettlementError> {
        let session = self.gateway.retrieve_checkout_session(session_id).await?;

        if session.payment_status != PaymentStatus::Paid {
            tracing::debug!(session_id, status = ?session.payment_status, "session not paid yet");
            return Ok(SettlementOutcome::Pending);
        }

        let owner = session.metadata.user_id;

        if let Some(code) = &session.metadata.coupon_code {
            self.coupons.consume(owner, code).await?;
        }

        let insert = self
            .orders
            .create_for_session(
                owner,
                &session.metadata.items,
                session.amount_total,
                session_id,
            )
            .await?;

        let (order, already_settled) = match insert {
            OrderInsert::Created(order) => (order, false),
            OrderInsert::AlreadyExists(order) => (order, true),
        };

        if already_settled {
            tracing::info!(session_id, order_id = %order.id, "session already settled");
        } else {
            tracing::info!(session_id, order_id = %order.id, "order created");
        }

        Ok(SettlementOutcome::Settled {
            order,
            already_settled,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use async_trait::async_trait;
    use sqlx::postgres::PgPoolOptions;

    use ironcart_core::{MinorUnits, UserId};

    use super::*;
    use crate::gateway::{CreateSessionRequest, CreatedSession, SessionDetails, SessionMetadata};

    /// Gateway double that reports every session as not yet paid.
    struct UnpaidGateway;

    #[async_trait]
    impl PaymentGateway for UnpaidGateway {
        async fn create_checkout_session(
            &self,
            _request: &CreateSessionRequest,
        ) -> Result<CreatedSession, GatewayError> {
            Err(GatewayError::Protocol("create not expected here".to_owned()))
        }

        async fn retrieve_checkout_session(
            &self,
            session_id: &str,
        ) -> Result<SessionDetails, GatewayError> {
            Ok(SessionDetails {
                id: session_id.to_owned(),
                payment_status: PaymentStatus::Unpaid,
                amount_total: MinorUnits::ZERO,
                metadata: SessionMetadata {
                    user_id: UserId::new(1),
                    coupon_code: None,
                    items: vec![],
                },
            })
        }
    }

    #[tokio::test]
    async fn test_unpaid_session_is_a_pending_no_op() {
        // Lazy pool: never connects, because an unpaid session must
        // short-circuit before any coupon or order access
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        let gateway = UnpaidGateway;

        let service = SettlementService::new(&pool, &gateway, CouponConfig::default());
        let outcome = service.settle("cs_wait_1").await.unwrap();

        assert!(matches!(outcome, SettlementOutcome::Pending));
    }
}
