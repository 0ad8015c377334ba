//! Checkout session creation and settlement endpoints.

use axum::{Json, extract::State};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use ironcart_core::OrderId;

use crate::{
    error::Result,
    middleware::RequireAuth,
    models::cart::CartLine,
    services::{
        checkout::CheckoutService,
        settlement::{SettlementOutcome, SettlementService},
    },
    state::AppState,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub products: Vec<CartLine>,
    #[serde(default)]
    pub coupon_code: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    /// Gateway session id the client redirects with.
    pub id: String,
    /// Post-discount total in major units.
    pub total_amount: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementRequest {
    pub session_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementResponse {
    pub success: bool,
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<OrderId>,
}

/// `POST /api/payments/checkout-session`
///
/// Prices the cart, applies the optional coupon, and opens a gateway
/// checkout session for the caller.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn create_checkout_session(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>> {
    let checkout = CheckoutService::new(state.pool(), state.gateway(), state.config());
    let summary = checkout
        .create_session(user.id, body.products, body.coupon_code)
        .await?;

    info!(session_id = %summary.session_id, total = %summary.total, "checkout session created");
    Ok(Json(CheckoutResponse {
        id: summary.session_id,
        total_amount: summary.total_major,
    }))
}

/// `POST /api/payments/checkout-success`
///
/// Settles a gateway session into an order. Identity comes from the
/// session metadata rather than a cookie, so the same endpoint serves
/// both the redirected client and a gateway callback. Safe to call
/// repeatedly for one session.
#[instrument(skip_all, fields(session_id = %body.session_id))]
pub async fn checkout_success(
    State(state): State<AppState>,
    Json(body): Json<SettlementRequest>,
) -> Result<Json<SettlementResponse>> {
    let settlement =
        SettlementService::new(state.pool(), state.gateway(), state.config().coupon);

    let response = match settlement.settle(&body.session_id).await? {
        SettlementOutcome::Pending => SettlementResponse {
            success: false,
            message: "payment has not completed",
            order_id: None,
        },
        SettlementOutcome::Settled {
            order,
            already_settled,
        } => {
            info!(order_id = %order.id, already_settled, "session settled");
            SettlementResponse {
                success: true,
                message: if already_settled {
                    "order already recorded for this session"
                } else {
                    "payment successful and order created"
                },
                order_id: Some(order.id),
            }
        }
    };

    Ok(Json(response))
}
