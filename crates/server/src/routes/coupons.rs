//! Coupon endpoints.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::{
    error::Result, middleware::RequireAuth, models::coupon::Coupon,
    services::coupon::CouponService, state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub code: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResponse {
    pub message: &'static str,
    pub code: String,
    pub discount_percentage: u8,
}

/// `GET /api/coupons`
///
/// The caller's active coupon, or `null` when they have none.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn get_coupon(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Option<Coupon>>> {
    let coupons = CouponService::new(state.pool(), state.config().coupon);
    let coupon = coupons.get_active(user.id).await?;
    Ok(Json(coupon))
}

/// `POST /api/coupons/validate`
///
/// Checks that the given code names the caller's active, unexpired
/// coupon and reports its discount. Does not consume it.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn validate_coupon(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<ValidateRequest>,
) -> Result<Json<ValidateResponse>> {
    let coupons = CouponService::new(state.pool(), state.config().coupon);
    let coupon = coupons.validate(user.id, &body.code).await?;

    Ok(Json(ValidateResponse {
        message: "coupon is valid",
        code: coupon.code,
        discount_percentage: coupon.discount_percentage,
    }))
}
