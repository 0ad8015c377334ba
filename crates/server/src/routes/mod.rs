//! API route handlers.

pub mod auth;
pub mod coupons;
pub mod payments;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Build the API router.
#[must_use]
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/signup", post(auth::signup))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/refresh", post(auth::refresh))
        .route("/api/auth/profile", get(auth::profile))
        .route("/api/coupons", get(coupons::get_coupon))
        .route("/api/coupons/validate", post(coupons::validate_coupon))
        .route(
            "/api/payments/checkout-session",
            post(payments::create_checkout_session),
        )
        .route(
            "/api/payments/checkout-success",
            post(payments::checkout_success),
        )
}
