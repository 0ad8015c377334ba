//! Unified error handling with Sentry integration.
//!
//! Service-layer errors converge on one `AppError` that maps onto the API
//! error taxonomy. Server-side failures are captured to Sentry before the
//! response is written; client errors are not. All route handlers return
//! `Result<T, AppError>`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::gateway::GatewayError;
use crate::services::auth::AuthError;
use crate::services::checkout::CheckoutError;
use crate::services::coupon::CouponError;
use crate::services::settlement::SettlementError;
use crate::services::token::TokenError;

/// Application-level error type for the server.
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing, invalid, or expired access credential.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but lacking the required role.
    #[error("forbidden")]
    Forbidden,

    /// Empty or malformed cart.
    #[error("invalid cart: {0}")]
    InvalidCart(String),

    /// No active coupon matches.
    #[error("coupon not found")]
    CouponNotFound,

    /// Coupon expired (and was deactivated as a side effect).
    #[error("coupon expired")]
    CouponExpired,

    /// Payment gateway unreachable; the caller may retry.
    #[error("payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    /// Payment gateway answered outside its contract.
    #[error("payment gateway protocol error: {0}")]
    GatewayProtocol(String),

    /// Constraint conflict surfaced to the client (e.g., duplicate email).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Bad request from client.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Database operation failed.
    #[error("database error: {0}")]
    Database(#[from] RepositoryError),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => Self::Unauthorized("invalid credentials".to_owned()),
            AuthError::UserAlreadyExists => {
                Self::Conflict("an account with this email already exists".to_owned())
            }
            AuthError::InvalidEmail(e) => Self::BadRequest(e.to_string()),
            AuthError::WeakPassword(msg) => Self::BadRequest(msg),
            AuthError::Repository(e) => Self::Database(e),
            AuthError::PasswordHash => Self::Internal("password hashing failed".to_owned()),
        }
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => Self::Unauthorized("token expired".to_owned()),
            TokenError::Invalid => Self::Unauthorized("invalid token".to_owned()),
            TokenError::Revoked => Self::Unauthorized("refresh token revoked".to_owned()),
            TokenError::Store(e) => Self::Internal(format!("revocation store: {e}")),
            TokenError::Signing(e) => Self::Internal(format!("token signing: {e}")),
        }
    }
}

impl From<CouponError> for AppError {
    fn from(err: CouponError) -> Self {
        match err {
            CouponError::NotFound => Self::CouponNotFound,
            CouponError::Expired => Self::CouponExpired,
            CouponError::Repository(e) => Self::Database(e),
        }
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Unavailable(msg) => Self::GatewayUnavailable(msg),
            GatewayError::Protocol(msg) => Self::GatewayProtocol(msg),
        }
    }
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::InvalidCart(msg) => Self::InvalidCart(msg),
            CheckoutError::Coupon(e) => e.into(),
            CheckoutError::Gateway(e) => e.into(),
        }
    }
}

impl From<SettlementError> for AppError {
    fn from(err: SettlementError) -> Self {
        match err {
            SettlementError::Gateway(e) => e.into(),
            SettlementError::Coupon(e) => e.into(),
            SettlementError::Repository(e) => Self::Database(e),
        }
    }
}

impl AppError {
    const fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::InvalidCart(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::CouponNotFound | Self::CouponExpired => StatusCode::NOT_FOUND,
            Self::GatewayUnavailable(_) | Self::GatewayProtocol(_) => StatusCode::BAD_GATEWAY,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message exposed to the client. Internal details are not leaked.
    fn client_message(&self) -> String {
        match self {
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_owned(),
            Self::GatewayUnavailable(_) | Self::GatewayProtocol(_) => {
                "Payment service error, please retry".to_owned()
            }
            Self::CouponNotFound => "Coupon not found".to_owned(),
            Self::CouponExpired => "Coupon expired".to_owned(),
            Self::Forbidden => "Access denied - Admin only".to_owned(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server-side errors to Sentry
        if self.status().is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let body = Json(json!({ "message": self.client_message() }));
        (self.status(), body).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_taxonomy_status_codes() {
        assert_eq!(
            status_of(AppError::Unauthorized("x".to_owned())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(status_of(AppError::Forbidden), StatusCode::FORBIDDEN);
        assert_eq!(
            status_of(AppError::InvalidCart("empty".to_owned())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(AppError::CouponNotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_of(AppError::CouponExpired), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(AppError::GatewayUnavailable("timeout".to_owned())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(AppError::Conflict("dup".to_owned())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(AppError::Internal("boom".to_owned())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_token_errors_map_to_unauthorized() {
        assert_eq!(
            status_of(TokenError::Expired.into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(TokenError::Invalid.into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(TokenError::Revoked.into()),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_internal_details_not_leaked() {
        let err = AppError::Internal("connection string postgres://secret".to_owned());
        assert_eq!(err.client_message(), "Internal server error");
    }
}
