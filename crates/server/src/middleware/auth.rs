//! Authentication extractors (the request gate).
//!
//! `RequireAuth` authenticates a request from its access-token cookie and
//! attaches the resolved identity; `RequireAdmin` additionally gates on
//! the admin role. Handlers state their requirement in the signature.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::extract::cookie::CookieJar;

use crate::db::users::UserRepository;
use crate::error::AppError;
use crate::middleware::cookies::ACCESS_TOKEN_COOKIE;
use crate::models::CurrentUser;
use crate::services::token::TokenError;
use crate::state::AppState;

use ironcart_core::Role;

/// Extractor that requires an authenticated user.
///
/// Fails with 401 and a distinguishing reason: missing credential,
/// expired credential, invalid credential, or unknown user.
///
/// # Example
///
/// ```rust,ignore
/// async fn profile(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     Json(UserView::from(user))
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireAuth
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);

        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar
            .get(ACCESS_TOKEN_COOKIE)
            .map(|c| c.value().to_owned())
            .ok_or_else(|| AppError::Unauthorized("no access token provided".to_owned()))?;

        let user_id = state.tokens().verify_access(&token).map_err(|e| match e {
            TokenError::Expired => AppError::Unauthorized("access token expired".to_owned()),
            _ => AppError::Unauthorized("invalid access token".to_owned()),
        })?;

        let user = UserRepository::new(state.pool())
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::Unauthorized("user not found".to_owned()))?;

        Ok(Self(user.into()))
    }
}

/// Extractor that requires an authenticated admin.
///
/// Authenticates exactly like [`RequireAuth`], then fails with 403 unless
/// the user's role is `Admin`. No current route needs it; it exists so
/// role-gated endpoints state their requirement the same way.
pub struct RequireAdmin(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireAdmin
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let RequireAuth(user) = RequireAuth::from_request_parts(parts, state).await?;
        authorize_role(&user, Role::Admin)?;
        Ok(Self(user))
    }
}

/// Fail with 403 unless the identity carries the required role.
fn authorize_role(user: &CurrentUser, required: Role) -> Result<(), AppError> {
    if user.role == required {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use ironcart_core::{Email, UserId};

    fn user(role: Role) -> CurrentUser {
        CurrentUser {
            id: UserId::new(1),
            name: "Ada".to_owned(),
            email: Email::parse("ada@example.com").unwrap(),
            role,
        }
    }

    #[test]
    fn test_admin_role_required() {
        assert!(authorize_role(&user(Role::Admin), Role::Admin).is_ok());
        assert!(matches!(
            authorize_role(&user(Role::Customer), Role::Admin),
            Err(AppError::Forbidden)
        ));
    }
}
