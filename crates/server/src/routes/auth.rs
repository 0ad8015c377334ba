//! Authentication endpoints: signup, login, logout, refresh, profile.

use axum::{Json, extract::State, http::StatusCode};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, instrument};

use crate::{
    error::{AppError, Result},
    middleware::{
        RequireAuth,
        cookies::{REFRESH_TOKEN_COOKIE, access_cookie, auth_cookies, clear_auth_cookies},
    },
    models::user::UserView,
    services::auth::AuthService,
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// `POST /api/auth/signup`
///
/// Creates an account, then issues and sets both auth cookies so the
/// new user is signed in immediately.
#[instrument(skip_all)]
pub async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<SignupRequest>,
) -> Result<(CookieJar, (StatusCode, Json<UserView>))> {
    let auth = AuthService::new(state.pool());
    let user = auth.register(&body.name, &body.email, &body.password).await?;

    let pair = state.tokens().issue(user.id).await?;
    let (access, refresh) = auth_cookies(pair, state.config().secure_cookies);

    info!(user_id = %user.id, "user registered");
    Ok((
        jar.add(access).add(refresh),
        (StatusCode::CREATED, Json(user.into())),
    ))
}

/// `POST /api/auth/login`
///
/// Verifies credentials and sets fresh auth cookies. Issuing a new
/// refresh token supersedes any refresh token from an earlier session.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<LoginRequest>,
) -> Result<(CookieJar, Json<UserView>)> {
    let auth = AuthService::new(state.pool());
    let user = auth.login(&body.email, &body.password).await?;

    let pair = state.tokens().issue(user.id).await?;
    let (access, refresh) = auth_cookies(pair, state.config().secure_cookies);

    info!(user_id = %user.id, "user logged in");
    Ok((jar.add(access).add(refresh), Json(user.into())))
}

/// `POST /api/auth/logout`
///
/// Revokes the refresh token named by the cookie (if any) and clears
/// both auth cookies. Succeeds even without a valid session.
#[instrument(skip_all)]
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<Value>)> {
    if let Some(cookie) = jar.get(REFRESH_TOKEN_COOKIE) {
        state.tokens().revoke(cookie.value()).await?;
    }

    let (access, refresh) = clear_auth_cookies();
    Ok((
        jar.add(access).add(refresh),
        Json(json!({ "message": "logged out successfully" })),
    ))
}

/// `POST /api/auth/refresh`
///
/// Exchanges the refresh cookie for a new access cookie. The refresh
/// token itself is not rotated here; it stays valid until logout, a
/// new login, or expiry.
#[instrument(skip_all)]
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<Value>)> {
    let Some(cookie) = jar.get(REFRESH_TOKEN_COOKIE) else {
        return Err(AppError::Unauthorized(
            "no refresh token provided".to_owned(),
        ));
    };

    let (_user_id, access_token) = state.tokens().rotate_access(cookie.value()).await?;
    let access = access_cookie(access_token, state.config().secure_cookies);

    Ok((
        jar.add(access),
        Json(json!({ "message": "token refreshed successfully" })),
    ))
}

/// `GET /api/auth/profile`
pub async fn profile(RequireAuth(user): RequireAuth) -> Json<UserView> {
    Json(user.into())
}
