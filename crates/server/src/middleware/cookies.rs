//! Auth cookie construction.
//!
//! Both credentials travel as `HttpOnly` + `SameSite=Strict` cookies so
//! scripts cannot read them and cross-site requests cannot submit them.
//! The `Secure` flag follows configuration (off for local development).

use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

use crate::services::token::{ACCESS_TOKEN_TTL, REFRESH_TOKEN_TTL, TokenPair};

/// Name of the access-token cookie.
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// Name of the refresh-token cookie.
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";

fn build(name: &'static str, value: String, max_age: Duration, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .path("/")
        .max_age(max_age)
        .build()
}

/// Cookie carrying a fresh access token.
#[must_use]
pub fn access_cookie(access_token: String, secure: bool) -> Cookie<'static> {
    build(
        ACCESS_TOKEN_COOKIE,
        access_token,
        Duration::try_from(ACCESS_TOKEN_TTL).unwrap_or(Duration::minutes(15)),
        secure,
    )
}

/// Cookie pair carrying a freshly-issued token pair.
#[must_use]
pub fn auth_cookies(pair: TokenPair, secure: bool) -> (Cookie<'static>, Cookie<'static>) {
    let access = access_cookie(pair.access_token, secure);
    let refresh = build(
        REFRESH_TOKEN_COOKIE,
        pair.refresh_token,
        Duration::try_from(REFRESH_TOKEN_TTL).unwrap_or(Duration::days(7)),
        secure,
    );
    (access, refresh)
}

/// Removal cookies for both credentials (logout).
#[must_use]
pub fn clear_auth_cookies() -> (Cookie<'static>, Cookie<'static>) {
    let access = Cookie::build((ACCESS_TOKEN_COOKIE, ""))
        .path("/")
        .max_age(Duration::ZERO)
        .build();
    let refresh = Cookie::build((REFRESH_TOKEN_COOKIE, ""))
        .path("/")
        .max_age(Duration::ZERO)
        .build();
    (access, refresh)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_cookies_are_scoped_and_locked_down() {
        let pair = TokenPair {
            access_token: "access.jwt".to_owned(),
            refresh_token: "refresh.jwt".to_owned(),
        };

        let (access, refresh) = auth_cookies(pair, true);

        for cookie in [&access, &refresh] {
            assert_eq!(cookie.http_only(), Some(true));
            assert_eq!(cookie.secure(), Some(true));
            assert_eq!(cookie.same_site(), Some(SameSite::Strict));
            assert_eq!(cookie.path(), Some("/"));
        }
        assert_eq!(access.name(), ACCESS_TOKEN_COOKIE);
        assert_eq!(refresh.name(), REFRESH_TOKEN_COOKIE);
        assert!(access.max_age() < refresh.max_age());
    }

    #[test]
    fn test_clear_cookies_expire_immediately() {
        let (access, refresh) = clear_auth_cookies();
        assert_eq!(access.max_age(), Some(Duration::ZERO));
        assert_eq!(refresh.max_age(), Some(Duration::ZERO));
    }
}
