//! Dual-token authentication service.
//!
//! Issues a short-lived access JWT and a long-lived refresh JWT, signed
//! with distinct secrets. The refresh token is additionally pinned in the
//! revocation store: rotation only succeeds while the presented token
//! equals the single most-recently-issued value for that user, so a newer
//! login or an explicit revoke makes older refresh tokens unusable before
//! their cryptographic expiry.

use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use rand::Rng;
use rand::distr::Alphanumeric;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use ironcart_core::UserId;

use super::revocation::{RevocationStore, RevocationStoreError};
use crate::config::ServerConfig;

/// Access token lifetime.
pub const ACCESS_TOKEN_TTL: Duration = Duration::from_secs(15 * 60);

/// Refresh token lifetime; also the revocation-store TTL.
pub const REFRESH_TOKEN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Errors from token operations.
#[derive(Debug, Error)]
pub enum TokenError {
    /// Token signature/shape is valid but the token has expired.
    #[error("token expired")]
    Expired,

    /// Token is malformed, has a bad signature, or the wrong type.
    #[error("invalid token")]
    Invalid,

    /// Refresh token verifies but has been superseded or revoked
    /// server-side.
    #[error("refresh token revoked")]
    Revoked,

    /// Revocation store failure.
    #[error(transparent)]
    Store(#[from] RevocationStoreError),

    /// Token could not be signed.
    #[error("token signing failed: {0}")]
    Signing(jsonwebtoken::errors::Error),
}

/// JWT claims carried by both token kinds.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    /// User id.
    sub: i32,
    /// "access" or "refresh"; prevents presenting one kind as the other.
    token_type: String,
    /// Issued-at (seconds since epoch).
    iat: i64,
    /// Expiry (seconds since epoch).
    exp: i64,
    /// Random token id; makes two tokens minted within the same second
    /// distinct, which the revocation store's exact-match check relies on.
    jti: String,
}

/// A freshly-issued access/refresh credential pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    const fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

/// Issues, verifies, rotates, and revokes the authentication token pair.
pub struct TokenService {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    store: Arc<dyn RevocationStore>,
}

impl TokenService {
    /// Build a token service from the configured HS256 secrets.
    #[must_use]
    pub fn new(config: &ServerConfig, store: Arc<dyn RevocationStore>) -> Self {
        let access_secret = config.access_token_secret.expose_secret().as_bytes();
        let refresh_secret = config.refresh_token_secret.expose_secret().as_bytes();

        Self {
            access_encoding: EncodingKey::from_secret(access_secret),
            access_decoding: DecodingKey::from_secret(access_secret),
            refresh_encoding: EncodingKey::from_secret(refresh_secret),
            refresh_decoding: DecodingKey::from_secret(refresh_secret),
            store,
        }
    }

    /// Mint both credentials and pin the refresh token in the revocation
    /// store, overwriting any prior value for this user.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Signing` or `TokenError::Store` on failure.
    pub async fn issue(&self, user_id: UserId) -> Result<TokenPair, TokenError> {
        let access_token = self.mint(
            user_id,
            TokenKind::Access,
            chrono::Duration::from_std(ACCESS_TOKEN_TTL).unwrap_or(chrono::Duration::zero()),
        )?;
        let refresh_token = self.mint(
            user_id,
            TokenKind::Refresh,
            chrono::Duration::from_std(REFRESH_TOKEN_TTL).unwrap_or(chrono::Duration::zero()),
        )?;

        self.store
            .store(user_id, &refresh_token, REFRESH_TOKEN_TTL)
            .await?;

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Verify an access token and return its user id.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Expired` for an expired token and
    /// `TokenError::Invalid` for everything else.
    pub fn verify_access(&self, token: &str) -> Result<UserId, TokenError> {
        let claims = decode_claims(token, &self.access_decoding, TokenKind::Access)?;
        Ok(UserId::new(claims.sub))
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// The presented token must verify against the refresh secret *and*
    /// equal the value currently stored for the decoded user; a mismatch
    /// (including no value stored) is `Revoked`, distinct from `Invalid`.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Expired`, `Invalid`, `Revoked`, `Store`, or
    /// `Signing`.
    pub async fn rotate_access(&self, refresh_token: &str) -> Result<(UserId, String), TokenError> {
        let claims = decode_claims(refresh_token, &self.refresh_decoding, TokenKind::Refresh)?;
        let user_id = UserId::new(claims.sub);

        let stored = self.store.current(user_id).await?;
        if stored.as_deref() != Some(refresh_token) {
            return Err(TokenError::Revoked);
        }

        let access_token = self.mint(
            user_id,
            TokenKind::Access,
            chrono::Duration::from_std(ACCESS_TOKEN_TTL).unwrap_or(chrono::Duration::zero()),
        )?;

        Ok((user_id, access_token))
    }

    /// Drop the stored refresh token for the user named by this token.
    ///
    /// Idempotent: clearing an absent value is a no-op, and a token that no
    /// longer decodes (expired, garbage) is silently ignored so logout
    /// never fails on a stale cookie.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Store` if the revocation store fails.
    pub async fn revoke(&self, refresh_token: &str) -> Result<(), TokenError> {
        match decode_claims(refresh_token, &self.refresh_decoding, TokenKind::Refresh) {
            Ok(claims) => {
                self.store.clear(UserId::new(claims.sub)).await?;
                Ok(())
            }
            Err(TokenError::Expired | TokenError::Invalid) => {
                tracing::debug!("ignoring undecodable refresh token on revoke");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn mint(
        &self,
        user_id: UserId,
        kind: TokenKind,
        ttl: chrono::Duration,
    ) -> Result<String, TokenError> {
        let now = chrono::Utc::now();
        let jti: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(16)
            .map(char::from)
            .collect();
        let claims = Claims {
            sub: user_id.as_i32(),
            token_type: kind.as_str().to_owned(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            jti,
        };

        let key = match kind {
            TokenKind::Access => &self.access_encoding,
            TokenKind::Refresh => &self.refresh_encoding,
        };

        encode(&Header::new(Algorithm::HS256), &claims, key).map_err(TokenError::Signing)
    }
}

fn decode_claims(
    token: &str,
    key: &DecodingKey,
    expected: TokenKind,
) -> Result<Claims, TokenError> {
    let validation = Validation::new(Algorithm::HS256);

    let data = decode::<Claims>(token, key, &validation).map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Invalid,
    })?;

    if data.claims.token_type != expected.as_str() {
        return Err(TokenError::Invalid);
    }

    Ok(data.claims)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use secrecy::SecretString;

    use super::*;
    use crate::config::{CouponConfig, ServerConfig};
    use crate::services::revocation::memory::InMemoryRevocationStore;

    fn test_config() -> ServerConfig {
        ServerConfig {
            database_url: SecretString::from("postgres://localhost/test"),
            redis_url: SecretString::from("redis://localhost"),
            host: "127.0.0.1".parse().unwrap(),
            port: 0,
            client_url: "http://localhost:5173".to_string(),
            secure_cookies: false,
            access_token_secret: SecretString::from("a".repeat(16) + &"b".repeat(16)),
            refresh_token_secret: SecretString::from("c".repeat(16) + &"d".repeat(16)),
            stripe_secret_key: SecretString::from("sk_test_123"),
            coupon: CouponConfig::default(),
            sentry_dsn: None,
        }
    }

    fn service() -> TokenService {
        TokenService::new(&test_config(), Arc::new(InMemoryRevocationStore::default()))
    }

    #[tokio::test]
    async fn test_issue_and_verify_access() {
        let service = service();
        let pair = service.issue(UserId::new(7)).await.unwrap();

        let user_id = service.verify_access(&pair.access_token).unwrap();
        assert_eq!(user_id, UserId::new(7));
    }

    #[tokio::test]
    async fn test_verify_garbage_is_invalid() {
        let service = service();
        assert!(matches!(
            service.verify_access("not-a-jwt"),
            Err(TokenError::Invalid)
        ));
    }

    #[tokio::test]
    async fn test_refresh_token_is_not_an_access_token() {
        let service = service();
        let pair = service.issue(UserId::new(1)).await.unwrap();

        // Signed with a different secret and a different token_type
        assert!(matches!(
            service.verify_access(&pair.refresh_token),
            Err(TokenError::Invalid)
        ));
    }

    #[tokio::test]
    async fn test_expired_access_is_distinguished() {
        let service = service();
        // Leeway in validation is 60s, so mint well past it
        let expired = service
            .mint(
                UserId::new(1),
                TokenKind::Access,
                chrono::Duration::seconds(-120),
            )
            .unwrap();

        assert!(matches!(
            service.verify_access(&expired),
            Err(TokenError::Expired)
        ));
    }

    #[tokio::test]
    async fn test_rotate_returns_fresh_access_token() {
        let service = service();
        let pair = service.issue(UserId::new(3)).await.unwrap();

        let (user_id, access) = service.rotate_access(&pair.refresh_token).await.unwrap();
        assert_eq!(user_id, UserId::new(3));
        assert_eq!(service.verify_access(&access).unwrap(), UserId::new(3));
    }

    #[tokio::test]
    async fn test_reissue_supersedes_prior_refresh_token() {
        let service = service();
        let first = service.issue(UserId::new(5)).await.unwrap();
        let second = service.issue(UserId::new(5)).await.unwrap();

        // The earlier refresh token still verifies cryptographically but
        // no longer matches the stored value: Revoked, not Invalid.
        assert!(matches!(
            service.rotate_access(&first.refresh_token).await,
            Err(TokenError::Revoked)
        ));
        assert!(service.rotate_access(&second.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_revoke_blocks_rotation_and_is_idempotent() {
        let service = service();
        let pair = service.issue(UserId::new(9)).await.unwrap();

        service.revoke(&pair.refresh_token).await.unwrap();
        assert!(matches!(
            service.rotate_access(&pair.refresh_token).await,
            Err(TokenError::Revoked)
        ));

        // Second revoke is a no-op
        service.revoke(&pair.refresh_token).await.unwrap();
    }

    #[tokio::test]
    async fn test_revoke_ignores_garbage() {
        let service = service();
        assert!(service.revoke("not-a-jwt").await.is_ok());
    }
}
