//! Refresh-token revocation store.
//!
//! Each user has at most one currently-valid refresh token, stored under
//! `refresh_token:<user_id>` with a TTL matching the token's validity
//! window. Storing a new value overwrites the old one, which is what makes
//! a second login invalidate the previous session's refresh token even
//! though that token still verifies cryptographically.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use thiserror::Error;

use ironcart_core::UserId;

/// Errors from the revocation store backend.
#[derive(Debug, Error)]
pub enum RevocationStoreError {
    /// Redis operation failed.
    #[error("revocation store error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// The keyed store holding the single currently-valid refresh token per
/// user.
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Store `token` as the user's current refresh token, overwriting any
    /// prior value, expiring after `ttl`.
    async fn store(
        &self,
        user_id: UserId,
        token: &str,
        ttl: Duration,
    ) -> Result<(), RevocationStoreError>;

    /// The user's currently-valid refresh token, if one is stored.
    async fn current(&self, user_id: UserId) -> Result<Option<String>, RevocationStoreError>;

    /// Remove the user's stored refresh token. No-op if absent.
    async fn clear(&self, user_id: UserId) -> Result<(), RevocationStoreError>;
}

fn key(user_id: UserId) -> String {
    format!("refresh_token:{user_id}")
}

/// Redis-backed revocation store.
#[derive(Clone)]
pub struct RedisRevocationStore {
    manager: redis::aio::ConnectionManager,
}

/// Ceiling on establishing a Redis connection.
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Ceiling on any single command round trip. Auth must fail fast rather
/// than hold a request open when Redis stalls.
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(2);

impl RedisRevocationStore {
    /// Connect to Redis and build a store around a managed connection.
    ///
    /// Every command issued through the manager is bounded by
    /// [`RESPONSE_TIMEOUT`], and reconnect attempts by
    /// [`CONNECTION_TIMEOUT`].
    ///
    /// # Errors
    ///
    /// Returns `RevocationStoreError::Redis` if the connection cannot be
    /// established.
    pub async fn connect(redis_url: &str) -> Result<Self, RevocationStoreError> {
        let client = redis::Client::open(redis_url)?;
        let config = redis::aio::ConnectionManagerConfig::new()
            .set_connection_timeout(CONNECTION_TIMEOUT)
            .set_response_timeout(RESPONSE_TIMEOUT);
        let manager = client.get_connection_manager_with_config(config).await?;
        Ok(Self { manager })
    }
}

#[async_trait]
impl RevocationStore for RedisRevocationStore {
    async fn store(
        &self,
        user_id: UserId,
        token: &str,
        ttl: Duration,
    ) -> Result<(), RevocationStoreError> {
        let mut conn = self.manager.clone();
        let () = conn.set_ex(key(user_id), token, ttl.as_secs()).await?;
        Ok(())
    }

    async fn current(&self, user_id: UserId) -> Result<Option<String>, RevocationStoreError> {
        let mut conn = self.manager.clone();
        let value: Option<String> = conn.get(key(user_id)).await?;
        Ok(value)
    }

    async fn clear(&self, user_id: UserId) -> Result<(), RevocationStoreError> {
        let mut conn = self.manager.clone();
        let () = conn.del(key(user_id)).await?;
        Ok(())
    }
}

/// In-memory revocation store for tests.
#[cfg(test)]
pub(crate) mod memory {
    use std::collections::HashMap;
    use std::time::Instant;

    use tokio::sync::Mutex;

    use super::{Duration, RevocationStore, RevocationStoreError, UserId, async_trait};

    /// Map-backed store with the same overwrite and TTL semantics as Redis.
    #[derive(Default)]
    pub struct InMemoryRevocationStore {
        entries: Mutex<HashMap<i32, (String, Instant)>>,
    }

    #[async_trait]
    impl RevocationStore for InMemoryRevocationStore {
        async fn store(
            &self,
            user_id: UserId,
            token: &str,
            ttl: Duration,
        ) -> Result<(), RevocationStoreError> {
            let mut entries = self.entries.lock().await;
            entries.insert(user_id.as_i32(), (token.to_owned(), Instant::now() + ttl));
            Ok(())
        }

        async fn current(
            &self,
            user_id: UserId,
        ) -> Result<Option<String>, RevocationStoreError> {
            let entries = self.entries.lock().await;
            Ok(entries
                .get(&user_id.as_i32())
                .filter(|(_, expires)| *expires > Instant::now())
                .map(|(token, _)| token.clone()))
        }

        async fn clear(&self, user_id: UserId) -> Result<(), RevocationStoreError> {
            let mut entries = self.entries.lock().await;
            entries.remove(&user_id.as_i32());
            Ok(())
        }
    }
}
