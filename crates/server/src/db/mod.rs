//! Database operations for the Ironcart `PostgreSQL` store.
//!
//! ## Tables
//!
//! - `users` - Accounts (email, argon2 password hash, role)
//! - `coupons` - Reward coupons, at most one per owner (`user_id` unique)
//! - `orders` - Settled orders, at most one per gateway session
//!   (`source_session_id` unique)
//!
//! # Migrations
//!
//! Migrations live in `crates/server/migrations/` and are applied with
//! `sqlx migrate run` (they are not run automatically on startup).

pub mod coupons;
pub mod orders;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

/// Errors from repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Whether a sqlx error is a unique-constraint violation.
///
/// Settlement relies on this to treat a duplicate `source_session_id`
/// insert as "already settled" rather than a failure.
#[must_use]
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}
