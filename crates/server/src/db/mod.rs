//! Database operations.
//!
//! ## Tables
//!
//! - `tagging_rule` - The merchant's threshold/tag rule (effectively a
//!   singleton; reads return the oldest row)
//! - `shopify_session` - Per-shop OAuth credential records
//! - `active_shop` - Shops with a completed install (replaces the usual
//!   in-process active-shops map so installs survive a restart)
//! - `session` - HTTP session storage (managed by tower-sessions)
//!
//! Migrations live in `crates/server/migrations/` and run at startup.

pub mod rules;
pub mod sessions;
pub mod shops;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use rules::RuleRepository;
pub use sessions::SessionRepository;
pub use shops::ShopRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,
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
