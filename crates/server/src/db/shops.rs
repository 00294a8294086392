//! Active shop repository.
//!
//! Tracks which shops have a completed install. Persisted rather than
//! held in process memory so the flag survives restarts; uninstalling
//! removes the row but leaves the shop's session and rule records intact.

use sqlx::PgPool;

use super::RepositoryError;

/// Repository for the active shop set.
pub struct ShopRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ShopRepository<'a> {
    /// Create a new shop repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Mark a shop as active (install completed or re-authenticated).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn activate(&self, shop: &str) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO active_shop (shop)
            VALUES ($1)
            ON CONFLICT (shop) DO UPDATE SET installed_at = NOW()
            ",
        )
        .bind(shop)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Remove a shop from the active set (app uninstalled).
    ///
    /// Returns whether a row was removed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn deactivate(&self, shop: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            DELETE FROM active_shop
            WHERE shop = $1
            ",
        )
        .bind(shop)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Check whether a shop is active.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn is_active(&self, shop: &str) -> Result<bool, RepositoryError> {
        let active = sqlx::query_scalar::<_, bool>(
            r"
            SELECT EXISTS(
                SELECT 1 FROM active_shop WHERE shop = $1
            )
            ",
        )
        .bind(shop)
        .fetch_one(self.pool)
        .await?;

        Ok(active)
    }
}
