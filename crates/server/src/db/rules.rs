//! Tagging rule repository.
//!
//! The rule is the merchant's single threshold/tag configuration. The
//! storage layer deliberately accepts any shape (both fields nullable);
//! the evaluator decides whether an incomplete rule is actionable.

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::RepositoryError;

/// The stored threshold/tag rule.
///
/// Wire field names (`_id`, `totalPrice`) are kept for compatibility with
/// the admin UI's settings endpoints.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Rule {
    #[serde(rename = "_id")]
    pub id: Uuid,
    /// Order totals at or above this amount qualify for tagging.
    #[serde(rename = "totalPrice")]
    pub threshold_amount: Option<Decimal>,
    /// Tag applied to qualifying orders.
    pub tag: Option<String>,
}

/// Repository for tagging rule database operations.
pub struct RuleRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> RuleRepository<'a> {
    /// Create a new rule repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Get the current rule, if any.
    ///
    /// Multiple rows can exist (every create inserts a new one); the
    /// oldest row is treated as the rule, matching the original store's
    /// `findOne` semantics.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self) -> Result<Option<Rule>, RepositoryError> {
        let rule = sqlx::query_as::<_, Rule>(
            r"
            SELECT id, threshold_amount, tag
            FROM tagging_rule
            ORDER BY created_at ASC, id ASC
            LIMIT 1
            ",
        )
        .fetch_optional(self.pool)
        .await?;

        Ok(rule)
    }

    /// Insert a new rule row.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn create(
        &self,
        threshold_amount: Option<Decimal>,
        tag: Option<&str>,
    ) -> Result<Rule, RepositoryError> {
        let rule = sqlx::query_as::<_, Rule>(
            r"
            INSERT INTO tagging_rule (threshold_amount, tag)
            VALUES ($1, $2)
            RETURNING id, threshold_amount, tag
            ",
        )
        .bind(threshold_amount)
        .bind(tag)
        .fetch_one(self.pool)
        .await?;

        Ok(rule)
    }

    /// Upsert a rule by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert(
        &self,
        id: Uuid,
        threshold_amount: Option<Decimal>,
        tag: Option<&str>,
    ) -> Result<Rule, RepositoryError> {
        let rule = sqlx::query_as::<_, Rule>(
            r"
            INSERT INTO tagging_rule (id, threshold_amount, tag)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET
                threshold_amount = EXCLUDED.threshold_amount,
                tag = EXCLUDED.tag,
                updated_at = NOW()
            RETURNING id, threshold_amount, tag
            ",
        )
        .bind(id)
        .bind(threshold_amount)
        .bind(tag)
        .fetch_one(self.pool)
        .await?;

        Ok(rule)
    }
}
