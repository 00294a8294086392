//! Shopify session repository.
//!
//! One session record per shop installation. The platform authenticates
//! outbound Admin API calls with the stored access token. Records are
//! created in the OAuth callback and upserted on re-auth; they are NOT
//! deleted when the app is uninstalled (only the active flag is).

use secrecy::SecretString;
use sqlx::PgPool;

use super::RepositoryError;

/// A per-shop OAuth session.
///
/// Implements `Debug` manually to redact the access token.
#[derive(Clone)]
pub struct ShopSession {
    /// Session id (also stored in the browser's HTTP session).
    pub id: String,
    /// Shop domain (e.g., my-store.myshopify.com).
    pub shop: String,
    /// OAuth state nonce used during the install handshake.
    pub state: String,
    /// Whether this is an online (per-user) token.
    pub is_online: bool,
    /// Admin API access token (redacted in debug output).
    pub access_token: Option<SecretString>,
    /// Granted scopes, comma-separated.
    pub scope: Option<String>,
}

impl std::fmt::Debug for ShopSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopSession")
            .field("id", &self.id)
            .field("shop", &self.shop)
            .field("state", &self.state)
            .field("is_online", &self.is_online)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("scope", &self.scope)
            .finish()
    }
}

/// Internal row type for `PostgreSQL` queries.
#[derive(Debug, sqlx::FromRow)]
struct ShopSessionRow {
    id: String,
    shop: String,
    state: String,
    is_online: bool,
    access_token: Option<String>,
    scope: Option<String>,
}

impl From<ShopSessionRow> for ShopSession {
    fn from(row: ShopSessionRow) -> Self {
        Self {
            id: row.id,
            shop: row.shop,
            state: row.state,
            is_online: row.is_online,
            access_token: row.access_token.map(SecretString::from),
            scope: row.scope,
        }
    }
}

/// Repository for Shopify session database operations.
pub struct SessionRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SessionRepository<'a> {
    /// Create a new session repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Save or update the session for a shop.
    ///
    /// Keyed by shop so re-authentication replaces the previous record.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert(
        &self,
        id: &str,
        shop: &str,
        state: &str,
        is_online: bool,
        access_token: &str,
        scope: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO shopify_session (id, shop, state, is_online, access_token, scope)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (shop) DO UPDATE SET
                id = EXCLUDED.id,
                state = EXCLUDED.state,
                is_online = EXCLUDED.is_online,
                access_token = EXCLUDED.access_token,
                scope = EXCLUDED.scope,
                updated_at = NOW()
            ",
        )
        .bind(id)
        .bind(shop)
        .bind(state)
        .bind(is_online)
        .bind(access_token)
        .bind(scope)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Load the session for a shop.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_shop(&self, shop: &str) -> Result<Option<ShopSession>, RepositoryError> {
        let row = sqlx::query_as::<_, ShopSessionRow>(
            r"
            SELECT id, shop, state, is_online, access_token, scope
            FROM shopify_session
            WHERE shop = $1
            ",
        )
        .bind(shop)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(ShopSession::from))
    }

    /// Load a session by id (used by the authenticated GraphQL proxy).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn find_by_id(&self, id: &str) -> Result<Option<ShopSession>, RepositoryError> {
        let row = sqlx::query_as::<_, ShopSessionRow>(
            r"
            SELECT id, shop, state, is_online, access_token, scope
            FROM shopify_session
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(ShopSession::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shop_session_debug_redacts_token() {
        let session = ShopSession {
            id: "a1b2c3".to_string(),
            shop: "my-store.myshopify.com".to_string(),
            state: "nonce".to_string(),
            is_online: true,
            access_token: Some(SecretString::from("shpat_super_secret")),
            scope: Some("read_orders,write_orders".to_string()),
        };

        let debug_output = format!("{session:?}");
        assert!(debug_output.contains("my-store.myshopify.com"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("shpat_super_secret"));
    }
}
