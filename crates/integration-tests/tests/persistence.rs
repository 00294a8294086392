//! Database-backed tests for rule storage, shop sessions, and the
//! active shop set.
//!
//! These tests require:
//! - A running `PostgreSQL` database (`DATABASE_URL` in environment)
//!
//! The rule table is effectively a singleton store, so the rule tests
//! clear it first. Run with:
//! cargo test -p order-autotag-integration-tests -- --ignored --test-threads=1

#![allow(clippy::unwrap_used)]

use order_autotag_server::config::{AppConfig, ShopifyConfig};
use order_autotag_server::db::{self, RuleRepository, SessionRepository, ShopRepository};
use order_autotag_server::services::tagger;
use order_autotag_server::state::AppState;
use rust_decimal::Decimal;
use secrecy::SecretString;
use sqlx::PgPool;
use uuid::Uuid;

async fn test_pool() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = db::create_pool(&SecretString::from(url))
        .await
        .expect("Failed to connect to database");

    sqlx::migrate!("../server/migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}

fn test_state(pool: PgPool) -> AppState {
    let config = AppConfig {
        database_url: SecretString::from("postgres://unused"),
        listen_host: "127.0.0.1".parse().unwrap(),
        port: 0,
        app_url: "https://autotag.example.com".to_string(),
        shopify: ShopifyConfig {
            api_key: "test_api_key".to_string(),
            api_secret: SecretString::from("test_api_secret"),
            scopes: vec!["read_orders".to_string(), "write_orders".to_string()],
            api_version: "unstable".to_string(),
        },
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 1.0,
    };
    AppState::new(config, pool)
}

fn unique_shop() -> String {
    format!("test-{}.myshopify.com", Uuid::new_v4())
}

async fn clear_rules(pool: &PgPool) {
    sqlx::query("DELETE FROM tagging_rule")
        .execute(pool)
        .await
        .expect("Failed to clear rules");
}

async fn rule_exists(pool: &PgPool, id: Uuid) -> bool {
    sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM tagging_rule WHERE id = $1)")
        .bind(id)
        .fetch_one(pool)
        .await
        .expect("Failed to check rule existence")
}

// ============================================================================
// Rule Store Tests
// ============================================================================

#[tokio::test]
#[ignore = "Requires a PostgreSQL database"]
async fn test_get_before_any_save_returns_none() {
    let pool = test_pool().await;
    clear_rules(&pool).await;

    let rule = RuleRepository::new(&pool).get().await.unwrap();
    assert!(rule.is_none());
}

#[tokio::test]
#[ignore = "Requires a PostgreSQL database"]
async fn test_create_without_id_always_inserts() {
    let pool = test_pool().await;
    clear_rules(&pool).await;
    let repo = RuleRepository::new(&pool);

    let first = repo
        .create(Some(Decimal::from(100)), Some("high-value"))
        .await
        .unwrap();
    let second = repo
        .create(Some(Decimal::from(100)), Some("high-value"))
        .await
        .unwrap();

    // Identical payloads still produce two distinct rows
    assert_ne!(first.id, second.id);
    assert!(rule_exists(&pool, first.id).await);
    assert!(rule_exists(&pool, second.id).await);

    // Reads keep returning the oldest row
    let current = repo.get().await.unwrap().unwrap();
    assert_eq!(current.id, first.id);
}

#[tokio::test]
#[ignore = "Requires a PostgreSQL database"]
async fn test_upsert_by_id_is_idempotent() {
    let pool = test_pool().await;
    clear_rules(&pool).await;
    let repo = RuleRepository::new(&pool);

    let id = Uuid::new_v4();
    let first = repo
        .upsert(id, Some(Decimal::from(250)), Some("vip"))
        .await
        .unwrap();
    let second = repo
        .upsert(id, Some(Decimal::from(250)), Some("vip"))
        .await
        .unwrap();

    assert_eq!(first.id, id);
    assert_eq!(second.id, id);
    assert_eq!(second.threshold_amount, Some(Decimal::from(250)));
    assert_eq!(second.tag.as_deref(), Some("vip"));

    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tagging_rule WHERE id = $1")
        .bind(id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

// ============================================================================
// Order Event Tests
// ============================================================================

#[tokio::test]
#[ignore = "Requires a PostgreSQL database"]
async fn test_order_event_without_session_is_a_no_op() {
    let pool = test_pool().await;
    let shop = unique_shop();
    let state = test_state(pool.clone());

    // A qualifying order for a shop that never installed: the evaluator
    // must return without erroring and without touching the platform
    // (there is no token it could call with).
    let body = br#"{"id": 9001, "total_price": "500.00"}"#;
    tagger::process_order(&state, &shop, body).await;

    let session = SessionRepository::new(&pool).find_by_shop(&shop).await.unwrap();
    assert!(session.is_none());
}

// ============================================================================
// Uninstall Tests
// ============================================================================

#[tokio::test]
#[ignore = "Requires a PostgreSQL database"]
async fn test_uninstall_keeps_session_and_rule_rows() {
    let pool = test_pool().await;
    let shop = unique_shop();

    let sessions = SessionRepository::new(&pool);
    let shops = ShopRepository::new(&pool);
    let rules = RuleRepository::new(&pool);

    // Simulate a completed install
    let session_id = Uuid::new_v4().to_string();
    sessions
        .upsert(&session_id, &shop, "nonce", true, "shpat_test_token", "read_orders")
        .await
        .unwrap();
    shops.activate(&shop).await.unwrap();
    let rule = rules
        .create(Some(Decimal::from(100)), Some("high-value"))
        .await
        .unwrap();
    assert!(shops.is_active(&shop).await.unwrap());

    // app/uninstalled removes only the active flag
    let removed = shops.deactivate(&shop).await.unwrap();
    assert!(removed);
    assert!(!shops.is_active(&shop).await.unwrap());

    let session = sessions.find_by_shop(&shop).await.unwrap();
    assert!(session.is_some(), "session row must survive uninstall");
    assert!(
        session.unwrap().access_token.is_some(),
        "stored token must survive uninstall"
    );
    assert!(
        rule_exists(&pool, rule.id).await,
        "rule row must survive uninstall"
    );

    // A second delivery for the same shop is a no-op
    let removed_again = shops.deactivate(&shop).await.unwrap();
    assert!(!removed_again);

    sqlx::query("DELETE FROM tagging_rule WHERE id = $1")
        .bind(rule.id)
        .execute(&pool)
        .await
        .unwrap();
}
