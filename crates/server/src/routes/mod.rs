//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                   - Embedded admin page (redirects to /auth when not installed)
//! GET  /auth               - Begin OAuth install flow
//! GET  /auth/callback      - OAuth callback (verify, exchange, register webhooks)
//! GET  /auth/toplevel      - Top-level redirect page (cookie escape hatch)
//! GET  /setting            - Current rule JSON or null
//! PUT  /setting            - Create or upsert the rule
//! POST /webhooks           - app/uninstalled deliveries
//! POST /products           - products/create deliveries
//! POST /orders             - orders/create deliveries
//! POST /graphql            - Authenticated proxy to the Admin GraphQL API
//! ```

pub mod auth;
pub mod graphql;
pub mod home;
pub mod settings;
pub mod webhooks;

use axum::Router;

use crate::state::AppState;

/// Build the application router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .merge(settings::router())
        .merge(webhooks::router())
        .merge(graphql::router())
        .merge(home::router())
}
