//! Webhook delivery endpoints.
//!
//! Three fixed paths receive platform deliveries. Every request is
//! signature-verified against the raw body before dispatch on the topic
//! header. Handler failures are logged and still acknowledged with 200:
//! the platform redelivers at-least-once and this app keeps no dedup
//! state, so an error response would only multiply deliveries.

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
};
use tracing::instrument;

use crate::db::ShopRepository;
use crate::services::tagger;
use crate::state::AppState;
use crate::webhooks::{HMAC_HEADER, SHOP_HEADER, TOPIC_HEADER, WebhookTopic, verify_signature};

/// Build the webhook router.
///
/// All three paths share one receiver; the topic header, not the path,
/// selects the handler.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/webhooks", post(receive))
        .route("/products", post(receive))
        .route("/orders", post(receive))
}

/// POST /webhooks | /products | /orders - Verified webhook dispatch.
#[instrument(skip(state, headers, body))]
async fn receive(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> StatusCode {
    let Some(signature) = headers.get(HMAC_HEADER).and_then(|v| v.to_str().ok()) else {
        tracing::warn!("Webhook delivery without a signature header");
        return StatusCode::UNAUTHORIZED;
    };

    if !verify_signature(state.shopify().api_secret(), &body, signature) {
        tracing::warn!("Webhook delivery failed signature verification");
        return StatusCode::UNAUTHORIZED;
    }

    let topic = headers
        .get(TOPIC_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let Some(shop) = headers.get(SHOP_HEADER).and_then(|v| v.to_str().ok()) else {
        tracing::warn!(topic = %topic, "Webhook delivery without a shop header");
        return StatusCode::BAD_REQUEST;
    };

    match WebhookTopic::parse(topic) {
        Some(WebhookTopic::AppUninstalled) => {
            match ShopRepository::new(state.pool()).deactivate(shop).await {
                Ok(removed) => {
                    tracing::info!(shop = %shop, removed, "App uninstalled");
                }
                Err(e) => {
                    tracing::error!(shop = %shop, error = %e, "Failed to deactivate shop");
                }
            }
        }
        Some(WebhookTopic::ProductsCreate) => {
            tracing::info!(shop = %shop, "Product created");
        }
        Some(WebhookTopic::OrdersCreate) => {
            tagger::process_order(&state, shop, &body).await;
        }
        None => {
            tracing::info!(shop = %shop, topic = %topic, "Unhandled webhook topic");
        }
    }

    StatusCode::OK
}
