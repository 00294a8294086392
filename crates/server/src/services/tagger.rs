//! Rule evaluation for order-created events.
//!
//! On every `orders/create` delivery: load the shop's session, load the
//! stored rule, and when the order total meets the threshold, replace the
//! order's tags with the configured tag. Failures at any step are logged
//! and swallowed; deliveries are acknowledged regardless. There is no
//! retry and no dedup guard, so an at-least-once redelivery re-runs the
//! same (idempotent) mutation.

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::db::{RuleRepository, SessionRepository};
use crate::state::AppState;

/// The subset of the order webhook payload the evaluator reads.
///
/// Everything else in the delivery is ignored.
#[derive(Debug, Deserialize)]
pub struct OrderEvent {
    /// Numeric order id.
    pub id: i64,
    /// Order total as a decimal string (e.g., `"129.95"`).
    #[serde(default)]
    pub total_price: Option<String>,
}

/// Parse an order total with integer-truncation semantics.
///
/// `"129.95"` evaluates as `129`; unparsable input is `None`.
#[must_use]
pub fn parse_total_price(raw: &str) -> Option<Decimal> {
    raw.trim().parse::<Decimal>().ok().map(|d| d.trunc())
}

/// Whether an order total qualifies under a threshold.
///
/// The boundary is inclusive: a total equal to the threshold qualifies.
#[must_use]
pub fn order_qualifies(total: Decimal, threshold: Decimal) -> bool {
    total >= threshold
}

/// Evaluate an order-created delivery for a shop.
///
/// Never returns an error: every failure mode (malformed payload, missing
/// session, missing or incomplete rule, mutation failure) is a logged
/// no-op so the delivery is still acknowledged.
pub async fn process_order(state: &AppState, shop: &str, body: &[u8]) {
    let event: OrderEvent = match serde_json::from_slice(body) {
        Ok(event) => event,
        Err(e) => {
            warn!(shop = %shop, error = %e, "Malformed order payload, skipping");
            return;
        }
    };

    let session = match SessionRepository::new(state.pool()).find_by_shop(shop).await {
        Ok(Some(session)) => session,
        Ok(None) => {
            debug!(shop = %shop, "No stored session for shop, skipping order");
            return;
        }
        Err(e) => {
            error!(shop = %shop, error = %e, "Failed to load session");
            return;
        }
    };

    let Some(access_token) = session.access_token else {
        debug!(shop = %shop, "Session has no access token, skipping order");
        return;
    };

    let rule = match RuleRepository::new(state.pool()).get().await {
        Ok(Some(rule)) => rule,
        Ok(None) => {
            debug!(shop = %shop, "No rule configured, skipping order");
            return;
        }
        Err(e) => {
            error!(shop = %shop, error = %e, "Failed to load rule");
            return;
        }
    };

    let Some(threshold) = rule.threshold_amount else {
        debug!(shop = %shop, "Rule has no threshold, skipping order");
        return;
    };

    let Some(total) = event.total_price.as_deref().and_then(parse_total_price) else {
        warn!(shop = %shop, order_id = event.id, "Order has no parsable total_price, skipping");
        return;
    };

    if !order_qualifies(total, threshold) {
        debug!(
            shop = %shop,
            order_id = event.id,
            %total,
            %threshold,
            "Order below threshold, not tagging"
        );
        return;
    }

    let tag = rule.tag.unwrap_or_default();
    match state
        .shopify()
        .update_order_tags(shop, &access_token, event.id, &[tag.clone()])
        .await
    {
        Ok(()) => {
            info!(shop = %shop, order_id = event.id, tag = %tag, "Order tagged");
        }
        Err(e) => {
            // No retry: the delivery is acknowledged and the failure only logged.
            error!(shop = %shop, order_id = event.id, error = %e, "Failed to tag order");
        }
    }
}
