//! Webhook topics and delivery verification.
//!
//! Shopify signs every delivery with base64-encoded HMAC-SHA256 over the
//! raw request body, keyed by the app API secret. Deliveries must be
//! verified before any handler runs.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the delivery signature.
pub const HMAC_HEADER: &str = "X-Shopify-Hmac-Sha256";
/// Header carrying the event topic (e.g., `orders/create`).
pub const TOPIC_HEADER: &str = "X-Shopify-Topic";
/// Header carrying the originating shop domain.
pub const SHOP_HEADER: &str = "X-Shopify-Shop-Domain";

/// The webhook topics this app subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookTopic {
    /// App removed from a shop.
    AppUninstalled,
    /// A product was created.
    ProductsCreate,
    /// An order was created.
    OrdersCreate,
}

impl WebhookTopic {
    /// Parse the `X-Shopify-Topic` header value.
    #[must_use]
    pub fn parse(topic: &str) -> Option<Self> {
        match topic {
            "app/uninstalled" => Some(Self::AppUninstalled),
            "products/create" => Some(Self::ProductsCreate),
            "orders/create" => Some(Self::OrdersCreate),
            _ => None,
        }
    }

    /// The header form of the topic.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AppUninstalled => "app/uninstalled",
            Self::ProductsCreate => "products/create",
            Self::OrdersCreate => "orders/create",
        }
    }

    /// The `WebhookSubscriptionTopic` enum value used when registering
    /// the subscription over GraphQL.
    #[must_use]
    pub const fn graphql_topic(self) -> &'static str {
        match self {
            Self::AppUninstalled => "APP_UNINSTALLED",
            Self::ProductsCreate => "PRODUCTS_CREATE",
            Self::OrdersCreate => "ORDERS_CREATE",
        }
    }

    /// The fixed path this topic is delivered to.
    #[must_use]
    pub const fn delivery_path(self) -> &'static str {
        match self {
            Self::AppUninstalled => "/webhooks",
            Self::ProductsCreate => "/products",
            Self::OrdersCreate => "/orders",
        }
    }
}

/// Verify a webhook delivery signature.
///
/// `provided` is the base64 value of the `X-Shopify-Hmac-Sha256` header.
#[must_use]
pub fn verify_signature(api_secret: &str, body: &[u8], provided: &str) -> bool {
    let Ok(provided) = BASE64.decode(provided) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(api_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);

    // Constant-time comparison of the decoded MAC bytes
    mac.verify_slice(&provided).is_ok()
}
