//! Per-shop Shopify Admin API client.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;

use crate::config::ShopifyConfig;
use crate::webhooks::WebhookTopic;

use super::{GraphQLError, ShopifyError};

/// Mutation that replaces an order's tag list.
const ORDER_UPDATE_MUTATION: &str = r"
mutation orderUpdate($input: OrderInput!) {
  orderUpdate(input: $input) {
    userErrors {
      field
      message
    }
    order {
      id
      tags
    }
  }
}
";

/// Mutation that subscribes a callback URL to a webhook topic.
const WEBHOOK_SUBSCRIPTION_CREATE_MUTATION: &str = r"
mutation webhookSubscriptionCreate($topic: WebhookSubscriptionTopic!, $webhookSubscription: WebhookSubscriptionInput!) {
  webhookSubscriptionCreate(topic: $topic, webhookSubscription: $webhookSubscription) {
    userErrors {
      field
      message
    }
    webhookSubscription {
      id
    }
  }
}
";

/// An access token obtained from the OAuth code exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessToken {
    /// The token used to authenticate Admin API calls.
    pub access_token: String,
    /// Granted scopes, comma-separated.
    pub scope: String,
}

/// Shopify Admin API client.
///
/// Holds only app credentials; shop domain and access token are supplied
/// per call since one process serves every installed shop.
#[derive(Clone)]
pub struct ShopifyClient {
    inner: Arc<ShopifyClientInner>,
}

struct ShopifyClientInner {
    client: reqwest::Client,
    api_key: String,
    api_secret: String,
    api_version: String,
}

/// GraphQL response envelope.
#[derive(Debug, Deserialize)]
struct GraphQLResponse {
    data: Option<Value>,
    errors: Option<Vec<GraphQLErrorResponse>>,
}

#[derive(Debug, Deserialize)]
struct GraphQLErrorResponse {
    message: String,
}

impl ShopifyClient {
    /// Create a new client from the app's Shopify configuration.
    #[must_use]
    pub fn new(config: &ShopifyConfig) -> Self {
        Self {
            inner: Arc::new(ShopifyClientInner {
                client: reqwest::Client::new(),
                api_key: config.api_key.clone(),
                api_secret: config.api_secret.expose_secret().to_string(),
                api_version: config.api_version.clone(),
            }),
        }
    }

    /// Get the app API key.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.inner.api_key
    }

    /// Get the app API secret (for HMAC verification).
    #[must_use]
    pub fn api_secret(&self) -> &str {
        &self.inner.api_secret
    }

    // =========================================================================
    // OAuth Flow
    // =========================================================================

    /// Generate the OAuth authorization URL for a shop.
    ///
    /// Redirect the merchant to this URL to begin the install flow.
    #[must_use]
    pub fn authorization_url(
        &self,
        shop: &str,
        redirect_uri: &str,
        scopes: &[String],
        state: &str,
    ) -> String {
        let scope = scopes.join(",");
        format!(
            "https://{}/admin/oauth/authorize?client_id={}&scope={}&redirect_uri={}&state={}",
            shop,
            urlencoding::encode(&self.inner.api_key),
            urlencoding::encode(&scope),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(state)
        )
    }

    /// Exchange an authorization code for an access token.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError::OAuth` if the token exchange is rejected.
    /// Returns `ShopifyError::Http` if the HTTP request fails.
    pub async fn exchange_code(&self, shop: &str, code: &str) -> Result<AccessToken, ShopifyError> {
        let url = format!("https://{shop}/admin/oauth/access_token");

        let params = [
            ("client_id", self.inner.api_key.as_str()),
            ("client_secret", self.inner.api_secret.as_str()),
            ("code", code),
        ];

        let response = self.inner.client.post(&url).form(&params).send().await?;

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ShopifyError::OAuth(format!(
                "Token exchange failed: {text}"
            )));
        }

        Ok(response.json().await?)
    }

    // =========================================================================
    // GraphQL Execution
    // =========================================================================

    /// Execute a GraphQL request against a shop's Admin API endpoint.
    async fn execute(
        &self,
        shop: &str,
        access_token: &SecretString,
        query: &str,
        variables: Value,
    ) -> Result<Value, ShopifyError> {
        let body = json!({ "query": query, "variables": variables });
        let response = self.post_graphql(shop, access_token, &body).await?;

        let graphql_response: GraphQLResponse = serde_json::from_value(response)?;

        if let Some(errors) = graphql_response.errors
            && !errors.is_empty()
        {
            let converted = errors
                .into_iter()
                .map(|e| GraphQLError { message: e.message })
                .collect();
            return Err(ShopifyError::GraphQL(converted));
        }

        graphql_response.data.ok_or_else(|| {
            ShopifyError::GraphQL(vec![GraphQLError {
                message: "No data in response".to_string(),
            }])
        })
    }

    /// Forward a raw GraphQL request body to a shop's Admin API endpoint
    /// and return Shopify's response verbatim (errors included).
    ///
    /// Used by the `/graphql` proxy route, where the embedded admin UI
    /// owns the query and expects the platform's exact response shape.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError::Unauthorized` on a 401, `RateLimited` on a
    /// 429, and `Http` on transport failures.
    pub async fn proxy(
        &self,
        shop: &str,
        access_token: &SecretString,
        body: &Value,
    ) -> Result<Value, ShopifyError> {
        self.post_graphql(shop, access_token, body).await
    }

    async fn post_graphql(
        &self,
        shop: &str,
        access_token: &SecretString,
        body: &Value,
    ) -> Result<Value, ShopifyError> {
        let endpoint = format!(
            "https://{}/admin/api/{}/graphql.json",
            shop, self.inner.api_version
        );

        let response = self
            .inner
            .client
            .post(&endpoint)
            .header("X-Shopify-Access-Token", access_token.expose_secret())
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            return Err(ShopifyError::RateLimited(retry_after));
        }

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ShopifyError::Unauthorized(
                "Invalid or expired access token".to_string(),
            ));
        }

        Ok(response.json().await?)
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Replace an order's tag list.
    ///
    /// # Arguments
    ///
    /// * `order_id` - Numeric order id from the webhook payload; converted
    ///   to the `gid://shopify/Order/{id}` form the Admin API expects.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError::UserError` if the mutation reports user
    /// errors, or a transport/GraphQL error otherwise.
    #[instrument(skip(self, access_token), fields(shop = %shop, order_id = %order_id))]
    pub async fn update_order_tags(
        &self,
        shop: &str,
        access_token: &SecretString,
        order_id: i64,
        tags: &[String],
    ) -> Result<(), ShopifyError> {
        let variables = json!({
            "input": {
                "id": format!("gid://shopify/Order/{order_id}"),
                "tags": tags,
            }
        });

        let data = self
            .execute(shop, access_token, ORDER_UPDATE_MUTATION, variables)
            .await?;

        check_user_errors(&data, "orderUpdate")
    }

    /// Subscribe a webhook topic to this app's delivery path.
    ///
    /// Called after a successful OAuth exchange for each handled topic.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError::UserError` if the subscription is rejected,
    /// or a transport/GraphQL error otherwise.
    #[instrument(skip(self, access_token), fields(shop = %shop, topic = %topic.as_str()))]
    pub async fn register_webhook(
        &self,
        shop: &str,
        access_token: &SecretString,
        topic: WebhookTopic,
        callback_url: &str,
    ) -> Result<(), ShopifyError> {
        let variables = json!({
            "topic": topic.graphql_topic(),
            "webhookSubscription": {
                "callbackUrl": callback_url,
                "format": "JSON",
            }
        });

        let data = self
            .execute(
                shop,
                access_token,
                WEBHOOK_SUBSCRIPTION_CREATE_MUTATION,
                variables,
            )
            .await?;

        check_user_errors(&data, "webhookSubscriptionCreate")
    }
}

/// Surface `userErrors` from a mutation payload as `ShopifyError::UserError`.
fn check_user_errors(data: &Value, mutation: &str) -> Result<(), ShopifyError> {
    let user_errors = data
        .get(mutation)
        .and_then(|m| m.get("userErrors"))
        .and_then(Value::as_array);

    if let Some(errors) = user_errors
        && !errors.is_empty()
    {
        let joined = errors
            .iter()
            .filter_map(|e| e.get("message").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("; ");
        return Err(ShopifyError::UserError(joined));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_client() -> ShopifyClient {
        ShopifyClient::new(&ShopifyConfig {
            api_key: "test_api_key".to_string(),
            api_secret: SecretString::from("test_api_secret"),
            scopes: vec!["read_orders".to_string()],
            api_version: "unstable".to_string(),
        })
    }

    #[test]
    fn test_authorization_url() {
        let client = test_client();
        let url = client.authorization_url(
            "my-store.myshopify.com",
            "https://autotag.example.com/auth/callback",
            &["read_orders".to_string(), "write_orders".to_string()],
            "nonce123",
        );

        assert!(url.starts_with("https://my-store.myshopify.com/admin/oauth/authorize?"));
        assert!(url.contains("client_id=test_api_key"));
        assert!(url.contains("scope=read_orders%2Cwrite_orders"));
        assert!(url.contains("state=nonce123"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Fautotag.example.com%2Fauth%2Fcallback"));
    }

    #[test]
    fn test_check_user_errors_empty() {
        let data = json!({
            "orderUpdate": {
                "userErrors": [],
                "order": { "id": "gid://shopify/Order/1", "tags": ["vip"] }
            }
        });
        assert!(check_user_errors(&data, "orderUpdate").is_ok());
    }

    #[test]
    fn test_check_user_errors_present() {
        let data = json!({
            "orderUpdate": {
                "userErrors": [
                    { "field": ["input", "tags"], "message": "Tag is too long" }
                ],
                "order": null
            }
        });
        let err = check_user_errors(&data, "orderUpdate").unwrap_err();
        assert_eq!(err.to_string(), "User error: Tag is too long");
    }

    #[test]
    fn test_check_user_errors_missing_payload() {
        // A missing mutation key is not treated as a user error; GraphQL
        // transport errors are reported through the envelope instead.
        let data = json!({});
        assert!(check_user_errors(&data, "orderUpdate").is_ok());
    }
}
