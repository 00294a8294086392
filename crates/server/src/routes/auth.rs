//! OAuth install flow.
//!
//! Embedded apps cannot set cookies from inside the Shopify admin iframe,
//! so the install flow first bounces through a top-level page that marks
//! the session, then runs the standard authorization-code exchange. The
//! callback verifies the hex HMAC over the query string and the state
//! nonce before trading the code for an access token.

use askama::Template;
use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tower_sessions::Session;
use tracing::instrument;
use uuid::Uuid;

use crate::db::{SessionRepository, ShopRepository};
use crate::state::AppState;
use crate::webhooks::WebhookTopic;

type HmacSha256 = Hmac<Sha256>;

/// Session key marking that the top-level page set the cookie.
const TOP_LEVEL_OAUTH_KEY: &str = "shopify_top_level_oauth";
/// Session key holding the OAuth state nonce during the handshake.
const OAUTH_STATE_KEY: &str = "shopify_oauth_state";
/// Session key holding the shop session id after a completed install.
pub const SHOP_SESSION_ID_KEY: &str = "shopify_session_id";

/// Top-level redirect page template.
#[derive(Template)]
#[template(path = "top_level.html")]
struct TopLevelTemplate {
    api_key: String,
    host_name: String,
    shop: String,
}

/// Build the OAuth router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth", get(begin))
        .route("/auth/callback", get(callback))
        .route("/auth/toplevel", get(toplevel))
}

// =============================================================================
// Query Parameters
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct AuthQueryParams {
    pub shop: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OAuthCallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub shop: Option<String>,
    pub hmac: Option<String>,
    pub timestamp: Option<String>,
    pub host: Option<String>,
}

impl OAuthCallbackParams {
    /// The signed message: all present params except `hmac`, sorted by
    /// key and joined as a query string.
    fn signed_message(&self) -> String {
        let mut pairs: Vec<(&str, &str)> = [
            ("code", self.code.as_deref()),
            ("host", self.host.as_deref()),
            ("shop", self.shop.as_deref()),
            ("state", self.state.as_deref()),
            ("timestamp", self.timestamp.as_deref()),
        ]
        .into_iter()
        .filter_map(|(k, v)| v.map(|v| (k, v)))
        .collect();
        pairs.sort_by(|a, b| a.0.cmp(b.0));

        pairs
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Verify the hex HMAC signature on an OAuth callback.
fn verify_callback_hmac(params: &OAuthCallbackParams, api_secret: &str) -> bool {
    let Some(provided) = &params.hmac else {
        return false;
    };
    let Ok(provided) = hex::decode(provided) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(api_secret.as_bytes()) else {
        return false;
    };
    mac.update(params.signed_message().as_bytes());

    // Constant-time comparison of the decoded MAC bytes
    mac.verify_slice(&provided).is_ok()
}

// =============================================================================
// Route Handlers
// =============================================================================

/// GET /auth/toplevel - Top-level redirect page.
///
/// Rendered outside the admin iframe so the session cookie can be set;
/// the page immediately re-enters the auth flow.
#[instrument(skip(state, session))]
async fn toplevel(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<AuthQueryParams>,
) -> Response {
    let shop = params.shop.unwrap_or_default();

    if let Err(e) = session.insert(TOP_LEVEL_OAUTH_KEY, true).await {
        tracing::error!(error = %e, "Failed to mark top-level session");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    let template = TopLevelTemplate {
        api_key: state.shopify().api_key().to_string(),
        host_name: state.config().host_name().to_string(),
        shop,
    };

    match template.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Template render error");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// GET /auth - Begin the OAuth flow.
#[instrument(skip(state, session))]
async fn begin(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<AuthQueryParams>,
) -> Response {
    let Some(shop) = params.shop else {
        return (StatusCode::BAD_REQUEST, "Missing shop parameter").into_response();
    };

    // Without the top-level cookie marker the session cookie would be
    // blocked inside the iframe; bounce through the escape-hatch page.
    let has_top_level = session
        .get::<bool>(TOP_LEVEL_OAUTH_KEY)
        .await
        .ok()
        .flatten()
        .unwrap_or(false);
    if !has_top_level {
        return Redirect::to(&format!("/auth/toplevel?shop={}", urlencoding::encode(&shop)))
            .into_response();
    }

    // CSRF protection: random state nonce checked in the callback
    let oauth_state = Uuid::new_v4().to_string();
    if let Err(e) = session.insert(OAUTH_STATE_KEY, &oauth_state).await {
        tracing::error!(error = %e, "Failed to store OAuth state");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    let redirect_uri = format!("{}/auth/callback", state.config().app_url);
    let auth_url = state.shopify().authorization_url(
        &shop,
        &redirect_uri,
        &state.config().shopify.scopes,
        &oauth_state,
    );

    tracing::info!(shop = %shop, "Redirecting to Shopify OAuth");
    Redirect::to(&auth_url).into_response()
}

/// GET /auth/callback - Complete the OAuth flow.
///
/// Invalid signature or state returns 400; a missing session (no cookie,
/// expired handshake) redirects back into `/auth`; anything else is 500.
#[instrument(skip(state, session))]
async fn callback(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<OAuthCallbackParams>,
) -> Response {
    if !verify_callback_hmac(&params, state.shopify().api_secret()) {
        tracing::error!("Invalid HMAC signature in OAuth callback");
        return (StatusCode::BAD_REQUEST, "Invalid OAuth signature").into_response();
    }

    let (Some(code), Some(shop), Some(callback_state)) = (
        params.code.as_deref(),
        params.shop.as_deref(),
        params.state.as_deref(),
    ) else {
        return (StatusCode::BAD_REQUEST, "Missing OAuth parameters").into_response();
    };

    // Missing handshake session: start over rather than failing hard
    let stored_state: Option<String> = session.get(OAUTH_STATE_KEY).await.ok().flatten();
    let Some(stored_state) = stored_state else {
        tracing::warn!(shop = %shop, "OAuth callback without a handshake session");
        return Redirect::to(&format!("/auth?shop={}", urlencoding::encode(shop))).into_response();
    };

    if stored_state != callback_state {
        tracing::error!(shop = %shop, "OAuth state mismatch");
        return (StatusCode::BAD_REQUEST, "Invalid OAuth state").into_response();
    }

    if let Err(e) = session.remove::<String>(OAUTH_STATE_KEY).await {
        tracing::warn!(shop = %shop, error = %e, "Failed to clear OAuth state from session");
    }

    let token = match state.shopify().exchange_code(shop, code).await {
        Ok(token) => token,
        Err(e) => {
            tracing::error!(shop = %shop, error = %e, "Failed to exchange OAuth code");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    // One session record per shop, replaced on re-auth
    let shop_session_id = Uuid::new_v4().to_string();
    if let Err(e) = SessionRepository::new(state.pool())
        .upsert(
            &shop_session_id,
            shop,
            callback_state,
            true,
            &token.access_token,
            &token.scope,
        )
        .await
    {
        tracing::error!(shop = %shop, error = %e, "Failed to store shop session");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    if let Err(e) = session.insert(SHOP_SESSION_ID_KEY, &shop_session_id).await {
        tracing::error!(shop = %shop, error = %e, "Failed to bind shop session to cookie");
    }

    if let Err(e) = ShopRepository::new(state.pool()).activate(shop).await {
        tracing::error!(shop = %shop, error = %e, "Failed to mark shop active");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    register_webhooks(&state, shop, &token.access_token).await;

    tracing::info!(shop = %shop, "App installed");
    let host = params.host.as_deref().unwrap_or_default();
    Redirect::to(&format!(
        "/?shop={}&host={}",
        urlencoding::encode(shop),
        urlencoding::encode(host)
    ))
    .into_response()
}

/// Register all handled webhook topics for a freshly installed shop.
///
/// Registration failures are logged but do not fail the install.
async fn register_webhooks(state: &AppState, shop: &str, access_token: &str) {
    let token = secrecy::SecretString::from(access_token.to_string());
    let topics = [
        WebhookTopic::AppUninstalled,
        WebhookTopic::OrdersCreate,
        WebhookTopic::ProductsCreate,
    ];

    let (uninstalled, orders, products) = tokio::join!(
        register_one(state, shop, &token, topics[0]),
        register_one(state, shop, &token, topics[1]),
        register_one(state, shop, &token, topics[2]),
    );

    for (topic, result) in topics.iter().zip([uninstalled, orders, products]) {
        if let Err(e) = result {
            tracing::warn!(
                shop = %shop,
                topic = topic.as_str(),
                error = %e,
                "Failed to register webhook"
            );
        }
    }
}

async fn register_one(
    state: &AppState,
    shop: &str,
    access_token: &secrecy::SecretString,
    topic: WebhookTopic,
) -> Result<(), crate::shopify::ShopifyError> {
    let callback_url = format!("{}{}", state.config().app_url, topic.delivery_path());
    state
        .shopify()
        .register_webhook(shop, access_token, topic, &callback_url)
        .await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sign_hex(secret: &str, message: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(message.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn callback_params() -> OAuthCallbackParams {
        OAuthCallbackParams {
            code: Some("authcode".to_string()),
            state: Some("nonce123".to_string()),
            shop: Some("my-store.myshopify.com".to_string()),
            hmac: None,
            timestamp: Some("1700000000".to_string()),
            host: Some("YWRtaW4uc2hvcGlmeS5jb20".to_string()),
        }
    }

    #[test]
    fn test_signed_message_sorted_without_hmac() {
        let params = callback_params();
        assert_eq!(
            params.signed_message(),
            "code=authcode&host=YWRtaW4uc2hvcGlmeS5jb20&shop=my-store.myshopify.com&state=nonce123&timestamp=1700000000"
        );
    }

    #[test]
    fn test_signed_message_skips_absent_params() {
        let mut params = callback_params();
        params.host = None;
        params.timestamp = None;
        assert_eq!(
            params.signed_message(),
            "code=authcode&shop=my-store.myshopify.com&state=nonce123"
        );
    }

    #[test]
    fn test_verify_callback_hmac_accepts_valid() {
        let mut params = callback_params();
        params.hmac = Some(sign_hex("api_secret", &params.signed_message()));
        assert!(verify_callback_hmac(&params, "api_secret"));
    }

    #[test]
    fn test_verify_callback_hmac_rejects_wrong_secret() {
        let mut params = callback_params();
        params.hmac = Some(sign_hex("other_secret", &params.signed_message()));
        assert!(!verify_callback_hmac(&params, "api_secret"));
    }

    #[test]
    fn test_verify_callback_hmac_rejects_tampered_shop() {
        let mut params = callback_params();
        params.hmac = Some(sign_hex("api_secret", &params.signed_message()));
        params.shop = Some("evil.myshopify.com".to_string());
        assert!(!verify_callback_hmac(&params, "api_secret"));
    }

    #[test]
    fn test_verify_callback_hmac_rejects_missing_header() {
        let params = callback_params();
        assert!(!verify_callback_hmac(&params, "api_secret"));
    }

    #[test]
    fn test_verify_callback_hmac_rejects_non_hex_signature() {
        let mut params = callback_params();
        params.hmac = Some("zz-not-hex".to_string());
        assert!(!verify_callback_hmac(&params, "api_secret"));
    }

    #[test]
    fn test_verify_callback_hmac_rejects_truncated_signature() {
        let mut params = callback_params();
        let full = sign_hex("api_secret", &params.signed_message());
        params.hmac = Some(full[..8].to_string());
        assert!(!verify_callback_hmac(&params, "api_secret"));
    }
}
