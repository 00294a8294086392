//! Authenticated GraphQL proxy.
//!
//! The embedded admin UI issues its own queries; this route forwards them
//! to the caller's shop with the stored access token. When no usable shop
//! session is bound to the cookie, the response carries the reauthorize
//! headers the App Bridge client watches for.

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderName, HeaderValue, StatusCode, header::HeaderMap},
    response::{IntoResponse, Response},
    routing::post,
};
use serde_json::Value;
use tower_sessions::Session;
use tracing::instrument;

use crate::db::SessionRepository;
use crate::error::AppError;
use crate::state::AppState;

use super::auth::SHOP_SESSION_ID_KEY;

const REAUTH_HEADER: HeaderName = HeaderName::from_static("x-shopify-api-request-failure-reauthorize");
const REAUTH_URL_HEADER: HeaderName =
    HeaderName::from_static("x-shopify-api-request-failure-reauthorize-url");

/// Build the GraphQL proxy router.
pub fn router() -> Router<AppState> {
    Router::new().route("/graphql", post(proxy))
}

/// 403 telling the embedded client to re-enter the auth flow.
fn reauthorize_response(shop: Option<&str>) -> Response {
    let url = shop.map_or_else(
        || "/auth".to_string(),
        |shop| format!("/auth?shop={}", urlencoding::encode(shop)),
    );

    let mut headers = HeaderMap::new();
    headers.insert(REAUTH_HEADER, HeaderValue::from_static("1"));
    if let Ok(value) = HeaderValue::from_str(&url) {
        headers.insert(REAUTH_URL_HEADER, value);
    }

    (StatusCode::FORBIDDEN, headers).into_response()
}

/// POST /graphql - Forward a query to the caller's shop.
#[instrument(skip(state, session, body))]
async fn proxy(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<Value>,
) -> Result<Response, AppError> {
    let session_id: Option<String> = session
        .get(SHOP_SESSION_ID_KEY)
        .await
        .ok()
        .flatten();
    let Some(session_id) = session_id else {
        return Ok(reauthorize_response(None));
    };

    let shop_session = SessionRepository::new(state.pool())
        .find_by_id(&session_id)
        .await?;
    let Some(shop_session) = shop_session else {
        return Ok(reauthorize_response(None));
    };

    let Some(access_token) = shop_session.access_token.as_ref() else {
        return Ok(reauthorize_response(Some(&shop_session.shop)));
    };

    let response = state
        .shopify()
        .proxy(&shop_session.shop, access_token, &body)
        .await?;

    Ok(Json(response).into_response())
}
