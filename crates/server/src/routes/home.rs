//! Embedded admin page.
//!
//! Everything that is not an API route lands here: shops with a completed
//! install get the admin page, everyone else is sent into the OAuth flow.

use askama::Template;
use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use serde::Deserialize;
use tracing::instrument;

use crate::db::ShopRepository;
use crate::state::AppState;

/// Embedded admin page template.
#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    api_key: String,
    shop: String,
    host: String,
}

#[derive(Debug, Deserialize)]
pub struct HomeQueryParams {
    pub shop: Option<String>,
    pub host: Option<String>,
}

/// Build the home router (root plus catch-all).
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/{*path}", get(index))
}

/// GET / - Embedded admin page, or a redirect into the install flow.
#[instrument(skip(state))]
async fn index(
    State(state): State<AppState>,
    Query(params): Query<HomeQueryParams>,
) -> Response {
    let Some(shop) = params.shop else {
        return (StatusCode::BAD_REQUEST, "Missing shop parameter").into_response();
    };

    let active = match ShopRepository::new(state.pool()).is_active(&shop).await {
        Ok(active) => active,
        Err(e) => {
            tracing::error!(shop = %shop, error = %e, "Failed to check shop activity");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    if !active {
        return Redirect::to(&format!("/auth?shop={}", urlencoding::encode(&shop)))
            .into_response();
    }

    let template = IndexTemplate {
        api_key: state.shopify().api_key().to_string(),
        shop,
        host: params.host.unwrap_or_default(),
    };

    match template.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Template render error");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
