//! Settings endpoints for the threshold/tag rule.

use axum::{
    Json, Router,
    extract::State,
    routing::{get, put},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;
use uuid::Uuid;

use crate::db::RuleRepository;
use crate::db::rules::Rule;
use crate::error::AppError;
use crate::state::AppState;

/// PUT /setting request body.
///
/// Wire names match the admin UI. Every field is optional: the store
/// layer accepts any shape, and presence checks live in the UI.
#[derive(Debug, Deserialize)]
pub struct RulePayload {
    #[serde(rename = "_id")]
    pub id: Option<Uuid>,
    #[serde(rename = "totalPrice")]
    pub total_price: Option<Decimal>,
    pub tag: Option<String>,
}

/// Build the settings router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/setting", get(get_setting))
        .route("/setting", put(put_setting))
}

/// GET /setting - Current rule, or JSON `null` when none exists.
#[instrument(skip(state))]
async fn get_setting(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let rule = RuleRepository::new(state.pool()).get().await?;

    match rule {
        Some(rule) => Ok(Json(serde_json::to_value(rule).map_err(|e| {
            AppError::Internal(format!("Failed to serialize rule: {e}"))
        })?)),
        None => Ok(Json(Value::Null)),
    }
}

/// PUT /setting - Create or upsert the rule.
///
/// Without an `_id` a new rule row is always created; with one, the rule
/// is upserted by id.
#[instrument(skip(state, payload))]
async fn put_setting(
    State(state): State<AppState>,
    Json(payload): Json<RulePayload>,
) -> Result<Json<Rule>, AppError> {
    let repo = RuleRepository::new(state.pool());

    let rule = match payload.id {
        None => {
            repo.create(payload.total_price, payload.tag.as_deref())
                .await?
        }
        Some(id) => {
            repo.upsert(id, payload.total_price, payload.tag.as_deref())
                .await?
        }
    };

    Ok(Json(rule))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_without_id() {
        let payload: RulePayload =
            serde_json::from_str(r#"{"totalPrice": 250, "tag": "high-value"}"#).unwrap();
        assert!(payload.id.is_none());
        assert_eq!(payload.total_price, Some(Decimal::from(250)));
        assert_eq!(payload.tag.as_deref(), Some("high-value"));
    }

    #[test]
    fn test_payload_with_id() {
        let id = Uuid::new_v4();
        let json = format!(r#"{{"_id": "{id}", "totalPrice": 100, "tag": "vip"}}"#);
        let payload: RulePayload = serde_json::from_str(&json).unwrap();
        assert_eq!(payload.id, Some(id));
    }

    #[test]
    fn test_payload_accepts_any_shape() {
        // The store layer performs no validation; an empty body is legal.
        let payload: RulePayload = serde_json::from_str("{}").unwrap();
        assert!(payload.id.is_none());
        assert!(payload.total_price.is_none());
        assert!(payload.tag.is_none());
    }

    #[test]
    fn test_payload_accepts_fractional_threshold() {
        let payload: RulePayload = serde_json::from_str(r#"{"totalPrice": 99.5}"#).unwrap();
        assert_eq!(payload.total_price, Some("99.5".parse().unwrap()));
    }
}
