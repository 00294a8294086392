//! Tests for the settings endpoints' wire shapes.
//!
//! The admin UI speaks the original document-store field names (`_id`,
//! `totalPrice`); these tests pin that contract.

#![allow(clippy::unwrap_used)]

use order_autotag_server::db::rules::Rule;
use order_autotag_server::routes::settings::RulePayload;
use rust_decimal::Decimal;
use uuid::Uuid;

#[test]
fn test_put_body_without_id_means_create() {
    let payload: RulePayload =
        serde_json::from_str(r#"{"totalPrice": 250, "tag": "high-value"}"#).unwrap();
    assert!(payload.id.is_none());
    assert_eq!(payload.total_price, Some(Decimal::from(250)));
}

#[test]
fn test_put_body_with_id_means_upsert() {
    let id = Uuid::new_v4();
    let body = format!(r#"{{"_id": "{id}", "totalPrice": 250, "tag": "high-value"}}"#);
    let payload: RulePayload = serde_json::from_str(&body).unwrap();
    assert_eq!(payload.id, Some(id));
}

#[test]
fn test_put_body_fields_are_all_optional() {
    let payload: RulePayload = serde_json::from_str("{}").unwrap();
    assert!(payload.id.is_none());
    assert!(payload.total_price.is_none());
    assert!(payload.tag.is_none());
}

#[test]
fn test_rule_response_uses_wire_names() {
    let rule = Rule {
        id: Uuid::nil(),
        threshold_amount: Some(Decimal::from(100)),
        tag: Some("vip".to_string()),
    };

    let json = serde_json::to_value(&rule).unwrap();
    assert_eq!(
        json["_id"],
        "00000000-0000-0000-0000-000000000000"
    );
    assert!(json.get("totalPrice").is_some());
    assert_eq!(json["tag"], "vip");
    assert!(json.get("threshold_amount").is_none());
}

#[test]
fn test_rule_response_round_trips_through_put_body() {
    // A saved rule echoed back by the server can be resubmitted as-is.
    let rule = Rule {
        id: Uuid::new_v4(),
        threshold_amount: Some(Decimal::from(75)),
        tag: Some("mid-value".to_string()),
    };

    let body = serde_json::to_string(&rule).unwrap();
    let payload: RulePayload = serde_json::from_str(&body).unwrap();
    assert_eq!(payload.id, Some(rule.id));
    assert_eq!(payload.total_price, rule.threshold_amount);
    assert_eq!(payload.tag, rule.tag);
}
