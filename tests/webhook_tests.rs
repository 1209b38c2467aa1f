//! # Webhook Tests
//!
//! Integration tests for the CRM-facing ingress: payload parsing,
//! identifier validation and the stable delivery-failure codes.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use teloxide::{ApiError, RequestError};

use crm_bot::validation::is_valid_telegram_id;
use crm_bot::webhook::customer::SendMessageRequest;
use crm_bot::webhook::error::WebhookError;
use crm_bot::webhook::notify::NotifyRequest;
use crm_bot::webhook::staff::NotifyStaffRequest;

#[test]
fn test_send_message_request_parses_crm_payload() {
    let json = r#"{
        "telegramId": "123456789",
        "message": "Hello from support",
        "orderTitle": "Online Shop",
        "orderId": "ord-1",
        "imageUrls": ["https://cdn.example.com/a.png"]
    }"#;

    let req: SendMessageRequest = serde_json::from_str(json).unwrap();
    assert_eq!(req.telegram_id.as_deref(), Some("123456789"));
    assert_eq!(req.message, "Hello from support");
    assert_eq!(req.order_title, "Online Shop");
    assert_eq!(req.order_id, "ord-1");
    assert_eq!(req.image_urls.len(), 1);
}

#[test]
fn test_send_message_request_defaults() {
    // The CRM omits fields it has no value for
    let req: SendMessageRequest =
        serde_json::from_str(r#"{"telegramId": "123456789"}"#).unwrap();
    assert_eq!(req.message, "");
    assert_eq!(req.order_id, "");
    assert!(req.image_urls.is_empty());
}

#[test]
fn test_notify_request_type_field_and_amount() {
    let json = r#"{
        "telegramId": "123456789",
        "type": "payment_info_received",
        "orderTitle": "Online Shop",
        "paymentMethodName": "Card",
        "paymentDetails": "4111 1111 1111 1111",
        "totalAmount": 2500
    }"#;

    let req: NotifyRequest = serde_json::from_str(json).unwrap();
    assert_eq!(req.kind.as_deref(), Some("payment_info_received"));
    assert_eq!(req.payment_method_name, "Card");
    assert_eq!(req.total_amount, 2500.0);
}

#[test]
fn test_staff_request_parses() {
    let json = r#"{
        "telegramId": "123456789",
        "type": "new_response",
        "orderTitle": "Online Shop",
        "orderId": "ord-1",
        "responderUsername": "dev_anna"
    }"#;

    let req: NotifyStaffRequest = serde_json::from_str(json).unwrap();
    assert_eq!(req.kind.as_deref(), Some("new_response"));
    assert_eq!(req.responder_username, "dev_anna");
}

#[test]
fn test_telegram_id_validation() {
    assert!(is_valid_telegram_id("1234567"));
    assert!(is_valid_telegram_id("123456789012345"));
    assert!(!is_valid_telegram_id("123456"));
    assert!(!is_valid_telegram_id("1234567890123456"));
    assert!(!is_valid_telegram_id("12345a7"));
    assert!(!is_valid_telegram_id(""));
}

#[test]
fn test_blocked_bot_classification() {
    let err = WebhookError::from_send(RequestError::Api(ApiError::BotBlocked));
    assert_eq!(err.to_string(), "BOT_BLOCKED");
}

#[test]
fn test_unreachable_user_classification() {
    for api in [
        ApiError::ChatNotFound,
        ApiError::UserNotFound,
        ApiError::CantInitiateConversation,
    ] {
        let err = WebhookError::from_send(RequestError::Api(api));
        assert_eq!(err.to_string(), "INVALID_TELEGRAM_ID_OR_NOT_STARTED");
    }
}

/// The CRM matches on `errorCode`, so the response body shape is a contract
#[tokio::test]
async fn test_error_response_body_shape() {
    let response = WebhookError::BotBlocked.into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["success"], serde_json::json!(false));
    assert_eq!(body["error"], serde_json::json!("BOT_BLOCKED"));
    assert_eq!(body["errorCode"], serde_json::json!("BOT_BLOCKED"));
}

#[tokio::test]
async fn test_bad_request_has_no_error_code() {
    let response = WebhookError::BadRequest("Missing telegramId".to_string()).into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], serde_json::json!("Missing telegramId"));
    assert!(body.get("errorCode").is_none());
}
