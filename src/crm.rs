//! # CRM API Client Module
//!
//! Client for the CRM's tRPC-style HTTP API. Queries send their input as a
//! JSON-encoded `input` query parameter, mutations post a JSON body, and
//! both unwrap the `{"result":{"data":...}}` envelope. A remote
//! `{"error":{"message":...}}` surfaces as an error carrying the remote
//! message so handlers can show it verbatim.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::borrow::Cow;

/// Stack marker (technology tag) offered during order creation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Marker {
    pub id: String,
    pub name: String,
}

/// Active payment method configured in the CRM
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentMethod {
    pub id: String,
    pub name: String,
}

/// Staff member reachable for notifications
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffContact {
    #[serde(default)]
    pub username: String,
    pub telegram_id: Option<String>,
}

/// Lifecycle status of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    PendingModeration,
    Rejected,
    Approved,
    InProgress,
    Testing,
    Completed,
    Delivered,
    Unknown,
}

impl From<&str> for OrderStatus {
    fn from(status: &str) -> Self {
        match status {
            "pending_moderation" => Self::PendingModeration,
            "rejected" => Self::Rejected,
            "approved" => Self::Approved,
            "in_progress" => Self::InProgress,
            "testing" => Self::Testing,
            "completed" => Self::Completed,
            "delivered" => Self::Delivered,
            _ => Self::Unknown,
        }
    }
}

impl<'de> Deserialize<'de> for OrderStatus {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let status = String::deserialize(deserializer)?;
        Ok(OrderStatus::from(status.as_str()))
    }
}

impl OrderStatus {
    /// Counts against the two-open-orders limit
    pub fn is_open(self) -> bool {
        matches!(
            self,
            Self::PendingModeration | Self::Approved | Self::InProgress | Self::Testing
        )
    }

    /// Orders the customer may still delete
    pub fn is_deletable(self) -> bool {
        matches!(self, Self::PendingModeration | Self::Rejected)
    }

    /// Emoji shown in the order list keyboard
    pub fn emoji(self) -> &'static str {
        match self {
            Self::PendingModeration => "⏳",
            Self::Rejected => "❌",
            Self::Approved => "✅",
            Self::InProgress => "🔄",
            Self::Testing => "🧪",
            Self::Completed => "✅",
            Self::Delivered => "📦",
            Self::Unknown => "📋",
        }
    }

    /// Catalog key for the localized status label, with a generic label
    /// for statuses this bot does not know about
    pub fn label_key(self) -> &'static str {
        self.locale_key().unwrap_or("status-unknown")
    }

    /// Catalog key for the localized status label
    pub fn locale_key(self) -> Option<&'static str> {
        match self {
            Self::PendingModeration => Some("status-pending-moderation"),
            Self::Rejected => Some("status-rejected"),
            Self::Approved => Some("status-approved"),
            Self::InProgress => Some("status-in-progress"),
            Self::Testing => Some("status-testing"),
            Self::Completed => Some("status-completed"),
            Self::Delivered => Some("status-delivered"),
            Self::Unknown => None,
        }
    }
}

/// Catalog key for a raw wire status. Unknown statuses produce a
/// `status-<raw>` key, which the catalog lookup renders as-is.
pub fn status_locale_key(raw_status: &str) -> Cow<'static, str> {
    match OrderStatus::from(raw_status).locale_key() {
        Some(key) => Cow::Borrowed(key),
        None => Cow::Owned(format!("status-{}", raw_status)),
    }
}

/// A customer's order as returned by `bot.getCustomerOrders`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub cost: f64,
    pub status: OrderStatus,
    #[serde(default)]
    pub markers: Vec<Marker>,
    #[serde(default)]
    pub created_at: String,
}

/// Input for `bot.createOrder`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub title: String,
    pub description: String,
    pub cost: f64,
    pub customer_telegram_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    pub marker_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserLanguage {
    language: Option<String>,
}

/// Client for the CRM backend
#[derive(Debug, Clone)]
pub struct CrmClient {
    http: reqwest::Client,
    base_url: String,
}

impl CrmClient {
    /// Create a client rooted at the tRPC endpoint, e.g.
    /// `http://localhost:5173/api/trpc`. One underlying connection pool is
    /// shared by all calls.
    pub fn new(api_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    async fn query<T: DeserializeOwned>(&self, procedure: &str, input: Option<Value>) -> Result<T> {
        let url = format!("{}/{}", self.base_url, procedure);
        let mut request = self.http.get(&url);
        if let Some(input) = input {
            request = request.query(&[("input", input.to_string())]);
        }
        let body: Value = request
            .send()
            .await
            .with_context(|| format!("API request failed: {procedure}"))?
            .json()
            .await
            .with_context(|| format!("API request failed: {procedure}"))?;
        unwrap_envelope(body)
    }

    async fn mutate<T: DeserializeOwned>(&self, procedure: &str, input: Value) -> Result<T> {
        let url = format!("{}/{}", self.base_url, procedure);
        let body: Value = self
            .http
            .post(&url)
            .json(&input)
            .send()
            .await
            .with_context(|| format!("API request failed: {procedure}"))?
            .json()
            .await
            .with_context(|| format!("API request failed: {procedure}"))?;
        unwrap_envelope(body)
    }

    /// Get all available stack markers
    pub async fn get_markers(&self) -> Result<Vec<Marker>> {
        self.query("bot.getMarkers", None).await
    }

    /// Get all active payment methods
    pub async fn get_payment_methods(&self) -> Result<Vec<PaymentMethod>> {
        self.query("bot.getPaymentMethods", None).await
    }

    /// Create a new order from a confirmed draft
    pub async fn create_order(&self, order: &NewOrder) -> Result<Value> {
        self.mutate("bot.createOrder", serde_json::to_value(order)?)
            .await
    }

    /// Get all orders belonging to a customer
    pub async fn get_customer_orders(&self, customer_telegram_id: &str) -> Result<Vec<Order>> {
        self.query(
            "bot.getCustomerOrders",
            Some(json!({ "customerTelegramId": customer_telegram_id })),
        )
        .await
    }

    /// Relay a customer chat message (optionally with image URLs) to the CRM
    pub async fn send_customer_message(
        &self,
        order_id: &str,
        customer_telegram_id: &str,
        message: &str,
        image_urls: Option<&[String]>,
    ) -> Result<()> {
        let mut input = json!({
            "orderId": order_id,
            "customerTelegramId": customer_telegram_id,
            "message": message,
        });
        if let Some(urls) = image_urls {
            if !urls.is_empty() {
                input["imageUrls"] = json!(urls);
            }
        }
        self.mutate::<Value>("bot.sendCustomerMessage", input)
            .await?;
        Ok(())
    }

    /// Get staff members that should receive Telegram notifications
    pub async fn get_staff_notification_targets(&self) -> Result<Vec<StaffContact>> {
        self.query("bot.getProgrammersForNotification", None).await
    }

    /// Delete an order. The CRM refuses anything that is not pending or
    /// rejected; the refusal message passes through to the caller.
    pub async fn delete_order(&self, order_id: &str, customer_telegram_id: &str) -> Result<()> {
        self.mutate::<Value>(
            "bot.deleteOrder",
            json!({ "orderId": order_id, "customerTelegramId": customer_telegram_id }),
        )
        .await?;
        Ok(())
    }

    /// Get a user's stored language preference, if any
    pub async fn get_user_language(&self, telegram_id: &str) -> Result<Option<String>> {
        let result: UserLanguage = self
            .query("bot.getUserLanguage", Some(json!({ "telegramId": telegram_id })))
            .await?;
        Ok(result.language)
    }

    /// Persist a user's language preference
    pub async fn set_user_language(&self, telegram_id: &str, language: &str) -> Result<()> {
        self.mutate::<Value>(
            "bot.setUserLanguage",
            json!({ "telegramId": telegram_id, "language": language }),
        )
        .await?;
        Ok(())
    }
}

fn unwrap_envelope<T: DeserializeOwned>(body: Value) -> Result<T> {
    if let Some(error) = body.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Unknown error");
        anyhow::bail!("{message}");
    }
    let data = body
        .pointer("/result/data")
        .cloned()
        .unwrap_or(Value::Null);
    serde_json::from_value(data).context("unexpected CRM response shape")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unwrap_envelope_returns_data() {
        let body = json!({ "result": { "data": [{ "id": "m1", "name": "Rust" }] } });
        let markers: Vec<Marker> = unwrap_envelope(body).unwrap();
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].name, "Rust");
    }

    #[test]
    fn test_unwrap_envelope_surfaces_remote_message() {
        let body = json!({ "error": { "message": "Maximum 2 open orders allowed per customer" } });
        let result: Result<Vec<Marker>> = unwrap_envelope(body);
        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "Maximum 2 open orders allowed per customer");
    }

    #[test]
    fn test_unwrap_envelope_error_without_message() {
        let body = json!({ "error": {} });
        let result: Result<Value> = unwrap_envelope(body);
        assert_eq!(result.unwrap_err().to_string(), "Unknown error");
    }

    #[test]
    fn test_order_deserializes_wire_fields() {
        let body = json!({
            "id": "a3f8c1d2-9b7e-4a2f-8c3d-111122223333",
            "title": "Landing page",
            "description": "A simple landing page",
            "cost": 500,
            "status": "in_progress",
            "paymentMethod": null,
            "customerTelegramId": "123456789",
            "createdAt": "2024-01-15T10:30:00.000Z",
            "markers": [{ "id": "m1", "name": "Rust", "color": "#dea584" }]
        });
        let order: Order = serde_json::from_value(body).unwrap();
        assert_eq!(order.status, OrderStatus::InProgress);
        assert_eq!(order.cost, 500.0);
        assert_eq!(order.markers[0].name, "Rust");
        assert_eq!(order.created_at, "2024-01-15T10:30:00.000Z");
    }

    #[test]
    fn test_unknown_status_does_not_fail_deserialization() {
        let order: Order = serde_json::from_value(json!({
            "id": "x",
            "title": "t",
            "description": "d",
            "cost": 0,
            "status": "archived"
        }))
        .unwrap();
        assert_eq!(order.status, OrderStatus::Unknown);
    }

    #[test]
    fn test_open_statuses() {
        assert!(OrderStatus::PendingModeration.is_open());
        assert!(OrderStatus::Approved.is_open());
        assert!(OrderStatus::InProgress.is_open());
        assert!(OrderStatus::Testing.is_open());
        assert!(!OrderStatus::Completed.is_open());
        assert!(!OrderStatus::Delivered.is_open());
        assert!(!OrderStatus::Rejected.is_open());
    }

    #[test]
    fn test_deletable_statuses() {
        assert!(OrderStatus::PendingModeration.is_deletable());
        assert!(OrderStatus::Rejected.is_deletable());
        assert!(!OrderStatus::InProgress.is_deletable());
        assert!(!OrderStatus::Completed.is_deletable());
    }

    #[test]
    fn test_status_locale_key_for_unknown_status() {
        assert_eq!(status_locale_key("in_progress"), "status-in-progress");
        assert_eq!(status_locale_key("archived"), "status-archived");
    }

    #[test]
    fn test_new_order_serializes_camel_case_and_skips_absent_payment() {
        let order = NewOrder {
            title: "Shop".into(),
            description: "Online shop".into(),
            cost: 1500.0,
            customer_telegram_id: "123456789".into(),
            customer_name: Some("Alice".into()),
            marker_ids: vec!["m1".into()],
            payment_method: None,
        };
        let value = serde_json::to_value(&order).unwrap();
        assert_eq!(value["customerTelegramId"], "123456789");
        assert_eq!(value["markerIds"][0], "m1");
        assert!(value.get("paymentMethod").is_none());
    }

    #[test]
    fn test_staff_contact_parses_nullable_telegram_id() {
        let contacts: Vec<StaffContact> = serde_json::from_value(json!([
            { "userId": "u1", "username": "dev1", "telegramId": "123456789" },
            { "userId": "u2", "username": "dev2", "telegramId": null }
        ]))
        .unwrap();
        assert_eq!(contacts[0].telegram_id.as_deref(), Some("123456789"));
        assert!(contacts[1].telegram_id.is_none());
    }
}
