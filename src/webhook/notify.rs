//! `POST /notify`: typed customer notifications for order lifecycle
//! events and payment details.

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use tracing::info;

use crate::bot::ui_builder::format_cost;
use crate::crm::status_locale_key;
use crate::localization::LocalizationManager;

use super::error::WebhookError;
use super::{parse_json, resolve_target, WebhookState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyRequest {
    pub telegram_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub order_title: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub payment_method_name: String,
    #[serde(default)]
    pub payment_details: String,
    #[serde(default)]
    pub total_amount: f64,
}

/// Everything the CRM may notify a customer about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CustomerNotification {
    OrderApproved,
    OrderRejected,
    OrderAssigned,
    OrderStatusChanged,
    PaymentInfoReceived,
}

impl CustomerNotification {
    fn from_type(kind: &str) -> Option<Self> {
        match kind {
            "order_approved" => Some(Self::OrderApproved),
            "order_rejected" => Some(Self::OrderRejected),
            "order_assigned" => Some(Self::OrderAssigned),
            "order_status_changed" => Some(Self::OrderStatusChanged),
            "payment_info_received" => Some(Self::PaymentInfoReceived),
            _ => None,
        }
    }
}

pub async fn notify_customer(
    State(state): State<WebhookState>,
    body: Bytes,
) -> Result<Json<Value>, WebhookError> {
    let req: NotifyRequest = parse_json(&body)?;

    let user_id = resolve_target(&state.ctx, req.telegram_id.as_deref()).await?;
    let lang = state.ctx.language(user_id).await;

    let kind = req
        .kind
        .as_deref()
        .and_then(CustomerNotification::from_type)
        .ok_or_else(|| WebhookError::BadRequest("Unknown notification type".to_string()))?;

    let text = render_notification(kind, &req, &state.ctx.localizer, &lang);

    state
        .bot
        .send_message(ChatId(user_id.0 as i64), text)
        .parse_mode(ParseMode::Html)
        .await
        .map_err(WebhookError::from_send)?;

    info!(telegram_id = %user_id, kind = ?kind, "Notification sent");
    Ok(Json(json!({ "success": true })))
}

fn render_notification(
    kind: CustomerNotification,
    req: &NotifyRequest,
    loc: &LocalizationManager,
    lang: &str,
) -> String {
    let title = req.order_title.as_str();
    match kind {
        CustomerNotification::OrderApproved => {
            loc.get_message_with_args(lang, "notify-order-approved", &[("title", title)])
        }
        CustomerNotification::OrderRejected => {
            loc.get_message_with_args(lang, "notify-order-rejected", &[("title", title)])
        }
        CustomerNotification::OrderAssigned => {
            loc.get_message_with_args(lang, "notify-order-assigned", &[("title", title)])
        }
        CustomerNotification::OrderStatusChanged => {
            let status = loc.get_message(lang, &status_locale_key(&req.status), None);
            loc.get_message_with_args(
                lang,
                "notify-order-status",
                &[("title", title), ("status", status.as_str())],
            )
        }
        CustomerNotification::PaymentInfoReceived => loc.get_message_with_args(
            lang,
            "notify-payment-info",
            &[
                ("title", title),
                ("method", req.payment_method_name.as_str()),
                ("details", req.payment_details.as_str()),
                ("amount", format_cost(req.total_amount).as_str()),
            ],
        ),
    }
}
