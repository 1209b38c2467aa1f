//! `POST /notify-staff`: CRM events forwarded to programmers and
//! moderators, with a deep link back to the order board when the CRM
//! is reachable from outside.

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardMarkup, ParseMode};
use tracing::info;
use url::Url;

use crate::bot::ui_builder::staff_order_link_keyboard;
use crate::localization::LocalizationManager;

use super::error::WebhookError;
use super::{parse_json, resolve_target, WebhookState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyStaffRequest {
    pub telegram_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub order_title: String,
    #[serde(default)]
    pub order_id: String,
    #[serde(default)]
    pub responder_username: String,
}

/// Everything the CRM may notify staff about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StaffNotification {
    NewOrder,
    OrderAssigned,
    NewResponse,
    NewOrderModeration,
    ChatAccessGranted,
    PaymentInfoSent,
}

impl StaffNotification {
    fn from_type(kind: &str) -> Option<Self> {
        match kind {
            "new_order" => Some(Self::NewOrder),
            "order_assigned" => Some(Self::OrderAssigned),
            "new_response" => Some(Self::NewResponse),
            "new_order_moderation" => Some(Self::NewOrderModeration),
            "chat_access_granted" => Some(Self::ChatAccessGranted),
            "payment_info_sent" => Some(Self::PaymentInfoSent),
            _ => None,
        }
    }
}

pub async fn notify_staff(
    State(state): State<WebhookState>,
    body: Bytes,
) -> Result<Json<Value>, WebhookError> {
    let req: NotifyStaffRequest = parse_json(&body)?;

    let user_id = resolve_target(&state.ctx, req.telegram_id.as_deref()).await?;
    let lang = state.ctx.language(user_id).await;

    let kind = req
        .kind
        .as_deref()
        .and_then(StaffNotification::from_type)
        .ok_or_else(|| WebhookError::BadRequest("Unknown notification type".to_string()))?;

    let mut text = render_notification(kind, &req, &state.ctx.localizer, &lang);

    let keyboard = order_link_keyboard(
        &state.ctx.config.crm_base_url,
        &req.order_id,
        &state.ctx.localizer,
        &lang,
    );
    // Local deployments get a copyable id instead of a dead link
    if keyboard.is_none() && !req.order_id.is_empty() {
        text.push_str(&format!("\n\n📋 Order ID: <code>{}</code>", req.order_id));
    }

    let mut request = state
        .bot
        .send_message(ChatId(user_id.0 as i64), text)
        .parse_mode(ParseMode::Html);
    if let Some(keyboard) = keyboard {
        request = request.reply_markup(keyboard);
    }
    request.await.map_err(WebhookError::from_send)?;

    info!(telegram_id = %user_id, kind = ?kind, "Staff notification sent");
    Ok(Json(json!({ "success": true })))
}

fn render_notification(
    kind: StaffNotification,
    req: &NotifyStaffRequest,
    loc: &LocalizationManager,
    lang: &str,
) -> String {
    let title = req.order_title.as_str();
    match kind {
        StaffNotification::NewOrder => {
            loc.get_message_with_args(lang, "staff-new-order", &[("title", title)])
        }
        StaffNotification::OrderAssigned => {
            loc.get_message_with_args(lang, "staff-order-assigned", &[("title", title)])
        }
        StaffNotification::NewResponse => loc.get_message_with_args(
            lang,
            "staff-new-response",
            &[("title", title), ("username", req.responder_username.as_str())],
        ),
        StaffNotification::NewOrderModeration => {
            loc.get_message_with_args(lang, "staff-new-order-moderation", &[("title", title)])
        }
        StaffNotification::ChatAccessGranted => {
            loc.get_message_with_args(lang, "staff-chat-access-granted", &[("title", title)])
        }
        StaffNotification::PaymentInfoSent => {
            loc.get_message_with_args(lang, "staff-payment-info-sent", &[("title", title)])
        }
    }
}

/// True when the CRM base URL is something a staff member's Telegram
/// client could actually open.
fn is_external_url(url: &str) -> bool {
    if url.is_empty() {
        return false;
    }
    let lower = url.to_lowercase();
    !lower.contains("localhost") && !lower.contains("127.0.0.1")
}

fn order_link_keyboard(
    base_url: &str,
    order_id: &str,
    loc: &LocalizationManager,
    lang: &str,
) -> Option<InlineKeyboardMarkup> {
    if order_id.is_empty() || !is_external_url(base_url) {
        return None;
    }
    let order_url = Url::parse(&format!(
        "{}/orders/{}",
        base_url.trim_end_matches('/'),
        order_id
    ))
    .ok()?;
    Some(staff_order_link_keyboard(order_url, loc, lang))
}
