//! `POST /verify-telegram`: confirms to a user that their CRM account
//! was linked to this Telegram account.

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use tracing::info;

use super::error::WebhookError;
use super::{parse_json, resolve_target, WebhookState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub telegram_id: Option<String>,
}

pub async fn verify_telegram(
    State(state): State<WebhookState>,
    body: Bytes,
) -> Result<Json<Value>, WebhookError> {
    let req: VerifyRequest = parse_json(&body)?;

    let user_id = resolve_target(&state.ctx, req.telegram_id.as_deref()).await?;
    let text = state.ctx.text(user_id, "telegram-verification").await;

    state
        .bot
        .send_message(ChatId(user_id.0 as i64), text)
        .parse_mode(ParseMode::Html)
        .await
        .map_err(WebhookError::from_send)?;

    info!(telegram_id = %user_id, "Verification confirmation sent");
    Ok(Json(json!({ "success": true })))
}
