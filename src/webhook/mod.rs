//! # Webhook Module
//!
//! Inbound HTTP ingress for the CRM: direct customer messages, typed
//! customer and staff notifications, and account verification pings, all
//! rendered into localized Telegram messages. Routes return
//! `{"success": true}` or `{"success": false, "error", "errorCode"?}`.

pub mod customer;
pub mod error;
pub mod notify;
pub mod staff;
pub mod verify;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use teloxide::types::UserId;
use teloxide::Bot;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::context::AppContext;
use crate::validation::is_valid_telegram_id;
use error::WebhookError;

#[derive(Clone)]
pub struct WebhookState {
    pub bot: Bot,
    pub ctx: Arc<AppContext>,
}

pub fn router(bot: Bot, ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/send-message", post(customer::send_message))
        .route("/notify", post(notify::notify_customer))
        .route("/notify-staff", post(staff::notify_staff))
        .route("/verify-telegram", post(verify::verify_telegram))
        .route("/health", get(health))
        .with_state(WebhookState { bot, ctx })
}

/// Bind and run the webhook server until the process exits
pub async fn serve(bot: Bot, ctx: Arc<AppContext>, host: &str, port: u16) -> Result<()> {
    let app = router(bot, ctx);
    let addr = format!("{host}:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind webhook server on {addr}"))?;
    info!(addr = %addr, "Webhook server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Parse a request body, mapping failures into the standard error shape
fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, WebhookError> {
    serde_json::from_slice(body).map_err(|e| WebhookError::BadRequest(format!("Invalid JSON: {e}")))
}

/// Guard shared by every delivery route: validate the target identifier,
/// then load its language so formatting happens in the right locale.
/// Malformed or missing ids never reach the transport.
async fn resolve_target(
    ctx: &AppContext,
    telegram_id: Option<&str>,
) -> Result<UserId, WebhookError> {
    let Some(telegram_id) = telegram_id.filter(|id| !id.is_empty()) else {
        return Err(WebhookError::BadRequest("Missing telegramId".to_string()));
    };

    if !is_valid_telegram_id(telegram_id) {
        warn!(telegram_id = %telegram_id, "Invalid Telegram ID format");
        return Err(WebhookError::InvalidIdFormat);
    }

    let user_id = UserId(
        telegram_id
            .parse()
            .map_err(|_| WebhookError::InvalidIdFormat)?,
    );
    ctx.ensure_language(user_id).await;
    Ok(user_id)
}
