//! `POST /send-message`: relay a staff message to a customer, with
//! optional photo attachments and an "Enter Chat" shortcut.

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Deserialize;
use serde_json::{json, Value};
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardMarkup, InputFile, ParseMode, UserId};
use tracing::info;
use url::Url;

use crate::bot::ui_builder::enter_chat_keyboard;
use crate::localization::LocalizationManager;

use super::error::WebhookError;
use super::{parse_json, resolve_target, WebhookState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub telegram_id: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub order_title: String,
    #[serde(default)]
    pub order_id: String,
    #[serde(default)]
    pub image_urls: Vec<String>,
}

pub async fn send_message(
    State(state): State<WebhookState>,
    body: Bytes,
) -> Result<Json<Value>, WebhookError> {
    let req: SendMessageRequest = parse_json(&body)?;

    if req.message.is_empty() && req.image_urls.is_empty() {
        return Err(WebhookError::BadRequest(
            "Missing message or image".to_string(),
        ));
    }

    let user_id = resolve_target(&state.ctx, req.telegram_id.as_deref()).await?;
    let lang = state.ctx.language(user_id).await;

    let text = format_support_message(&state.ctx.localizer, &lang, &req.message, &req.order_title);

    // Offer the chat shortcut only when the user is not already chatting
    // about this order
    let keyboard = if !req.order_id.is_empty()
        && !state.ctx.sessions.is_user_in_chat(user_id, &req.order_id).await
    {
        Some(enter_chat_keyboard(
            &req.order_id,
            &state.ctx.localizer,
            &lang,
        ))
    } else {
        None
    };

    if !req.image_urls.is_empty() {
        send_images(
            &state.bot,
            user_id,
            &req.image_urls,
            text.as_deref(),
            keyboard,
        )
        .await?;
    } else if let Some(text) = text.as_deref() {
        let mut request = state
            .bot
            .send_message(ChatId(user_id.0 as i64), text)
            .parse_mode(ParseMode::Html);
        if let Some(kb) = keyboard {
            request = request.reply_markup(kb);
        }
        request.await.map_err(WebhookError::from_send)?;
    }

    info!(telegram_id = %user_id, "Message sent");
    Ok(Json(json!({ "success": true })))
}

/// Wrap the raw message in its order context when one is given
fn format_support_message(
    loc: &LocalizationManager,
    lang: &str,
    message: &str,
    order_title: &str,
) -> Option<String> {
    if message.is_empty() {
        return None;
    }
    if !order_title.is_empty() {
        return Some(loc.get_message_with_args(
            lang,
            "chat-support-message",
            &[("title", order_title), ("message", message)],
        ));
    }
    Some(loc.get_message_with_args(lang, "support-message", &[("message", message)]))
}

/// Send a run of photos. The caption goes on the first, any reply
/// controls on the last.
async fn send_images(
    bot: &Bot,
    user_id: UserId,
    image_urls: &[String],
    caption: Option<&str>,
    keyboard: Option<InlineKeyboardMarkup>,
) -> Result<(), WebhookError> {
    let last = image_urls.len() - 1;
    for (i, image_url) in image_urls.iter().enumerate() {
        let photo = match decode_base64_image(image_url) {
            Some((bytes, filename)) => InputFile::memory(bytes).file_name(filename),
            None => {
                let url = Url::parse(image_url)
                    .map_err(|_| WebhookError::BadRequest("Invalid image URL".to_string()))?;
                InputFile::url(url)
            }
        };

        let mut request = bot.send_photo(ChatId(user_id.0 as i64), photo);
        if i == 0 {
            if let Some(caption) = caption {
                request = request.caption(caption).parse_mode(ParseMode::Html);
            }
        }
        if i == last {
            if let Some(kb) = keyboard.clone() {
                request = request.reply_markup(kb);
            }
        }
        request.await.map_err(WebhookError::from_send)?;
    }
    Ok(())
}

/// Decode a `data:<mime>;base64,<payload>` URL into bytes and a filename.
/// Anything else is treated as a remote URL by the caller.
fn decode_base64_image(data_url: &str) -> Option<(Vec<u8>, String)> {
    let rest = data_url.strip_prefix("data:")?;
    let (header, encoded) = rest.split_once(',')?;

    let mime = header.split(';').next().unwrap_or_default();
    let ext = match mime {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        _ => "png",
    };

    let bytes = BASE64.decode(encoded.as_bytes()).ok()?;
    Some((bytes, format!("image.{ext}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_base64_image_png() {
        // A 1x1 transparent PNG
        let data_url = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";
        let (bytes, filename) = decode_base64_image(data_url).unwrap();
        assert_eq!(filename, "image.png");
        assert_eq!(&bytes[..4], b"\x89PNG");
    }

    #[test]
    fn test_decode_base64_image_jpeg_extension() {
        let data_url = "data:image/jpeg;base64,aGVsbG8=";
        let (bytes, filename) = decode_base64_image(data_url).unwrap();
        assert_eq!(filename, "image.jpg");
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn test_plain_url_is_not_base64() {
        assert!(decode_base64_image("https://example.com/a.png").is_none());
        assert!(decode_base64_image("").is_none());
    }

    #[test]
    fn test_corrupt_base64_payload_rejected() {
        assert!(decode_base64_image("data:image/png;base64,!!!not-base64!!!").is_none());
        // Missing the comma separator entirely
        assert!(decode_base64_image("data:image/png;base64").is_none());
    }

    #[test]
    fn test_support_message_formats() {
        let loc = LocalizationManager::new().unwrap();

        assert_eq!(format_support_message(&loc, "en", "", "Shop"), None);

        let with_order = format_support_message(&loc, "en", "hello", "Shop").unwrap();
        assert!(with_order.contains("<b>Shop</b>"));
        assert!(with_order.contains("hello"));

        let plain = format_support_message(&loc, "en", "hello", "").unwrap();
        assert!(plain.contains("<b>Support:</b>"));
        assert!(plain.contains("hello"));
    }

    #[test]
    fn test_request_parsing_defaults() {
        let req: SendMessageRequest = serde_json::from_str(
            r#"{"telegramId": "123456789", "message": "hi"}"#,
        )
        .unwrap();
        assert_eq!(req.telegram_id.as_deref(), Some("123456789"));
        assert_eq!(req.message, "hi");
        assert!(req.order_id.is_empty());
        assert!(req.image_urls.is_empty());
    }
}
