//! Support chat: relaying customer messages and photos to the CRM.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{FileId, UserId};
use tracing::error;

use crate::context::AppContext;
use crate::dialogue::{ChatSession, ConversationState, OrderDialogue};
use crate::messaging;

use super::answer_with_error;
use super::orders::get_order_by_id;
use super::ui_builder::{build_order_detail_text, chat_keyboard, order_detail_keyboard};

/// How long the "message sent" confirmation stays on screen
pub const CONFIRMATION_TTL: Duration = Duration::from_millis(330);

/// How long to wait for the remaining messages of an album burst
pub const MEDIA_GROUP_WINDOW: Duration = Duration::from_millis(1000);

/// `chat:<id>`: open the support chat for an order
pub async fn start_chat(
    bot: &Bot,
    q: &CallbackQuery,
    ctx: &AppContext,
    dialogue: &OrderDialogue,
    order_id: &str,
) -> Result<()> {
    let user_id = q.from.id;
    let Some(message) = q.message.as_ref() else {
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    };

    match get_order_by_id(ctx, user_id, order_id).await {
        Ok(Some(order)) => {
            let session = ChatSession {
                order_id: order_id.to_string(),
                order_title: order.title.clone(),
            };
            dialogue
                .update(ConversationState::Chatting { session })
                .await?;
            ctx.sessions.set_active_chat(user_id, order_id).await;

            let lang = ctx.language(user_id).await;
            let text = ctx.localizer.get_message_with_args(
                &lang,
                "chat-start",
                &[("title", order.title.as_str())],
            );
            let keyboard = chat_keyboard(order_id, &ctx.localizer, &lang);
            messaging::edit_or_send(
                bot,
                &ctx.sessions,
                user_id,
                message.chat().id,
                message.id(),
                &text,
                Some(keyboard),
            )
            .await?;
            bot.answer_callback_query(q.id.clone()).await?;
            Ok(())
        }
        Ok(None) => answer_with_error(bot, ctx, q).await,
        Err(e) => {
            error!(user_id = %user_id, error = %e, "Failed to open chat");
            answer_with_error(bot, ctx, q).await
        }
    }
}

/// `exit_chat:<id>`: leave the chat and return to the order details
pub async fn exit_chat(
    bot: &Bot,
    q: &CallbackQuery,
    ctx: &AppContext,
    dialogue: &OrderDialogue,
    order_id: &str,
) -> Result<()> {
    let user_id = q.from.id;

    dialogue.update(ConversationState::Idle).await?;
    ctx.sessions.clear_active_chat(user_id).await;

    let Some(message) = q.message.as_ref() else {
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    };

    match get_order_by_id(ctx, user_id, order_id).await {
        Ok(Some(order)) => {
            let lang = ctx.language(user_id).await;
            let text = build_order_detail_text(&order, &ctx.localizer, &lang);
            let keyboard = order_detail_keyboard(order_id, order.status, &ctx.localizer, &lang);
            messaging::edit_or_send(
                bot,
                &ctx.sessions,
                user_id,
                message.chat().id,
                message.id(),
                &text,
                Some(keyboard),
            )
            .await?;
            bot.answer_callback_query(q.id.clone()).await?;
            Ok(())
        }
        Ok(None) => {
            bot.answer_callback_query(q.id.clone()).await?;
            Ok(())
        }
        Err(e) => {
            error!(user_id = %user_id, error = %e, "Failed to leave chat");
            answer_with_error(bot, ctx, q).await
        }
    }
}

/// The dialogue says chatting but the active-chat record disagrees.
/// Happens when the chat was closed elsewhere; reset instead of relaying
/// into a chat the user already left.
async fn chat_is_stale(
    ctx: &AppContext,
    dialogue: &OrderDialogue,
    user_id: UserId,
    order_id: &str,
) -> Result<bool> {
    if ctx.sessions.is_user_in_chat(user_id, order_id).await {
        return Ok(false);
    }
    dialogue.update(ConversationState::Idle).await?;
    ctx.sessions.clear_active_chat(user_id).await;
    Ok(true)
}

/// Public download URL for a Telegram file. The CRM fetches photo
/// attachments through it.
async fn photo_file_url(bot: &Bot, file_id: FileId) -> Result<String> {
    let file = bot.get_file(file_id).await?;
    Ok(format!(
        "https://api.telegram.org/file/bot{}/{}",
        bot.token(),
        file.path
    ))
}

async fn send_ephemeral_confirmation(bot: &Bot, ctx: &AppContext, user_id: UserId) -> Result<()> {
    let text = ctx.text(user_id, "chat-message-sent").await;
    let confirmation = bot.send_message(ChatId(user_id.0 as i64), text).await?;
    messaging::delete_after(
        bot.clone(),
        confirmation.chat.id,
        confirmation.id,
        CONFIRMATION_TTL,
    );
    Ok(())
}

/// Text message while chatting
pub async fn relay_text(
    bot: &Bot,
    user_id: UserId,
    ctx: &AppContext,
    dialogue: &OrderDialogue,
    session: &ChatSession,
    text: &str,
) -> Result<()> {
    if chat_is_stale(ctx, dialogue, user_id, &session.order_id).await? {
        return Ok(());
    }

    match ctx
        .crm
        .send_customer_message(&session.order_id, &user_id.to_string(), text, None)
        .await
    {
        Ok(()) => send_ephemeral_confirmation(bot, ctx, user_id).await?,
        Err(e) => {
            error!(user_id = %user_id, error = %e, "Failed to relay chat message");
            let text = ctx.text(user_id, "error").await;
            bot.send_message(ChatId(user_id.0 as i64), text).await?;
        }
    }

    Ok(())
}

/// Single photo while chatting, forwarded as a file URL with its caption
pub async fn relay_photo(
    bot: &Bot,
    msg: &Message,
    ctx: &AppContext,
    dialogue: &OrderDialogue,
    session: &ChatSession,
) -> Result<()> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let user_id = user.id;

    if chat_is_stale(ctx, dialogue, user_id, &session.order_id).await? {
        return Ok(());
    }

    let Some(photo) = msg.photo().and_then(|sizes| sizes.last()) else {
        return Ok(());
    };

    let outcome = async {
        let url = photo_file_url(bot, photo.file.id.clone()).await?;
        let caption = msg.caption().unwrap_or("");
        ctx.crm
            .send_customer_message(&session.order_id, &user_id.to_string(), caption, Some(&[url]))
            .await
    }
    .await;

    match outcome {
        Ok(()) => send_ephemeral_confirmation(bot, ctx, user_id).await?,
        Err(e) => {
            error!(user_id = %user_id, error = %e, "Failed to relay chat photo");
            let text = ctx.text(user_id, "error").await;
            bot.send_message(ChatId(user_id.0 as i64), text).await?;
        }
    }

    Ok(())
}

/// One message of an album burst. Parts accumulate in the session store;
/// whichever message opens the accumulator also owns the single flush
/// timer for the whole burst.
pub async fn handle_media_group_part(
    bot: &Bot,
    msg: &Message,
    ctx: &Arc<AppContext>,
    dialogue: &OrderDialogue,
    session: &ChatSession,
) -> Result<()> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let user_id = user.id;

    if chat_is_stale(ctx, dialogue, user_id, &session.order_id).await? {
        return Ok(());
    }

    let Some(group_id) = msg.media_group_id() else {
        return Ok(());
    };
    let group_id = group_id.to_string();

    let image_url = match msg.photo().and_then(|sizes| sizes.last()) {
        Some(photo) => match photo_file_url(bot, photo.file.id.clone()).await {
            Ok(url) => Some(url),
            Err(e) => {
                error!(user_id = %user_id, error = %e, "Failed to resolve album photo");
                None
            }
        },
        None => None,
    };

    let created = ctx
        .sessions
        .push_media(user_id, &group_id, image_url, msg.caption())
        .await;

    if created {
        let bot = bot.clone();
        let ctx = Arc::clone(ctx);
        let order_id = session.order_id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(MEDIA_GROUP_WINDOW).await;
            flush_media_group(&bot, &ctx, user_id, &order_id, &group_id).await;
        });
    }

    Ok(())
}

/// Runs once per burst after the collection window closes. Failures are
/// logged, the customer is not interrupted mid-album.
async fn flush_media_group(
    bot: &Bot,
    ctx: &AppContext,
    user_id: UserId,
    order_id: &str,
    group_id: &str,
) {
    let Some(group) = ctx.sessions.take_media_group(group_id).await else {
        return;
    };
    if group.image_urls.is_empty() {
        return;
    }

    if let Err(e) = ctx
        .crm
        .send_customer_message(
            order_id,
            &user_id.to_string(),
            &group.caption,
            Some(&group.image_urls),
        )
        .await
    {
        error!(user_id = %user_id, error = %e, "Failed to relay media group");
        return;
    }

    let text = ctx.text(user_id, "chat-message-sent").await;
    match bot.send_message(ChatId(user_id.0 as i64), text).await {
        Ok(confirmation) => {
            tokio::time::sleep(CONFIRMATION_TTL).await;
            messaging::safe_delete(bot, confirmation.chat.id, confirmation.id).await;
        }
        Err(e) => {
            error!(user_id = %user_id, error = %e, "Failed to confirm media group");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionStore;

    #[tokio::test(start_paused = true)]
    async fn test_collection_window_gathers_whole_burst() {
        let store = Arc::new(SessionStore::new());
        let user = UserId(7);

        // First message opens the accumulator and owns the timer
        assert!(
            store
                .push_media(user, "g1", Some("u1".to_string()), None)
                .await
        );
        let flush = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                tokio::time::sleep(MEDIA_GROUP_WINDOW).await;
                store.take_media_group("g1").await
            })
        };

        // Later parts arrive inside the window without starting new timers
        tokio::time::advance(Duration::from_millis(400)).await;
        assert!(
            !store
                .push_media(user, "g1", Some("u2".to_string()), Some("three shots"))
                .await
        );
        tokio::time::advance(Duration::from_millis(400)).await;
        assert!(
            !store
                .push_media(user, "g1", Some("u3".to_string()), None)
                .await
        );

        tokio::time::advance(Duration::from_millis(250)).await;
        let group = flush.await.unwrap().expect("window closed with the burst");
        assert_eq!(group.image_urls, vec!["u1", "u2", "u3"]);
        assert_eq!(group.caption, "three shots");

        // The next burst reusing the id starts from scratch
        assert!(store.push_media(user, "g1", None, None).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_after_window_finds_nothing_for_cleared_chat() {
        let store = Arc::new(SessionStore::new());
        let user = UserId(9);

        store.set_active_chat(user, "order-1").await;
        assert!(
            store
                .push_media(user, "g2", Some("u1".to_string()), None)
                .await
        );

        // Leaving the chat discards in-flight accumulators
        store.clear_active_chat(user).await;

        tokio::time::advance(MEDIA_GROUP_WINDOW).await;
        assert!(store.take_media_group("g2").await.is_none());
    }
}
