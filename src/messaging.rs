//! # Message Manager Module
//!
//! Tracked send/edit/delete primitives keeping the chat clean: at most one
//! live bot message per user. New messages delete the previous tracked one,
//! callback-driven screens edit in place where possible.

use anyhow::Result;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardMarkup, MessageId, ParseMode, ReplyMarkup};
use teloxide::ApiError;
use teloxide::RequestError;
use tracing::{debug, error};

use crate::session::SessionStore;

/// Delete the tracked message for a user, if any.
///
/// Returns whether a message was actually deleted. A permanent refusal
/// (message already gone, too old to delete) clears the record; any other
/// transport error leaves the record so the failure stays visible.
pub async fn delete_tracked(bot: &Bot, store: &SessionStore, user_id: UserId) -> bool {
    let Some(message_id) = store.last_message_id(user_id).await else {
        return false;
    };

    match bot.delete_message(ChatId(user_id.0 as i64), message_id).await {
        Ok(_) => {
            store.clear_last_message_id(user_id).await;
            true
        }
        Err(RequestError::Api(
            ApiError::MessageToDeleteNotFound
            | ApiError::MessageIdInvalid
            | ApiError::MessageCantBeDeleted,
        )) => {
            debug!(user_id = %user_id, message_id = %message_id, "tracked message already gone");
            store.clear_last_message_id(user_id).await;
            false
        }
        Err(e) => {
            error!(user_id = %user_id, error = %e, "failed to delete tracked message");
            false
        }
    }
}

/// Delete a specific message, swallowing failures
pub async fn safe_delete(bot: &Bot, chat_id: ChatId, message_id: MessageId) -> bool {
    match bot.delete_message(chat_id, message_id).await {
        Ok(_) => true,
        Err(e) => {
            debug!(chat_id = %chat_id, message_id = %message_id, error = %e, "could not delete message");
            false
        }
    }
}

/// Schedule a fire-and-forget delete after `delay`. Errors are logged by
/// the task, never propagated.
pub fn delete_after(bot: Bot, chat_id: ChatId, message_id: MessageId, delay: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        safe_delete(&bot, chat_id, message_id).await;
    });
}

/// Send a message and record it as the user's tracked message. By default
/// the previously tracked message is deleted first.
pub async fn send_and_track(
    bot: &Bot,
    store: &SessionStore,
    user_id: UserId,
    text: &str,
    reply_markup: Option<ReplyMarkup>,
    delete_previous: bool,
) -> Result<Message> {
    if delete_previous {
        delete_tracked(bot, store, user_id).await;
    }

    let mut request = bot
        .send_message(ChatId(user_id.0 as i64), text)
        .parse_mode(ParseMode::Html);
    if let Some(markup) = reply_markup {
        request = request.reply_markup(markup);
    }
    let message = request.await?;

    store.set_last_message_id(user_id, message.id).await;
    Ok(message)
}

/// Edit a message in place, falling back to a fresh tracked send when the
/// edit is refused. "Message is not modified" counts as success.
pub async fn edit_or_send(
    bot: &Bot,
    store: &SessionStore,
    user_id: UserId,
    chat_id: ChatId,
    message_id: MessageId,
    text: &str,
    reply_markup: Option<InlineKeyboardMarkup>,
) -> Result<()> {
    let mut edit = bot
        .edit_message_text(chat_id, message_id, text)
        .parse_mode(ParseMode::Html);
    if let Some(markup) = reply_markup.clone() {
        edit = edit.reply_markup(markup);
    }

    match edit.await {
        Ok(_) => {
            store.set_last_message_id(user_id, message_id).await;
            Ok(())
        }
        Err(RequestError::Api(ApiError::MessageNotModified)) => Ok(()),
        Err(e) => {
            debug!(user_id = %user_id, error = %e, "could not edit message, sending a new one");
            let mut request = bot
                .send_message(chat_id, text)
                .parse_mode(ParseMode::Html);
            if let Some(markup) = reply_markup {
                request = request.reply_markup(markup);
            }
            let message = request.await?;
            store.set_last_message_id(user_id, message.id).await;
            Ok(())
        }
    }
}
