//! Plain message routing: conversation steps, chat relay and the reply
//! keyboard menu.

use std::sync::Arc;

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::UserId;
use tracing::debug;

use crate::config::SUPPORTED_LANGUAGES;
use crate::context::AppContext;
use crate::dialogue::{ConversationState, OrderDialogue};
use crate::localization::LocalizationManager;

use super::commands::{show_help, show_language_menu};
use super::{chat, orders};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuAction {
    NewOrder,
    MyOrders,
    Language,
    Help,
}

/// Match a message against the reply keyboard labels of every supported
/// language. Users keep old keyboards around after switching languages.
fn menu_action(loc: &LocalizationManager, text: &str) -> Option<MenuAction> {
    for lang in SUPPORTED_LANGUAGES {
        if text == loc.get_message(lang, "btn-new-order", None) {
            return Some(MenuAction::NewOrder);
        }
        if text == loc.get_message(lang, "btn-my-orders", None) {
            return Some(MenuAction::MyOrders);
        }
        if text == loc.get_message(lang, "btn-language", None) {
            return Some(MenuAction::Language);
        }
        if text == loc.get_message(lang, "btn-help", None) {
            return Some(MenuAction::Help);
        }
    }
    None
}

/// Top level handler for non-command messages
pub async fn message_handler(
    bot: Bot,
    msg: Message,
    ctx: Arc<AppContext>,
    dialogue: OrderDialogue,
) -> Result<()> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let user_id = user.id;

    let _guard = ctx.sessions.user_guard(user_id).await;
    ctx.ensure_language(user_id).await;

    let state = dialogue.get().await?.unwrap_or_default();
    match state {
        ConversationState::Chatting { session } => {
            // Album parts carry a media group id and must not be treated
            // as single photos
            if msg.media_group_id().is_some() && msg.photo().is_some() {
                chat::handle_media_group_part(&bot, &msg, &ctx, &dialogue, &session).await
            } else if msg.photo().is_some() {
                chat::relay_photo(&bot, &msg, &ctx, &dialogue, &session).await
            } else if let Some(text) = msg.text() {
                chat::relay_text(&bot, user_id, &ctx, &dialogue, &session, text).await
            } else {
                Ok(())
            }
        }
        ConversationState::AwaitingTitle => match msg.text() {
            Some(text) => orders::process_title(&bot, user_id, &ctx, &dialogue, text).await,
            None => Ok(()),
        },
        ConversationState::AwaitingDescription { title } => match msg.text() {
            Some(text) => {
                orders::process_description(&bot, user_id, &ctx, &dialogue, title, text).await
            }
            None => Ok(()),
        },
        ConversationState::AwaitingCost { title, description } => match msg.text() {
            Some(text) => {
                orders::process_cost(&bot, user_id, &ctx, &dialogue, title, description, text).await
            }
            None => Ok(()),
        },
        _ => match msg.text() {
            Some(text) => handle_menu_text(&bot, user_id, &ctx, &dialogue, text).await,
            None => Ok(()),
        },
    }
}

async fn handle_menu_text(
    bot: &Bot,
    user_id: UserId,
    ctx: &AppContext,
    dialogue: &OrderDialogue,
    text: &str,
) -> Result<()> {
    match menu_action(&ctx.localizer, text) {
        Some(MenuAction::NewOrder) => {
            orders::start_order_creation(bot, user_id, ctx, dialogue).await
        }
        Some(MenuAction::MyOrders) => orders::view_orders(bot, user_id, ctx).await,
        Some(MenuAction::Language) => show_language_menu(bot, user_id, ctx).await,
        Some(MenuAction::Help) => show_help(bot, user_id, ctx).await,
        None => {
            debug!(user_id = %user_id, "ignoring message outside any flow");
            Ok(())
        }
    }
}
