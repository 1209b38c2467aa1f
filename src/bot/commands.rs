//! Command and menu handlers: /start, /menu, the help button and the
//! language selection flow.

use std::sync::Arc;

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::UserId;
use teloxide::utils::command::BotCommands;
use tracing::{error, info};

use crate::context::AppContext;
use crate::dialogue::{ConversationState, OrderDialogue};
use crate::localization::LocalizationManager;
use crate::messaging;

use super::ui_builder::{language_keyboard, main_menu_keyboard};

#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
pub enum Command {
    #[command(description = "start the bot and show the main menu.")]
    Start,
    #[command(description = "show the main menu.")]
    Menu,
}

/// Handle slash commands. Both commands interrupt whatever flow the user
/// was in.
pub async fn command_handler(
    bot: Bot,
    msg: Message,
    cmd: Command,
    ctx: Arc<AppContext>,
    dialogue: OrderDialogue,
) -> Result<()> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let user_id = user.id;
    let _guard = ctx.sessions.user_guard(user_id).await;
    ctx.ensure_language(user_id).await;

    match cmd {
        Command::Start => cmd_start(&bot, user_id, &ctx, &dialogue).await,
        Command::Menu => cmd_menu(&bot, user_id, &ctx, &dialogue).await,
    }
}

async fn cmd_start(
    bot: &Bot,
    user_id: UserId,
    ctx: &AppContext,
    dialogue: &OrderDialogue,
) -> Result<()> {
    info!(user_id = %user_id, "Handling /start");

    dialogue.update(ConversationState::Idle).await?;
    ctx.sessions.clear_active_chat(user_id).await;

    if ctx.is_new_user(user_id).await {
        // First contact: ask for a language before anything else
        let text = ctx.text(user_id, "welcome-select-language").await;
        messaging::send_and_track(
            bot,
            &ctx.sessions,
            user_id,
            &text,
            Some(language_keyboard().into()),
            true,
        )
        .await?;
    } else {
        let lang = ctx.ensure_language(user_id).await;
        let text = ctx.localizer.get_message(&lang, "welcome", None);
        let keyboard = main_menu_keyboard(&ctx.localizer, &lang);
        messaging::send_and_track(
            bot,
            &ctx.sessions,
            user_id,
            &text,
            Some(keyboard.into()),
            true,
        )
        .await?;
    }

    Ok(())
}

async fn cmd_menu(
    bot: &Bot,
    user_id: UserId,
    ctx: &AppContext,
    dialogue: &OrderDialogue,
) -> Result<()> {
    dialogue.update(ConversationState::Idle).await?;
    ctx.sessions.clear_active_chat(user_id).await;

    let lang = ctx.language(user_id).await;
    let text = ctx.localizer.get_message(&lang, "main-menu", None);
    let keyboard = main_menu_keyboard(&ctx.localizer, &lang);
    messaging::send_and_track(
        bot,
        &ctx.sessions,
        user_id,
        &text,
        Some(keyboard.into()),
        true,
    )
    .await?;

    Ok(())
}

/// Help button from the main menu
pub async fn show_help(bot: &Bot, user_id: UserId, ctx: &AppContext) -> Result<()> {
    let text = ctx.text(user_id, "help-text").await;
    messaging::send_and_track(bot, &ctx.sessions, user_id, &text, None, true).await?;
    Ok(())
}

/// Language button from the main menu
pub async fn show_language_menu(bot: &Bot, user_id: UserId, ctx: &AppContext) -> Result<()> {
    let text = ctx.text(user_id, "language-select").await;
    messaging::send_and_track(
        bot,
        &ctx.sessions,
        user_id,
        &text,
        Some(language_keyboard().into()),
        true,
    )
    .await?;
    Ok(())
}

/// `lang:<code>` callback: switch the cached language right away, persist
/// the preference in the background sense (failures only logged), confirm
/// in the new language and show the main menu.
pub async fn handle_language_change(
    bot: &Bot,
    q: &CallbackQuery,
    ctx: &AppContext,
    language: &str,
) -> Result<()> {
    let user_id = q.from.id;

    if LocalizationManager::is_supported(language) {
        ctx.sessions.set_language(user_id, language).await;
        if let Err(e) = ctx.crm.set_user_language(&user_id.to_string(), language).await {
            error!(user_id = %user_id, error = %e, "Failed to persist language preference");
        }
    }

    if let Some(message) = q.message.as_ref() {
        let confirmation = ctx.text(user_id, "language-changed").await;
        bot.edit_message_text(message.chat().id, message.id(), confirmation)
            .await?;

        let lang = ctx.language(user_id).await;
        let text = ctx.localizer.get_message(&lang, "main-menu", None);
        let keyboard = main_menu_keyboard(&ctx.localizer, &lang);
        // The confirmation stays on screen; only the menu is tracked
        messaging::send_and_track(
            bot,
            &ctx.sessions,
            user_id,
            &text,
            Some(keyboard.into()),
            false,
        )
        .await?;
    }

    bot.answer_callback_query(q.id.clone()).await?;
    Ok(())
}
