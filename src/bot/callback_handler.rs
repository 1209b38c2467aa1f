//! Inline keyboard callback routing.
//!
//! Every branch answers the callback query exactly once, either silently
//! or with an error toast, so buttons never stay in the loading state.

use std::sync::Arc;

use anyhow::Result;
use teloxide::prelude::*;
use tracing::debug;

use crate::context::AppContext;
use crate::dialogue::{ConversationState, OrderDialogue};

use super::{chat, commands, orders};

/// Handle callback queries from inline keyboards
pub async fn callback_handler(
    bot: Bot,
    q: CallbackQuery,
    ctx: Arc<AppContext>,
    dialogue: OrderDialogue,
) -> Result<()> {
    let user_id = q.from.id;

    let _guard = ctx.sessions.user_guard(user_id).await;
    ctx.ensure_language(user_id).await;

    let Some(data) = q.data.as_deref() else {
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    };
    debug!(user_id = %user_id, data = %data, "Received callback query");

    let state = dialogue.get().await?.unwrap_or_default();

    if let Some(language) = data.strip_prefix("lang:") {
        return commands::handle_language_change(&bot, &q, &ctx, language).await;
    }

    // Order creation. Marker, payment and confirm buttons only act while
    // their screen is the current dialogue state; leftover keyboards from
    // an abandoned flow just get acknowledged.
    if let Some(marker_id) = data.strip_prefix("marker:") {
        if let ConversationState::SelectingMarkers { draft } = state {
            return orders::handle_marker_toggle(&bot, &q, &ctx, &dialogue, draft, marker_id).await;
        }
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    }
    if data == "markers_page_info" {
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    }
    if let Some(page) = data.strip_prefix("markers_page:") {
        if let ConversationState::SelectingMarkers { draft } = state {
            if let Ok(page) = page.parse() {
                return orders::handle_markers_page(&bot, &q, &ctx, &dialogue, draft, page).await;
            }
        }
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    }
    if data == "markers_done" {
        if let ConversationState::SelectingMarkers { draft } = state {
            return orders::handle_markers_done(&bot, &q, &ctx, &dialogue, draft).await;
        }
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    }
    if let Some(method_id) = data.strip_prefix("payment:") {
        if let ConversationState::SelectingPayment { draft } = state {
            return orders::handle_payment_choice(&bot, &q, &ctx, &dialogue, draft, method_id)
                .await;
        }
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    }
    if data == "confirm" {
        if let ConversationState::AwaitingConfirmation { draft } = state {
            return orders::handle_confirm(&bot, &q, &ctx, &dialogue, draft).await;
        }
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    }
    if data == "cancel" {
        return orders::handle_cancel(&bot, &q, &ctx, &dialogue).await;
    }

    // Order list and details
    if data == "orders_page_info" {
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    }
    if let Some(page) = data.strip_prefix("orders_page:") {
        if let Ok(page) = page.parse() {
            return orders::handle_orders_page(&bot, &q, &ctx, page).await;
        }
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    }
    if let Some(order_id) = data.strip_prefix("confirm_delete:") {
        return orders::handle_delete_confirmed(&bot, &q, &ctx, order_id).await;
    }
    if let Some(order_id) = data.strip_prefix("delete_order:") {
        return orders::handle_delete_prompt(&bot, &q, &ctx, order_id).await;
    }
    if data == "back_to_orders" {
        return orders::handle_back_to_orders(&bot, &q, &ctx).await;
    }

    // Support chat. "chat:" is checked after the other order actions so
    // "order:" stays the only prefix that could shadow it.
    if let Some(order_id) = data.strip_prefix("exit_chat:") {
        return chat::exit_chat(&bot, &q, &ctx, &dialogue, order_id).await;
    }
    if let Some(order_id) = data.strip_prefix("chat:") {
        return chat::start_chat(&bot, &q, &ctx, &dialogue, order_id).await;
    }
    if let Some(order_id) = data.strip_prefix("order:") {
        return orders::show_order_detail(&bot, &q, &ctx, &dialogue, order_id).await;
    }

    debug!(user_id = %user_id, data = %data, "Unhandled callback");
    bot.answer_callback_query(q.id.clone()).await?;
    Ok(())
}
