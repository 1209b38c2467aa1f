//! Order creation, viewing and deletion flows.

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::UserId;
use tracing::error;

use crate::context::AppContext;
use crate::crm::{NewOrder, Order};
use crate::dialogue::{ConversationState, OrderDialogue, OrderDraft};
use crate::messaging;
use crate::validation::parse_cost;

use super::answer_with_error;
use super::ui_builder::{
    build_confirmation_text, build_order_detail_text, cancel_keyboard, confirm_keyboard,
    delete_confirm_keyboard, main_menu_keyboard, markers_keyboard, order_detail_keyboard,
    orders_keyboard, payment_keyboard,
};

/// Two open orders is the hard limit for new submissions
pub fn has_reached_order_limit(orders: &[Order]) -> bool {
    orders.iter().filter(|o| o.status.is_open()).count() >= 2
}

/// A CRM deletion refusal for an order past its deletable statuses
fn is_delete_refusal(message: &str) -> bool {
    message.contains("Cannot delete") || message.contains("current status")
}

/// Live check against the CRM. Lookup failures allow the flow to start,
/// the backend enforces the limit again on creation.
async fn check_order_limit(ctx: &AppContext, user_id: UserId) -> bool {
    match ctx.crm.get_customer_orders(&user_id.to_string()).await {
        Ok(orders) => has_reached_order_limit(&orders),
        Err(e) => {
            error!(user_id = %user_id, error = %e, "Order limit check failed");
            false
        }
    }
}

pub(super) async fn get_order_by_id(
    ctx: &AppContext,
    user_id: UserId,
    order_id: &str,
) -> Result<Option<Order>> {
    let orders = ctx.crm.get_customer_orders(&user_id.to_string()).await?;
    Ok(orders.into_iter().find(|o| o.id == order_id))
}

// Creation flow, message side

/// "New Order" menu button
pub async fn start_order_creation(
    bot: &Bot,
    user_id: UserId,
    ctx: &AppContext,
    dialogue: &OrderDialogue,
) -> Result<()> {
    ctx.sessions.clear_active_chat(user_id).await;

    if check_order_limit(ctx, user_id).await {
        let text = ctx.text(user_id, "order-limit").await;
        messaging::send_and_track(bot, &ctx.sessions, user_id, &text, None, true).await?;
        return Ok(());
    }

    dialogue.update(ConversationState::AwaitingTitle).await?;

    let lang = ctx.language(user_id).await;
    let text = ctx.localizer.get_message(&lang, "order-create-title", None);
    let keyboard = cancel_keyboard(&ctx.localizer, &lang);
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

pub async fn process_title(
    bot: &Bot,
    user_id: UserId,
    ctx: &AppContext,
    dialogue: &OrderDialogue,
    text: &str,
) -> Result<()> {
    dialogue
        .update(ConversationState::AwaitingDescription {
            title: text.to_string(),
        })
        .await?;

    let lang = ctx.language(user_id).await;
    let prompt = ctx.localizer.get_message(&lang, "order-create-description", None);
    let keyboard = cancel_keyboard(&ctx.localizer, &lang);
    messaging::send_and_track(
        bot,
        &ctx.sessions,
        user_id,
        &prompt,
        Some(keyboard.into()),
        true,
    )
    .await?;

    Ok(())
}

pub async fn process_description(
    bot: &Bot,
    user_id: UserId,
    ctx: &AppContext,
    dialogue: &OrderDialogue,
    title: String,
    text: &str,
) -> Result<()> {
    dialogue
        .update(ConversationState::AwaitingCost {
            title,
            description: text.to_string(),
        })
        .await?;

    let lang = ctx.language(user_id).await;
    let prompt = ctx.localizer.get_message(&lang, "order-create-cost", None);
    let keyboard = cancel_keyboard(&ctx.localizer, &lang);
    messaging::send_and_track(
        bot,
        &ctx.sessions,
        user_id,
        &prompt,
        Some(keyboard.into()),
        true,
    )
    .await?;

    Ok(())
}

/// Budget input. Invalid input re-prompts and stays on this step.
pub async fn process_cost(
    bot: &Bot,
    user_id: UserId,
    ctx: &AppContext,
    dialogue: &OrderDialogue,
    title: String,
    description: String,
    text: &str,
) -> Result<()> {
    let Some(cost) = parse_cost(text) else {
        let prompt = ctx.text(user_id, "order-create-cost").await;
        messaging::send_and_track(bot, &ctx.sessions, user_id, &prompt, None, true).await?;
        return Ok(());
    };

    let available_markers = match ctx.crm.get_markers().await {
        Ok(markers) => markers,
        Err(e) => {
            error!(user_id = %user_id, error = %e, "Failed to fetch markers");
            Vec::new()
        }
    };

    let draft = OrderDraft {
        title,
        description,
        cost,
        available_markers,
        ..Default::default()
    };

    let lang = ctx.language(user_id).await;
    let prompt = ctx.localizer.get_message(&lang, "order-create-markers", None);
    let keyboard = markers_keyboard(&draft, &ctx.localizer, &lang);

    dialogue
        .update(ConversationState::SelectingMarkers { draft })
        .await?;

    messaging::send_and_track(
        bot,
        &ctx.sessions,
        user_id,
        &prompt,
        Some(keyboard.into()),
        true,
    )
    .await?;

    Ok(())
}

// Creation flow, callback side

pub async fn handle_marker_toggle(
    bot: &Bot,
    q: &CallbackQuery,
    ctx: &AppContext,
    dialogue: &OrderDialogue,
    mut draft: OrderDraft,
    marker_id: &str,
) -> Result<()> {
    let user_id = q.from.id;
    draft.toggle_marker(marker_id);

    let lang = ctx.language(user_id).await;
    let keyboard = markers_keyboard(&draft, &ctx.localizer, &lang);

    dialogue
        .update(ConversationState::SelectingMarkers { draft })
        .await?;

    if let Some(message) = q.message.as_ref() {
        if let Err(e) = bot
            .edit_message_reply_markup(message.chat().id, message.id())
            .reply_markup(keyboard)
            .await
        {
            error!(user_id = %user_id, error = %e, "Failed to update marker keyboard");
        }
        ctx.sessions.set_last_message_id(user_id, message.id()).await;
    }

    bot.answer_callback_query(q.id.clone()).await?;
    Ok(())
}

pub async fn handle_markers_page(
    bot: &Bot,
    q: &CallbackQuery,
    ctx: &AppContext,
    dialogue: &OrderDialogue,
    mut draft: OrderDraft,
    page: usize,
) -> Result<()> {
    let user_id = q.from.id;
    draft.markers_page = page;

    let lang = ctx.language(user_id).await;
    let keyboard = markers_keyboard(&draft, &ctx.localizer, &lang);

    dialogue
        .update(ConversationState::SelectingMarkers { draft })
        .await?;

    if let Some(message) = q.message.as_ref() {
        if let Err(e) = bot
            .edit_message_reply_markup(message.chat().id, message.id())
            .reply_markup(keyboard)
            .await
        {
            error!(user_id = %user_id, error = %e, "Failed to page marker keyboard");
        }
    }

    bot.answer_callback_query(q.id.clone()).await?;
    Ok(())
}

/// Done with markers: move on to payment, or straight to confirmation
/// when the CRM has no payment methods configured
pub async fn handle_markers_done(
    bot: &Bot,
    q: &CallbackQuery,
    ctx: &AppContext,
    dialogue: &OrderDialogue,
    mut draft: OrderDraft,
) -> Result<()> {
    let user_id = q.from.id;
    let Some(message) = q.message.as_ref() else {
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    };

    draft.available_payment_methods = match ctx.crm.get_payment_methods().await {
        Ok(methods) => methods,
        Err(e) => {
            error!(user_id = %user_id, error = %e, "Failed to fetch payment methods");
            Vec::new()
        }
    };

    let lang = ctx.language(user_id).await;
    if draft.available_payment_methods.is_empty() {
        let text = build_confirmation_text(&draft, &ctx.localizer, &lang);
        let keyboard = confirm_keyboard(&ctx.localizer, &lang);
        dialogue
            .update(ConversationState::AwaitingConfirmation { draft })
            .await?;
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
    } else {
        let text = ctx.localizer.get_message(&lang, "order-create-payment", None);
        let keyboard = payment_keyboard(&draft.available_payment_methods, &ctx.localizer, &lang);
        dialogue
            .update(ConversationState::SelectingPayment { draft })
            .await?;
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
    }

    bot.answer_callback_query(q.id.clone()).await?;
    Ok(())
}

pub async fn handle_payment_choice(
    bot: &Bot,
    q: &CallbackQuery,
    ctx: &AppContext,
    dialogue: &OrderDialogue,
    mut draft: OrderDraft,
    method_id: &str,
) -> Result<()> {
    let user_id = q.from.id;
    let Some(message) = q.message.as_ref() else {
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    };

    draft.payment_method_id = Some(method_id.to_string());

    let lang = ctx.language(user_id).await;
    let text = build_confirmation_text(&draft, &ctx.localizer, &lang);
    let keyboard = confirm_keyboard(&ctx.localizer, &lang);

    dialogue
        .update(ConversationState::AwaitingConfirmation { draft })
        .await?;

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

/// Final confirmation: submit the order to the CRM. Rejections (for
/// example the open-order limit enforced server side) surface their
/// message below the generic error line.
pub async fn handle_confirm(
    bot: &Bot,
    q: &CallbackQuery,
    ctx: &AppContext,
    dialogue: &OrderDialogue,
    draft: OrderDraft,
) -> Result<()> {
    let user_id = q.from.id;
    let Some(message) = q.message.as_ref() else {
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    };

    let new_order = NewOrder {
        title: draft.title.clone(),
        description: draft.description.clone(),
        cost: draft.cost,
        customer_telegram_id: user_id.to_string(),
        customer_name: Some(q.from.full_name()),
        marker_ids: draft.selected_marker_ids.clone(),
        payment_method: draft.payment_method_id.clone(),
    };

    let text = match ctx.crm.create_order(&new_order).await {
        Ok(_) => ctx.text(user_id, "order-created").await,
        Err(e) => {
            error!(user_id = %user_id, error = %e, "Order creation failed");
            format!("{}\n\n{}", ctx.text(user_id, "error").await, e)
        }
    };

    messaging::edit_or_send(
        bot,
        &ctx.sessions,
        user_id,
        message.chat().id,
        message.id(),
        &text,
        None,
    )
    .await?;

    dialogue.update(ConversationState::Idle).await?;
    bot.answer_callback_query(q.id.clone()).await?;
    Ok(())
}

/// Cancel button, valid in any state
pub async fn handle_cancel(
    bot: &Bot,
    q: &CallbackQuery,
    ctx: &AppContext,
    dialogue: &OrderDialogue,
) -> Result<()> {
    let user_id = q.from.id;

    dialogue.update(ConversationState::Idle).await?;
    ctx.sessions.clear_active_chat(user_id).await;

    if let Some(message) = q.message.as_ref() {
        let text = ctx.text(user_id, "order-cancelled").await;
        messaging::edit_or_send(
            bot,
            &ctx.sessions,
            user_id,
            message.chat().id,
            message.id(),
            &text,
            None,
        )
        .await?;
    }

    bot.answer_callback_query(q.id.clone()).await?;
    Ok(())
}

// Viewing and deletion

/// "My Orders" menu button
pub async fn view_orders(bot: &Bot, user_id: UserId, ctx: &AppContext) -> Result<()> {
    ctx.sessions.clear_active_chat(user_id).await;
    messaging::delete_tracked(bot, &ctx.sessions, user_id).await;

    let lang = ctx.language(user_id).await;
    match ctx.crm.get_customer_orders(&user_id.to_string()).await {
        Ok(orders) if orders.is_empty() => {
            let text = ctx.localizer.get_message(&lang, "orders-empty", None);
            let keyboard = main_menu_keyboard(&ctx.localizer, &lang);
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
        Ok(orders) => {
            let text = ctx.localizer.get_message(&lang, "orders-title", None);
            let keyboard = orders_keyboard(&orders, 0);
            ctx.sessions.set_orders_view(user_id, orders, 0).await;
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
        Err(e) => {
            error!(user_id = %user_id, error = %e, "Failed to fetch orders");
            let text = ctx.localizer.get_message(&lang, "error", None);
            bot.send_message(ChatId(user_id.0 as i64), text).await?;
        }
    }

    Ok(())
}

pub async fn handle_orders_page(
    bot: &Bot,
    q: &CallbackQuery,
    ctx: &AppContext,
    page: usize,
) -> Result<()> {
    let user_id = q.from.id;

    let view = ctx.sessions.orders_view(user_id).await;
    let orders = if view.orders.is_empty() {
        match ctx.crm.get_customer_orders(&user_id.to_string()).await {
            Ok(orders) => orders,
            Err(e) => {
                error!(user_id = %user_id, error = %e, "Failed to fetch orders");
                return answer_with_error(bot, ctx, q).await;
            }
        }
    } else {
        view.orders
    };

    let keyboard = orders_keyboard(&orders, page);
    ctx.sessions.set_orders_view(user_id, orders, page).await;

    if let Some(message) = q.message.as_ref() {
        if let Err(e) = bot
            .edit_message_reply_markup(message.chat().id, message.id())
            .reply_markup(keyboard)
            .await
        {
            error!(user_id = %user_id, error = %e, "Failed to page orders keyboard");
        }
    }

    bot.answer_callback_query(q.id.clone()).await?;
    Ok(())
}

/// `order:<id>`: the order detail screen, always re-fetched
pub async fn show_order_detail(
    bot: &Bot,
    q: &CallbackQuery,
    ctx: &AppContext,
    dialogue: &OrderDialogue,
    order_id: &str,
) -> Result<()> {
    let user_id = q.from.id;

    ctx.sessions.clear_active_chat(user_id).await;
    ctx.sessions.clear_orders_view(user_id).await;
    dialogue.update(ConversationState::Idle).await?;

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
        Ok(None) => answer_with_error(bot, ctx, q).await,
        Err(e) => {
            error!(user_id = %user_id, error = %e, "Failed to fetch order detail");
            answer_with_error(bot, ctx, q).await
        }
    }
}

pub async fn handle_delete_prompt(
    bot: &Bot,
    q: &CallbackQuery,
    ctx: &AppContext,
    order_id: &str,
) -> Result<()> {
    let user_id = q.from.id;
    let Some(message) = q.message.as_ref() else {
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    };

    match get_order_by_id(ctx, user_id, order_id).await {
        Ok(Some(order)) => {
            let lang = ctx.language(user_id).await;
            let text = ctx.localizer.get_message_with_args(
                &lang,
                "order-delete-confirm",
                &[("title", order.title.as_str())],
            );
            let keyboard = delete_confirm_keyboard(order_id, &ctx.localizer, &lang);
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
            error!(user_id = %user_id, error = %e, "Failed to fetch order for deletion");
            answer_with_error(bot, ctx, q).await
        }
    }
}

/// Confirmed deletion. The CRM refuses non-deletable statuses; that
/// refusal gets its own message instead of the generic error.
pub async fn handle_delete_confirmed(
    bot: &Bot,
    q: &CallbackQuery,
    ctx: &AppContext,
    order_id: &str,
) -> Result<()> {
    let user_id = q.from.id;
    let Some(message) = q.message.as_ref() else {
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    };

    let text = match ctx.crm.delete_order(order_id, &user_id.to_string()).await {
        Ok(()) => ctx.text(user_id, "order-deleted").await,
        Err(e) => {
            if is_delete_refusal(&e.to_string()) {
                ctx.text(user_id, "order-delete-error").await
            } else {
                error!(user_id = %user_id, error = %e, "Order deletion failed");
                ctx.text(user_id, "error").await
            }
        }
    };

    messaging::edit_or_send(
        bot,
        &ctx.sessions,
        user_id,
        message.chat().id,
        message.id(),
        &text,
        None,
    )
    .await?;

    bot.answer_callback_query(q.id.clone()).await?;
    Ok(())
}

pub async fn handle_back_to_orders(bot: &Bot, q: &CallbackQuery, ctx: &AppContext) -> Result<()> {
    let user_id = q.from.id;

    ctx.sessions.clear_active_chat(user_id).await;

    let Some(message) = q.message.as_ref() else {
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    };

    let page = ctx.sessions.orders_view(user_id).await.page;
    match ctx.crm.get_customer_orders(&user_id.to_string()).await {
        Ok(orders) => {
            let lang = ctx.language(user_id).await;
            let text = ctx.localizer.get_message(&lang, "orders-title", None);
            let keyboard = orders_keyboard(&orders, page);
            ctx.sessions.set_orders_view(user_id, orders, page).await;
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
        Err(e) => {
            error!(user_id = %user_id, error = %e, "Failed to fetch orders");
            answer_with_error(bot, ctx, q).await
        }
    }
}
