//! Bot module for handling Telegram interactions
//!
//! This module is split into several submodules for better organization:
//! - `commands`: /start and /menu plus the menu screens they open
//! - `message_handler`: Routes text and photo messages by dialogue state
//! - `callback_handler`: Handles inline keyboard callback queries
//! - `orders`: The order creation conversation and the order list screens
//! - `chat`: The support chat relay, including media group batching
//! - `ui_builder`: Creates keyboards and formats messages

pub mod callback_handler;
pub mod chat;
pub mod commands;
pub mod message_handler;
pub mod orders;
pub mod ui_builder;

// Re-export main handler functions for use in main.rs
pub use callback_handler::callback_handler;
pub use commands::{command_handler, Command};
pub use message_handler::message_handler;

use anyhow::Result;
use teloxide::prelude::*;

use crate::context::AppContext;

/// Answer a callback query with the generic error toast
pub(crate) async fn answer_with_error(
    bot: &Bot,
    ctx: &AppContext,
    q: &CallbackQuery,
) -> Result<()> {
    let text = ctx.text(q.from.id, "error").await;
    bot.answer_callback_query(q.id.clone()).text(text).await?;
    Ok(())
}
