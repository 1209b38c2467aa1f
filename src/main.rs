//! Entry point: wires the Telegram dispatcher and the CRM webhook server
//! to one shared application context.

use std::sync::Arc;

use anyhow::Result;
use teloxide::dispatching::dialogue::{self, InMemStorage};
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crm_bot::bot::{self, Command};
use crm_bot::config::Config;
use crm_bot::context::AppContext;
use crm_bot::crm::CrmClient;
use crm_bot::dialogue::ConversationState;
use crm_bot::localization::LocalizationManager;
use crm_bot::webhook;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crm_bot=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting CRM Telegram bot");

    let config = Config::from_env()?;
    info!(crm_api_url = %config.crm_api_url, "Configuration loaded");

    let localizer = LocalizationManager::new()?;
    let crm = CrmClient::new(&config.crm_api_url);
    let ctx = Arc::new(AppContext::new(config, crm, localizer));

    let bot = Bot::new(&ctx.config.bot_token);

    match bot.get_me().await {
        Ok(me) => info!(username = %me.username(), "Bot authenticated"),
        Err(e) => error!(error = %e, "Failed to fetch bot identity"),
    }

    match bot.set_my_commands(Command::bot_commands()).await {
        Ok(_) => info!("Bot commands registered"),
        Err(e) => error!(error = %e, "Failed to register bot commands"),
    }

    // The webhook server runs alongside the dispatcher for the whole
    // process lifetime
    let webhook_bot = bot.clone();
    let webhook_ctx = Arc::clone(&ctx);
    tokio::spawn(async move {
        let host = webhook_ctx.config.webhook_host.clone();
        let port = webhook_ctx.config.webhook_port;
        if let Err(e) = webhook::serve(webhook_bot, webhook_ctx, &host, port).await {
            error!(error = %e, "Webhook server error");
        }
    });

    info!("Bot initialized, starting dispatcher");

    let handler = dialogue::enter::<Update, InMemStorage<ConversationState>, ConversationState, _>()
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint(bot::command_handler),
        )
        .branch(Update::filter_message().endpoint(bot::message_handler))
        .branch(Update::filter_callback_query().endpoint(bot::callback_handler));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![
            InMemStorage::<ConversationState>::new(),
            ctx
        ])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("Bot stopped");
    Ok(())
}
