use colored::Colorize;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use ticket_desk::commands::Command;
use ticket_desk::config::Config;
use ticket_desk::handlers::{self, OrderDialogueStorage};
use ticket_desk::keep_alive;
use ticket_desk::service::TicketService;
use ticket_desk::telegram::TelegramPlatform;

type StartupError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    pretty_env_logger::init();

    if let Err(err) = run().await {
        log::error!("{} {err}", "Startup failed:".red().bold());
        std::process::exit(1);
    }
}

async fn run() -> Result<(), StartupError> {
    let config = Config::from_env()?;
    let bot = Bot::from_env();

    let me = bot.get_me().await?;
    log::info!("✅ Logged in as {}", me.username().green().bold());

    // Sync the command list once; the bot still works without it.
    let commands = Command::bot_commands();
    match bot.set_my_commands(commands.clone()).await {
        Ok(_) => log::info!("✅ Synced {} commands", commands.len().to_string().cyan()),
        Err(err) => log::error!("Failed to sync commands: {err}"),
    }

    keep_alive::spawn(config.keep_alive_addr);

    let desk = Arc::new(TicketService::new(
        TelegramPlatform::new(bot.clone(), config.support),
        config.support,
    ));

    Dispatcher::builder(bot, handlers::schema())
        .dependencies(dptree::deps![desk, OrderDialogueStorage::new()])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
    Ok(())
}
