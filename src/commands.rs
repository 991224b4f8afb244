// commands.rs
use teloxide::utils::command::BotCommands;

use crate::interaction::{Interaction, OutgoingMessage};

#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase")]
pub enum Command {
    /// Send the ticket creation message
    SendTicket,
}

/// Message posted by `/sendticket`.
pub fn invitation() -> OutgoingMessage {
    OutgoingMessage::text(
        "📩 <b>Welcome!</b>\nClick the button below to create a ticket and order your PL service.",
    )
    .with_control(Interaction::CreateTicket)
}
