use teloxide::dispatching::dialogue::InMemStorageError;
use teloxide::types::UserId;
use thiserror::Error;

use crate::platform::PlatformError;

pub type TicketResult<T> = Result<T, TicketError>;

#[derive(Debug, Error)]
pub enum TicketError {
    #[error("user {0} already has an open ticket")]
    AlreadyOpen(UserId),
    #[error("user {submitter} tried to submit the order form of ticket owner {owner}")]
    NotOwner { owner: UserId, submitter: UserId },
    #[error("order form of ticket owner {0} was already submitted")]
    AlreadySubmitted(UserId),
    #[error("user {0} has no open ticket")]
    NoOpenTicket(UserId),
    #[error("user {0} cannot receive private messages from the bot")]
    RequesterUnreachable(UserId),
    #[error("ticket of user {0} is already being closed")]
    AlreadyClosing(UserId),
    #[error("order field {0} is required")]
    MissingField(&'static str),
    #[error("unknown interaction payload {0:?}")]
    UnknownInteraction(String),
    #[error(transparent)]
    Platform(#[from] PlatformError),
    #[error("dialogue storage failed: {0}")]
    Dialogue(#[from] InMemStorageError),
}

impl TicketError {
    /// Text shown to the acting user for rejections that are part of normal
    /// operation. `None` means the failure is unexpected and only gets logged.
    pub fn notice(&self) -> Option<String> {
        let notice = match self {
            TicketError::AlreadyOpen(_) => "❗ You already have a ticket open.".to_string(),
            TicketError::NotOwner { .. } => {
                "❗ Only the ticket owner can submit this form.".to_string()
            }
            TicketError::AlreadySubmitted(_) => {
                "❗ This order form was already submitted.".to_string()
            }
            TicketError::NoOpenTicket(_) => "❗ This ticket is no longer open.".to_string(),
            TicketError::RequesterUnreachable(_) => {
                "❗ I can't message you yet. Open a private chat with me, press Start, then create the ticket again.".to_string()
            }
            TicketError::AlreadyClosing(_) => "⏳ This ticket is already being closed.".to_string(),
            TicketError::MissingField(field) => format!("❗ {field} is required, please send it again."),
            TicketError::UnknownInteraction(_) => "❗ This button is no longer supported.".to_string(),
            TicketError::Platform(_) | TicketError::Dialogue(_) => return None,
        };
        Some(notice)
    }
}
