use serde::{Deserialize, Serialize};
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::error::{TicketError, TicketResult};
use crate::ticket::TicketKey;

/// Telegram refuses callback data longer than this.
pub const MAX_PAYLOAD_LEN: usize = 64;

/// Every control the bot attaches to its messages. The variant travels in the
/// button's callback data, so a button stays valid for as long as the message
/// it sits on exists. Ticket controls name the exact ticket they were posted
/// for; once that ticket is gone they no longer act on anything.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "k", rename_all = "snake_case")]
pub enum Interaction {
    CreateTicket,
    OpenOrderForm(TicketKey),
    RequestClose(TicketKey),
    ConfirmClose(TicketKey),
    CancelClose(TicketKey),
}

impl Interaction {
    pub fn label(&self) -> &'static str {
        match self {
            Interaction::CreateTicket => "🎫 Create a Ticket",
            Interaction::OpenOrderForm(_) => "📝 Fill Order Details",
            Interaction::RequestClose(_) => "❌ Close Ticket",
            Interaction::ConfirmClose(_) => "✅ Yes, close it",
            Interaction::CancelClose(_) => "❌ Cancel",
        }
    }

    pub fn encode(&self) -> String {
        // Only integers and fixed tags, cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn decode(data: &str) -> TicketResult<Self> {
        serde_json::from_str(data).map_err(|_| TicketError::UnknownInteraction(data.to_string()))
    }

    pub fn button(&self) -> InlineKeyboardButton {
        InlineKeyboardButton::callback(self.label(), self.encode())
    }
}

/// A message the bot sends, with its controls laid out on a single row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutgoingMessage {
    /// HTML-formatted body.
    pub text: String,
    pub controls: Vec<Interaction>,
}

impl OutgoingMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            controls: Vec::new(),
        }
    }

    pub fn with_control(mut self, control: Interaction) -> Self {
        self.controls.push(control);
        self
    }

    pub fn keyboard(&self) -> Option<InlineKeyboardMarkup> {
        if self.controls.is_empty() {
            return None;
        }
        let row: Vec<_> = self.controls.iter().map(Interaction::button).collect();
        Some(InlineKeyboardMarkup::new(vec![row]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::types::UserId;

    #[test]
    fn payloads_fit_callback_data_limit() {
        let key = TicketKey {
            owner: UserId(u64::MAX),
            thread: i32::MIN,
        };
        for interaction in [
            Interaction::CreateTicket,
            Interaction::OpenOrderForm(key),
            Interaction::RequestClose(key),
            Interaction::ConfirmClose(key),
            Interaction::CancelClose(key),
        ] {
            let data = interaction.encode();
            assert!(data.len() <= MAX_PAYLOAD_LEN, "{data} is too long");
            assert_eq!(Interaction::decode(&data).unwrap(), interaction);
        }
    }

    #[test]
    fn ticket_controls_carry_owner_and_thread() {
        let key = TicketKey {
            owner: UserId(42),
            thread: 7,
        };
        assert_eq!(
            Interaction::ConfirmClose(key).encode(),
            r#"{"k":"confirm_close","o":42,"t":7}"#
        );
    }

    #[test]
    fn foreign_payload_is_rejected() {
        let err = Interaction::decode("create_ticket").unwrap_err();
        assert!(matches!(err, TicketError::UnknownInteraction(data) if data == "create_ticket"));
    }

    #[test]
    fn controls_share_one_keyboard_row() {
        let key = TicketKey {
            owner: UserId(42),
            thread: 1,
        };
        let message = OutgoingMessage::text("Are you sure you want to close this ticket?")
            .with_control(Interaction::ConfirmClose(key))
            .with_control(Interaction::CancelClose(key));

        let keyboard = message.keyboard().unwrap();
        assert_eq!(keyboard.inline_keyboard.len(), 1);
        assert_eq!(keyboard.inline_keyboard[0].len(), 2);
        assert_eq!(keyboard.inline_keyboard[0][0].text, "✅ Yes, close it");
        assert!(OutgoingMessage::text("plain").keyboard().is_none());
    }
}
