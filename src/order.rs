use teloxide::types::UserId;
use teloxide::utils::html;

use crate::error::{TicketError, TicketResult};
use crate::platform::ChannelRef;

pub const NO_BONUS: &str = "None";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Order {
    pub level_range: String,
    pub characters: String,
    pub bonus: Option<String>,
}

impl Order {
    pub fn bonus_display(&self) -> &str {
        self.bonus.as_deref().unwrap_or(NO_BONUS)
    }

    /// HTML confirmation posted into the ticket channel.
    pub fn confirmation(&self) -> String {
        format!(
            "📦 Your order has been recorded:\n\n\
             <b>✅ Order Confirmation</b>\n\
             <b>Level Range</b>\n{}\n\
             <b>Number of Characters</b>\n{}\n\
             <b>Bonus</b>\n{}",
            html::escape(&self.level_range),
            html::escape(&self.characters),
            html::escape(self.bonus_display()),
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormStep {
    LevelRange,
    Characters,
    Bonus,
    Submitted,
}

impl FormStep {
    /// Question asked for this step; a submitted form asks nothing.
    pub fn prompt(&self) -> Option<&'static str> {
        let prompt = match self {
            FormStep::LevelRange => "📝 <b>Level Range</b>\ne.g., 1-200",
            FormStep::Characters => "📝 <b>Number of Characters</b>\ne.g., 1",
            FormStep::Bonus => "📝 <b>Bonus (optional)</b>\ne.g., Wisdom Set\nSend /skip to leave it empty.",
            FormStep::Submitted => return None,
        };
        Some(prompt)
    }
}

/// One instance of the "Power Leveling Order" form, opened by whoever
/// pressed the button but only submittable by the ticket owner.
#[derive(Clone, Debug)]
pub struct OrderForm {
    owner: UserId,
    channel: ChannelRef,
    level_range: Option<String>,
    characters: Option<String>,
    bonus: Option<String>,
    step: FormStep,
}

impl OrderForm {
    pub fn new(owner: UserId, channel: ChannelRef) -> Self {
        Self {
            owner,
            channel,
            level_range: None,
            characters: None,
            bonus: None,
            step: FormStep::LevelRange,
        }
    }

    pub fn owner(&self) -> UserId {
        self.owner
    }

    pub fn channel(&self) -> &ChannelRef {
        &self.channel
    }

    pub fn step(&self) -> FormStep {
        self.step
    }

    pub fn is_submitted(&self) -> bool {
        self.step == FormStep::Submitted
    }

    /// Stores the answer for the current step and moves to the next one.
    /// Required answers may not be blank; a blank bonus means no bonus.
    pub fn answer(&mut self, text: &str) -> TicketResult<FormStep> {
        let text = text.trim();
        match self.step {
            FormStep::LevelRange => {
                self.level_range = Some(required("Level Range", text)?);
                self.step = FormStep::Characters;
            }
            FormStep::Characters => {
                self.characters = Some(required("Number of Characters", text)?);
                self.step = FormStep::Bonus;
            }
            FormStep::Bonus => {
                self.bonus = (!text.is_empty()).then(|| text.to_string());
            }
            FormStep::Submitted => return Err(TicketError::AlreadySubmitted(self.owner)),
        }
        Ok(self.step)
    }

    /// Accepts the form on behalf of `submitter`. Anyone but the owner is
    /// turned away and the form is left exactly as it was.
    pub fn submit(&mut self, submitter: UserId) -> TicketResult<Order> {
        if self.is_submitted() {
            return Err(TicketError::AlreadySubmitted(self.owner));
        }
        if submitter != self.owner {
            return Err(TicketError::NotOwner {
                owner: self.owner,
                submitter,
            });
        }
        let level_range = self
            .level_range
            .clone()
            .ok_or(TicketError::MissingField("Level Range"))?;
        let characters = self
            .characters
            .clone()
            .ok_or(TicketError::MissingField("Number of Characters"))?;

        self.step = FormStep::Submitted;
        Ok(Order {
            level_range,
            characters,
            bonus: self.bonus.clone(),
        })
    }
}

fn required(field: &'static str, text: &str) -> TicketResult<String> {
    if text.is_empty() {
        return Err(TicketError::MissingField(field));
    }
    Ok(text.to_string())
}
