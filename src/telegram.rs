use log::warn;
use teloxide::prelude::*;
use teloxide::types::{ChatId, CustomEmojiId, ParseMode, ThreadId, UserId};
use teloxide::utils::html;

use crate::interaction::OutgoingMessage;
use crate::platform::{ChannelRef, PlatformError, TicketPlatform};
use crate::ticket::{effective_permissions, OverwriteTarget, PermissionOverwrite, SupportRole, Ticket};
use crate::util::get_random_topic_color;

/// Ticket channels as forum topics in the support group.
///
/// Telegram has no per-topic permissions, so the overwrites are honoured
/// structurally: the topic lives in a group only support can read, and every
/// member granted view follows the ticket through their private chat with the
/// bot (posts are mirrored there, replies relayed back).
#[derive(Clone)]
pub struct TelegramPlatform {
    bot: Bot,
    support: SupportRole,
}

impl TelegramPlatform {
    pub fn new(bot: Bot, support: SupportRole) -> Self {
        Self { bot, support }
    }

    pub fn support(&self) -> SupportRole {
        self.support
    }

    pub async fn send(
        &self,
        chat: ChatId,
        thread: Option<ThreadId>,
        message: &OutgoingMessage,
    ) -> Result<Message, teloxide::RequestError> {
        let mut request = self
            .bot
            .send_message(chat, message.text.clone())
            .parse_mode(ParseMode::Html);
        if let Some(thread) = thread {
            request = request.message_thread_id(thread);
        }
        if let Some(keyboard) = message.keyboard() {
            request = request.reply_markup(keyboard);
        }
        request.await
    }

    /// Forwards what the requester wrote privately into the ticket topic.
    pub async fn relay_to_support(
        &self,
        ticket: &Ticket,
        sender: &str,
        text: &str,
    ) -> Result<(), PlatformError> {
        let message = OutgoingMessage::text(format!(
            "<b>{}:</b> {}",
            html::escape(sender),
            html::escape(text)
        ));
        self.send(ticket.channel.chat, Some(ticket.channel.thread), &message)
            .await?;
        Ok(())
    }

    /// Forwards a support reply from the ticket topic to the requester.
    pub async fn relay_to_requester(&self, ticket: &Ticket, text: &str) -> Result<(), PlatformError> {
        let message = OutgoingMessage::text(format!("💬 Support: {}", html::escape(text)));
        self.send(ChatId::from(ticket.owner), None, &message).await?;
        Ok(())
    }

    fn check_overwrites(&self, overwrites: &[PermissionOverwrite]) -> Result<(), PlatformError> {
        if effective_permissions(overwrites, OverwriteTarget::Everyone).view {
            return Err(PlatformError::Rejected(
                "ticket topics cannot be visible to everyone".into(),
            ));
        }
        let foreign_role = overwrites.iter().any(|o| {
            matches!(o.target, OverwriteTarget::Role(role) if role != self.support)
        });
        if foreign_role {
            return Err(PlatformError::Rejected(
                "only the support group can be granted a ticket topic".into(),
            ));
        }
        Ok(())
    }
}

impl TicketPlatform for TelegramPlatform {
    async fn create_private_channel(
        &self,
        name: &str,
        overwrites: &[PermissionOverwrite],
    ) -> Result<ChannelRef, PlatformError> {
        self.check_overwrites(overwrites)?;

        let topic = self
            .bot
            .create_forum_topic(self.support.0, name)
            .icon_color(get_random_topic_color())
            .icon_custom_emoji_id(CustomEmojiId(String::new()))
            .await?;

        let members = overwrites
            .iter()
            .filter_map(|o| match o.target {
                OverwriteTarget::Member(user) => Some(user),
                _ => None,
            })
            .filter(|&user| effective_permissions(overwrites, OverwriteTarget::Member(user)).view)
            .collect();

        Ok(ChannelRef {
            name: name.to_string(),
            chat: self.support.0,
            thread: topic.thread_id,
            members,
        })
    }

    async fn delete_channel(&self, channel: &ChannelRef) -> Result<(), PlatformError> {
        self.bot
            .delete_forum_topic(channel.chat, channel.thread)
            .await?;
        Ok(())
    }

    async fn post(&self, channel: &ChannelRef, message: OutgoingMessage) -> Result<(), PlatformError> {
        self.send(channel.chat, Some(channel.thread), &message).await?;

        for &member in &channel.members {
            if let Err(err) = self.send(ChatId::from(member), None, &message).await {
                warn!("Could not mirror {} to {member}: {err}", channel.name);
            }
        }
        Ok(())
    }

    async fn notify(&self, user: UserId, message: OutgoingMessage) -> Result<(), PlatformError> {
        self.send(ChatId::from(user), None, &message).await?;
        Ok(())
    }
}
