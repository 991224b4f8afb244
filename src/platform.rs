use std::future::Future;
use teloxide::types::{ChatId, ThreadId, UserId};
use thiserror::Error;

use crate::interaction::OutgoingMessage;
use crate::ticket::PermissionOverwrite;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("telegram request failed: {0}")]
    Request(#[from] teloxide::RequestError),
    #[error("platform rejected the request: {0}")]
    Rejected(String),
}

/// Handle to a ticket channel created by the platform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelRef {
    pub name: String,
    pub chat: ChatId,
    pub thread: ThreadId,
    /// Individual users the channel was opened to.
    pub members: Vec<UserId>,
}

impl ChannelRef {
    pub fn is_at(&self, chat: ChatId, thread: ThreadId) -> bool {
        self.chat == chat && self.thread == thread
    }

    pub fn thread_number(&self) -> i32 {
        self.thread.0 .0
    }
}

/// Everything the ticket lifecycle asks of the chat platform.
pub trait TicketPlatform: Send + Sync + 'static {
    fn create_private_channel(
        &self,
        name: &str,
        overwrites: &[PermissionOverwrite],
    ) -> impl Future<Output = Result<ChannelRef, PlatformError>> + Send;

    fn delete_channel(
        &self,
        channel: &ChannelRef,
    ) -> impl Future<Output = Result<(), PlatformError>> + Send;

    /// Posts into the channel, visible to everyone allowed to view it.
    fn post(
        &self,
        channel: &ChannelRef,
        message: OutgoingMessage,
    ) -> impl Future<Output = Result<(), PlatformError>> + Send;

    /// Delivers a message only `user` can see.
    fn notify(
        &self,
        user: UserId,
        message: OutgoingMessage,
    ) -> impl Future<Output = Result<(), PlatformError>> + Send;
}
