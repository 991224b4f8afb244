use chrono::Utc;
use log::{debug, info, warn};
use teloxide::types::{ChatId, ThreadId, UserId};

use crate::error::{TicketError, TicketResult};
use crate::interaction::{Interaction, OutgoingMessage};
use crate::order::OrderForm;
use crate::platform::TicketPlatform;
use crate::state::SessionDirectory;
use crate::ticket::{
    ticket_channel_name, ticket_overwrites, Requester, SupportRole, Ticket, TicketKey,
    TicketState,
};
use crate::util::mention;

/// What the acting user gets to see once an interaction is handled.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    /// Short text only the actor sees.
    Notice(String),
    /// Message with controls only the actor sees.
    Prompt(OutgoingMessage),
    /// Everything worth showing was already posted.
    Done,
}

/// Ticket lifecycle: provisioning, order collection and closure, all going
/// through one session directory and one platform handle.
pub struct TicketService<P> {
    platform: P,
    directory: SessionDirectory,
    support: SupportRole,
}

impl<P: TicketPlatform> TicketService<P> {
    pub fn new(platform: P, support: SupportRole) -> Self {
        Self {
            platform,
            directory: SessionDirectory::new(),
            support,
        }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn directory(&self) -> &SessionDirectory {
        &self.directory
    }

    pub async fn ticket_for(&self, owner: UserId) -> Option<Ticket> {
        self.directory.get(owner).await
    }

    pub async fn ticket_at(&self, chat: ChatId, thread: ThreadId) -> Option<Ticket> {
        self.directory.find_by_channel(chat, thread).await
    }

    pub async fn provision(&self, requester: &Requester) -> TicketResult<Reply> {
        if let Err(err) = self.directory.reserve(requester.id).await {
            debug!("Refused ticket for {}: {err}", requester.id);
            return Err(err);
        }

        // The requester follows the ticket from their private chat, so they
        // must be reachable there before a channel is opened for them.
        let greeting = OutgoingMessage::text("🎫 Opening your ticket, it will show up right here.");
        if let Err(err) = self.platform.notify(requester.id, greeting).await {
            self.directory.release(requester.id).await;
            info!("{} cannot be messaged privately: {err}", requester.id);
            return Err(TicketError::RequesterUnreachable(requester.id));
        }

        let name = ticket_channel_name(requester.id);
        let overwrites = ticket_overwrites(requester.id, self.support);
        let channel = match self.platform.create_private_channel(&name, &overwrites).await {
            Ok(channel) => channel,
            Err(err) => {
                self.directory.release(requester.id).await;
                return Err(err.into());
            }
        };
        let ticket = Ticket::open(requester.id, channel.clone());
        let key = ticket.key();
        self.directory.register(ticket).await;
        info!("Opened {} for {}", channel.name, requester.name);

        self.platform
            .post(
                &channel,
                OutgoingMessage::text(format!(
                    "👋 Hello {}! Please fill out the details of your Power Leveling order.",
                    mention(requester)
                )),
            )
            .await?;
        self.platform
            .post(
                &channel,
                OutgoingMessage::text("Press the button below when you are ready.")
                    .with_control(Interaction::OpenOrderForm(key)),
            )
            .await?;

        Ok(Reply::Notice(format!("✅ Ticket created: {}", channel.name)))
    }

    /// A fresh form for the ticket; anyone may open it.
    pub async fn open_order_form(&self, key: TicketKey) -> TicketResult<OrderForm> {
        let ticket = self.live_ticket(key).await?;
        Ok(OrderForm::new(ticket.owner, ticket.channel))
    }

    /// Checks the form still belongs to the live ticket before the one-shot
    /// submission, so a form outliving its ticket is refused without being
    /// used up.
    pub async fn submit_order(&self, form: &mut OrderForm, submitter: UserId) -> TicketResult<Reply> {
        let key = TicketKey {
            owner: form.owner(),
            thread: form.channel().thread_number(),
        };
        let ticket = self.live_ticket(key).await?;
        let order = match form.submit(submitter) {
            Ok(order) => order,
            Err(err) => {
                info!("Order for {} refused: {err}", ticket.channel.name);
                return Err(err);
            }
        };

        self.platform
            .post(
                &ticket.channel,
                OutgoingMessage::text(order.confirmation())
                    .with_control(Interaction::RequestClose(key)),
            )
            .await?;
        info!("Order recorded in {}", ticket.channel.name);
        Ok(Reply::Done)
    }

    pub async fn request_close(&self, actor: UserId, key: TicketKey) -> TicketResult<Reply> {
        let ticket = self
            .directory
            .transition(
                key,
                &[TicketState::Open, TicketState::AwaitingCloseConfirmation],
                TicketState::AwaitingCloseConfirmation,
            )
            .await?;
        debug!("{actor} asked to close {}", ticket.channel.name);

        Ok(Reply::Prompt(
            OutgoingMessage::text("Are you sure you want to close this ticket?")
                .with_control(Interaction::ConfirmClose(key))
                .with_control(Interaction::CancelClose(key)),
        ))
    }

    /// Deletes the ticket channel and frees the owner to open a new ticket.
    /// Prompts never expire, so a ticket that went back to `Open` after a
    /// cancel can still be confirmed.
    pub async fn confirm_close(&self, actor: UserId, key: TicketKey) -> TicketResult<Reply> {
        let ticket = self
            .directory
            .transition(
                key,
                &[TicketState::Open, TicketState::AwaitingCloseConfirmation],
                TicketState::Closing,
            )
            .await?;
        let owner = ticket.owner;

        if let Err(err) = self.platform.delete_channel(&ticket.channel).await {
            // Only this task moves a ticket out of Closing.
            if let Err(restore) = self
                .directory
                .transition(key, &[TicketState::Closing], ticket.state)
                .await
            {
                warn!("Could not restore {} after failed delete: {restore}", ticket.channel.name);
            }
            return Err(err.into());
        }
        self.directory.release(owner).await;

        let open_for = Utc::now() - ticket.opened_at;
        info!(
            "{actor} closed {} after {} minutes",
            ticket.channel.name,
            open_for.num_minutes()
        );

        if actor != owner {
            let notice = OutgoingMessage::text(format!(
                "🔒 Your ticket {} has been closed.",
                ticket.channel.name
            ));
            if let Err(err) = self.platform.notify(owner, notice).await {
                warn!("Could not tell {owner} about the closed ticket: {err}");
            }
        }
        Ok(Reply::Notice(format!("🔒 {} closed.", ticket.channel.name)))
    }

    pub async fn cancel_close(&self, actor: UserId, key: TicketKey) -> TicketResult<Reply> {
        let ticket = self
            .directory
            .transition(
                key,
                &[TicketState::Open, TicketState::AwaitingCloseConfirmation],
                TicketState::Open,
            )
            .await?;
        debug!("{actor} kept {} open", ticket.channel.name);
        Ok(Reply::Notice("❎ Ticket close canceled.".to_string()))
    }

    async fn live_ticket(&self, key: TicketKey) -> TicketResult<Ticket> {
        match self.directory.get(key.owner).await {
            Some(ticket) if ticket.key() != key => Err(TicketError::NoOpenTicket(key.owner)),
            Some(ticket) if ticket.state != TicketState::Closing => Ok(ticket),
            Some(_) => Err(TicketError::AlreadyClosing(key.owner)),
            None => Err(TicketError::NoOpenTicket(key.owner)),
        }
    }
}
