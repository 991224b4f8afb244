use std::collections::HashMap;
use std::sync::Arc;
use teloxide::types::{ChatId, ThreadId, UserId};
use tokio::sync::Mutex;

use crate::error::{TicketError, TicketResult};
use crate::ticket::{Ticket, TicketKey, TicketState};

#[derive(Clone, Debug)]
enum Slot {
    /// Channel creation is in flight.
    Provisioning,
    Open(Ticket),
}

/// Maps every requester to at most one ticket.
///
/// Reservation and registration happen under one lock, so two concurrent
/// "create a ticket" presses by the same user can never both pass the check.
#[derive(Clone, Default)]
pub struct SessionDirectory {
    slots: Arc<Mutex<HashMap<UserId, Slot>>>,
}

impl SessionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn has_open_ticket(&self, requester: UserId) -> bool {
        self.slots.lock().await.contains_key(&requester)
    }

    /// Claims the requester's slot, failing if one is already taken.
    pub async fn reserve(&self, requester: UserId) -> TicketResult<()> {
        let mut slots = self.slots.lock().await;
        if slots.contains_key(&requester) {
            return Err(TicketError::AlreadyOpen(requester));
        }
        slots.insert(requester, Slot::Provisioning);
        Ok(())
    }

    pub async fn register(&self, ticket: Ticket) {
        self.slots.lock().await.insert(ticket.owner, Slot::Open(ticket));
    }

    pub async fn release(&self, requester: UserId) -> Option<Ticket> {
        match self.slots.lock().await.remove(&requester) {
            Some(Slot::Open(ticket)) => Some(ticket),
            _ => None,
        }
    }

    pub async fn get(&self, requester: UserId) -> Option<Ticket> {
        match self.slots.lock().await.get(&requester) {
            Some(Slot::Open(ticket)) => Some(ticket.clone()),
            _ => None,
        }
    }

    pub async fn find_by_channel(&self, chat: ChatId, thread: ThreadId) -> Option<Ticket> {
        let slots = self.slots.lock().await;
        slots.values().find_map(|slot| match slot {
            Slot::Open(ticket) if ticket.channel.is_at(chat, thread) => Some(ticket.clone()),
            _ => None,
        })
    }

    /// Moves the ticket named by `key` to `to` if its current state is one
    /// of `from`. A key from an earlier ticket of the same owner matches
    /// nothing. Returns the ticket as it was before the move.
    pub async fn transition(
        &self,
        key: TicketKey,
        from: &[TicketState],
        to: TicketState,
    ) -> TicketResult<Ticket> {
        let mut slots = self.slots.lock().await;
        let ticket = match slots.get_mut(&key.owner) {
            Some(Slot::Open(ticket)) if ticket.key() == key => ticket,
            _ => return Err(TicketError::NoOpenTicket(key.owner)),
        };
        if !from.contains(&ticket.state) {
            return Err(match ticket.state {
                TicketState::Closing => TicketError::AlreadyClosing(key.owner),
                _ => TicketError::NoOpenTicket(key.owner),
            });
        }
        let before = ticket.clone();
        ticket.state = to;
        Ok(before)
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    #[cfg(test)]
    pub async fn is_empty(&self) -> bool {
        self.slots.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::ChannelRef;
    use teloxide::types::MessageId;

    fn ticket(owner: u64, thread: i32) -> Ticket {
        Ticket::open(
            UserId(owner),
            ChannelRef {
                name: format!("ticket-{owner}"),
                chat: ChatId(-1000),
                thread: ThreadId(MessageId(thread)),
                members: vec![UserId(owner)],
            },
        )
    }

    #[tokio::test]
    async fn second_reservation_is_refused() {
        let directory = SessionDirectory::new();
        directory.reserve(UserId(42)).await.unwrap();

        let err = directory.reserve(UserId(42)).await.unwrap_err();
        assert!(matches!(err, TicketError::AlreadyOpen(UserId(42))));
        assert!(directory.has_open_ticket(UserId(42)).await);
        assert_eq!(directory.len().await, 1);
    }

    #[tokio::test]
    async fn concurrent_reservations_admit_exactly_one() {
        let directory = SessionDirectory::new();
        let attempts: Vec<_> = (0..8)
            .map(|_| {
                let directory = directory.clone();
                tokio::spawn(async move { directory.reserve(UserId(7)).await.is_ok() })
            })
            .collect();

        let mut admitted = 0;
        for attempt in attempts {
            if attempt.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 1);
    }

    #[tokio::test]
    async fn release_frees_the_requester() {
        let directory = SessionDirectory::new();
        directory.reserve(UserId(42)).await.unwrap();
        directory.register(ticket(42, 5)).await;

        let released = directory.release(UserId(42)).await.unwrap();
        assert_eq!(released.channel.name, "ticket-42");
        assert!(!directory.has_open_ticket(UserId(42)).await);
        directory.reserve(UserId(42)).await.unwrap();
    }

    #[tokio::test]
    async fn lookup_by_channel_ignores_other_threads() {
        let directory = SessionDirectory::new();
        directory.register(ticket(42, 5)).await;
        directory.register(ticket(43, 6)).await;

        let found = directory
            .find_by_channel(ChatId(-1000), ThreadId(MessageId(6)))
            .await
            .unwrap();
        assert_eq!(found.owner, UserId(43));
        assert!(directory
            .find_by_channel(ChatId(-1000), ThreadId(MessageId(7)))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn transition_checks_current_state() {
        let directory = SessionDirectory::new();
        let ticket = ticket(42, 5);
        directory.register(ticket.clone()).await;

        let before = directory
            .transition(ticket.key(), &[TicketState::Open], TicketState::Closing)
            .await
            .unwrap();
        assert_eq!(before.state, TicketState::Open);

        let err = directory
            .transition(ticket.key(), &[TicketState::Open], TicketState::Closing)
            .await
            .unwrap_err();
        assert!(matches!(err, TicketError::AlreadyClosing(UserId(42))));
    }

    #[tokio::test]
    async fn transition_ignores_keys_of_earlier_tickets() {
        let directory = SessionDirectory::new();
        let earlier = ticket(42, 5);
        directory.register(ticket(42, 6)).await;

        let err = directory
            .transition(earlier.key(), &[TicketState::Open], TicketState::Closing)
            .await
            .unwrap_err();
        assert!(matches!(err, TicketError::NoOpenTicket(UserId(42))));
        assert_eq!(directory.get(UserId(42)).await.unwrap().state, TicketState::Open);
    }
}
