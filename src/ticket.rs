use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use teloxide::types::{ChatId, UserId};

use crate::platform::ChannelRef;

/// The chat whose members are granted access to every ticket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SupportRole(pub ChatId);

/// Whoever pressed "create a ticket".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Requester {
    pub id: UserId,
    pub name: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Permissions {
    pub view: bool,
    pub post: bool,
}

impl Permissions {
    pub const NONE: Permissions = Permissions {
        view: false,
        post: false,
    };
    pub const VIEW: Permissions = Permissions {
        view: true,
        post: false,
    };
    pub const VIEW_AND_POST: Permissions = Permissions {
        view: true,
        post: true,
    };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverwriteTarget {
    Everyone,
    Member(UserId),
    Role(SupportRole),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PermissionOverwrite {
    pub target: OverwriteTarget,
    pub allow: Permissions,
    pub deny: Permissions,
}

impl PermissionOverwrite {
    pub fn allow(target: OverwriteTarget, allow: Permissions) -> Self {
        Self {
            target,
            allow,
            deny: Permissions::NONE,
        }
    }

    pub fn deny(target: OverwriteTarget, deny: Permissions) -> Self {
        Self {
            target,
            allow: Permissions::NONE,
            deny,
        }
    }
}

/// Deterministic channel name for a requester's ticket.
pub fn ticket_channel_name(requester: UserId) -> String {
    format!("ticket-{}", requester.0)
}

/// Overwrites every ticket channel is created with: hidden from everyone,
/// open to its requester and to support.
pub fn ticket_overwrites(requester: UserId, support: SupportRole) -> Vec<PermissionOverwrite> {
    vec![
        PermissionOverwrite::deny(OverwriteTarget::Everyone, Permissions::VIEW),
        PermissionOverwrite::allow(OverwriteTarget::Member(requester), Permissions::VIEW_AND_POST),
        PermissionOverwrite::allow(OverwriteTarget::Role(support), Permissions::VIEW_AND_POST),
    ]
}

/// Effective permissions of `target` under a set of overwrites.
pub fn effective_permissions(
    overwrites: &[PermissionOverwrite],
    target: OverwriteTarget,
) -> Permissions {
    let mut effective = Permissions::NONE;
    for overwrite in overwrites.iter().filter(|o| o.target == target) {
        effective.view = (effective.view || overwrite.allow.view) && !overwrite.deny.view;
        effective.post = (effective.post || overwrite.allow.post) && !overwrite.deny.post;
    }
    effective
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TicketState {
    Open,
    AwaitingCloseConfirmation,
    Closing,
}

/// Names one ticket instance: its owner and the thread of its channel.
/// A later ticket of the same owner lives in another thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketKey {
    #[serde(rename = "o")]
    pub owner: UserId,
    #[serde(rename = "t")]
    pub thread: i32,
}

#[derive(Clone, Debug)]
pub struct Ticket {
    pub owner: UserId,
    pub channel: ChannelRef,
    pub opened_at: DateTime<Utc>,
    pub state: TicketState,
}

impl Ticket {
    pub fn open(owner: UserId, channel: ChannelRef) -> Self {
        Self {
            owner,
            channel,
            opened_at: Utc::now(),
            state: TicketState::Open,
        }
    }

    pub fn key(&self) -> TicketKey {
        TicketKey {
            owner: self.owner,
            thread: self.channel.thread_number(),
        }
    }
}
