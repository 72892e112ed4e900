//! src/access/mod.rs
//!
//! Ownership checks for session operations. Every lifecycle entry point asks
//! `authorize` instead of inlining role conditionals.

use solace_common::models::identity::{Identity, Role};
use crate::Error;

/// The two parties of a session (scheduled or chat).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parties {
    pub user_id: i64,
    pub supporter_id: i64,
}

impl Parties {
    pub fn new(user_id: i64, supporter_id: i64) -> Self {
        Self { user_id, supporter_id }
    }

    /// The counterpart of `id`, if `id` is one of the two.
    pub fn other(&self, id: i64) -> Option<i64> {
        if id == self.user_id {
            Some(self.supporter_id)
        } else if id == self.supporter_id {
            Some(self.user_id)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    StartSession,
    EndSession,
    CancelSession,
    OpenChat,
    EndChat,
    ReadChat,
    /// Writing into a chat. Admins are not parties, so they are not exempt.
    SendMessage,
    /// Flipping the read flag on a message in the chat.
    MarkRead,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    Admin,
    OwningSupporter,
    Participant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Allowed(Grant),
    Denied,
}

impl Capability {
    pub fn is_allowed(self) -> bool {
        matches!(self, Capability::Allowed(_))
    }

    /// Fails closed with `Error::Forbidden`.
    pub fn require(self, what: &str) -> Result<Grant, Error> {
        match self {
            Capability::Allowed(grant) => Ok(grant),
            Capability::Denied => Err(Error::Forbidden(format!("Not allowed to {}", what))),
        }
    }
}

pub fn authorize(identity: &Identity, parties: Parties, action: Action) -> Capability {
    let is_supporter = identity.role == Role::Supporter && identity.id == parties.supporter_id;
    let is_user = identity.id == parties.user_id;

    match action {
        Action::SendMessage | Action::MarkRead => {
            if is_supporter {
                Capability::Allowed(Grant::OwningSupporter)
            } else if is_user {
                Capability::Allowed(Grant::Participant)
            } else {
                Capability::Denied
            }
        }
        _ if identity.role == Role::Admin => Capability::Allowed(Grant::Admin),
        Action::StartSession => {
            if is_supporter {
                Capability::Allowed(Grant::OwningSupporter)
            } else {
                Capability::Denied
            }
        }
        Action::EndSession
        | Action::CancelSession
        | Action::OpenChat
        | Action::EndChat
        | Action::ReadChat => {
            if is_supporter {
                Capability::Allowed(Grant::OwningSupporter)
            } else if is_user {
                Capability::Allowed(Grant::Participant)
            } else {
                Capability::Denied
            }
        }
    }
}

/// Listing someone's calendar or inbox: only that person or an admin.
pub fn can_view_as(identity: &Identity, subject_id: i64) -> Capability {
    if identity.role == Role::Admin {
        Capability::Allowed(Grant::Admin)
    } else if identity.id == subject_id {
        Capability::Allowed(Grant::Participant)
    } else {
        Capability::Denied
    }
}
