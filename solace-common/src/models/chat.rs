// File: solace-common/src/models/chat.rs

use std::fmt;
use std::str::FromStr;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::models::session::SessionType;

pub const DEFAULT_MESSAGE_TYPE: &str = "text";

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Eq, PartialEq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ChatSessionStatus {
    Active,
    Completed,
}

impl fmt::Display for ChatSessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatSessionStatus::Active => write!(f, "active"),
            ChatSessionStatus::Completed => write!(f, "completed"),
        }
    }
}

impl FromStr for ChatSessionStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(ChatSessionStatus::Active),
            "completed" => Ok(ChatSessionStatus::Completed),
            _ => Err(format!("Unknown chat session status: {}", s)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub session_id: i64,
    pub user_id: i64,
    pub supporter_id: i64,
    pub session_type: SessionType,
    pub status: ChatSessionStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub title: Option<String>,
    /// Link to the scheduled session this chat was opened for, if any.
    pub scheduled_session_id: Option<i64>,
}

/// Create-if-absent, else reactivate, keyed on the (user, supporter) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct EnsureActiveChatSession {
    pub user_id: i64,
    pub supporter_id: i64,
    pub session_type: SessionType,
    pub title: Option<String>,
    pub scheduled_session_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnsureOutcome {
    Created(ChatSession),
    Reactivated(ChatSession),
    AlreadyActive(ChatSession),
}

impl EnsureOutcome {
    pub fn session(&self) -> &ChatSession {
        match self {
            EnsureOutcome::Created(s)
            | EnsureOutcome::Reactivated(s)
            | EnsureOutcome::AlreadyActive(s) => s,
        }
    }

    pub fn into_session(self) -> ChatSession {
        match self {
            EnsureOutcome::Created(s)
            | EnsureOutcome::Reactivated(s)
            | EnsureOutcome::AlreadyActive(s) => s,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EnsureOutcome::Created(_) => "created",
            EnsureOutcome::Reactivated(_) => "reactivated",
            EnsureOutcome::AlreadyActive(_) => "already_active",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub message_id: i64,
    pub session_id: i64,
    pub sender_id: i64,
    pub content: String,
    pub message_type: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewChatMessage {
    pub session_id: i64,
    pub sender_id: i64,
    pub content: String,
    pub message_type: String,
}

/// Result of flipping `is_read`. Only `Transitioned` is an actual state change.
#[derive(Debug, Clone, PartialEq)]
pub enum MarkReadOutcome {
    Transitioned { message_id: i64, session_id: i64, sender_id: i64 },
    AlreadyRead { sender_id: i64 },
    NotFound,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActiveChatSummary {
    pub session_id: i64,
    pub user_id: i64,
    pub user_name: Option<String>,
    pub title: Option<String>,
    pub start_time: DateTime<Utc>,
    pub last_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub unread_count: i64,
}
