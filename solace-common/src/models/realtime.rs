//! Wire events for the WebSocket transport.
//!
//! Every frame is a JSON text message shaped `{"event": "<name>", "data": <payload>}`.
//! Event names and the camelCase payload fields are part of the client contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;
use crate::models::session::SessionType;

pub type ConnectionId = Uuid;

/// Value stamped on every delivered message payload.
pub const DELIVERED: &str = "delivered";

/// Join events carry a bare id that older clients send as a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Number(i64),
    Text(String),
}

impl RawId {
    pub fn to_id(&self) -> Result<i64, Error> {
        match self {
            RawId::Number(n) => Ok(*n),
            RawId::Text(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| Error::Parse(format!("invalid id '{}'", s))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "join-user")]
    JoinUser(RawId),
    #[serde(rename = "join-supporter")]
    JoinSupporter(RawId),
    #[serde(rename = "join-session")]
    JoinSession(RawId),
    #[serde(rename = "leave-session")]
    LeaveSession(RawId),
    #[serde(rename = "send-message")]
    SendMessage(SendMessagePayload),
    #[serde(rename = "typing")]
    Typing(TypingPayload),
    #[serde(rename = "message-read")]
    MessageRead(MessageReadPayload),
    #[serde(rename = "start-session")]
    StartSession(StartSessionPayload),
    #[serde(rename = "end-session")]
    EndSession(EndSessionPayload),
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::JoinUser(_) => "join-user",
            ClientEvent::JoinSupporter(_) => "join-supporter",
            ClientEvent::JoinSession(_) => "join-session",
            ClientEvent::LeaveSession(_) => "leave-session",
            ClientEvent::SendMessage(_) => "send-message",
            ClientEvent::Typing(_) => "typing",
            ClientEvent::MessageRead(_) => "message-read",
            ClientEvent::StartSession(_) => "start-session",
            ClientEvent::EndSession(_) => "end-session",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "new-message")]
    NewMessage(MessagePayload),
    #[serde(rename = "message-sent")]
    MessageSent(MessagePayload),
    #[serde(rename = "message-error")]
    MessageError(ErrorPayload),
    #[serde(rename = "user-typing")]
    UserTyping(UserTypingPayload),
    #[serde(rename = "message-read-receipt")]
    MessageReadReceipt(ReadReceiptPayload),
    #[serde(rename = "session-started")]
    SessionStarted(SessionStartedPayload),
    #[serde(rename = "session-ended")]
    SessionEnded(SessionEndedPayload),
    #[serde(rename = "error")]
    Error(ErrorPayload),
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::NewMessage(_) => "new-message",
            ServerEvent::MessageSent(_) => "message-sent",
            ServerEvent::MessageError(_) => "message-error",
            ServerEvent::UserTyping(_) => "user-typing",
            ServerEvent::MessageReadReceipt(_) => "message-read-receipt",
            ServerEvent::SessionStarted(_) => "session-started",
            ServerEvent::SessionEnded(_) => "session-ended",
            ServerEvent::Error(_) => "error",
        }
    }

    pub fn message_error(error: impl Into<String>) -> Self {
        ServerEvent::MessageError(ErrorPayload { error: error.into() })
    }

    pub fn error(error: impl Into<String>) -> Self {
        ServerEvent::Error(ErrorPayload { error: error.into() })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagePayload {
    pub session_id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub message: String,
    #[serde(default)]
    pub sender_name: Option<String>,
    #[serde(default)]
    pub message_type: Option<String>,
}

/// Canonical delivery payload shared by `new-message` and `message-sent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    pub message_id: i64,
    pub session_id: i64,
    pub sender_id: i64,
    pub sender_name: Option<String>,
    pub receiver_id: i64,
    pub message: String,
    pub message_type: String,
    pub timestamp: DateTime<Utc>,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingPayload {
    pub session_id: i64,
    pub user_id: i64,
    pub is_typing: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTypingPayload {
    pub user_id: i64,
    pub is_typing: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageReadPayload {
    pub message_id: i64,
    pub reader_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadReceiptPayload {
    pub message_id: i64,
    pub reader_id: i64,
    pub timestamp: DateTime<Utc>,
}

/// Inbound `start-session`. Only `sessionId` is authoritative; the other fields are
/// echoed by older clients and ignored in favour of the stored record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionPayload {
    pub session_id: i64,
    #[serde(default)]
    pub supporter_id: Option<i64>,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub session_type: Option<SessionType>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStartedPayload {
    pub session_id: i64,
    pub supporter_id: i64,
    pub user_id: i64,
    pub session_type: SessionType,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndSessionPayload {
    pub session_id: i64,
    #[serde(default)]
    pub ended_by: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEndedPayload {
    pub session_id: i64,
    pub ended_by: i64,
    pub timestamp: DateTime<Utc>,
}
