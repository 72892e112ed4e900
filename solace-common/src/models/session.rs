// File: solace-common/src/models/session.rs

use std::fmt;
use std::str::FromStr;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default booking length when the caller does not give one.
pub const DEFAULT_DURATION_MINUTES: i32 = 60;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Eq, PartialEq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SessionType {
    Video,
    Audio,
    Chat,
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionType::Video => write!(f, "video"),
            SessionType::Audio => write!(f, "audio"),
            SessionType::Chat => write!(f, "chat"),
        }
    }
}

impl FromStr for SessionType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "video" => Ok(SessionType::Video),
            "audio" => Ok(SessionType::Audio),
            "chat" => Ok(SessionType::Chat),
            _ => Err(format!("Unknown session type: {}", s)),
        }
    }
}

/// scheduled -> active -> completed, with scheduled -> cancelled as the other exit.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Eq, PartialEq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Scheduled,
    Active,
    Completed,
    Cancelled,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Cancelled)
    }

    /// Statuses that occupy a supporter's calendar for conflict checks.
    pub fn blocks_calendar(self) -> bool {
        matches!(self, SessionStatus::Scheduled | SessionStatus::Active)
    }

    /// Forward-only transitions. Re-starting an active session is accepted so that
    /// repeated start calls stay idempotent.
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        matches!(
            (self, next),
            (Scheduled, Active)
                | (Active, Active)
                | (Scheduled, Completed)
                | (Active, Completed)
                | (Scheduled, Cancelled)
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Scheduled => write!(f, "scheduled"),
            SessionStatus::Active => write!(f, "active"),
            SessionStatus::Completed => write!(f, "completed"),
            SessionStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for SessionStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "scheduled" => Ok(SessionStatus::Scheduled),
            "active" => Ok(SessionStatus::Active),
            "completed" => Ok(SessionStatus::Completed),
            "cancelled" => Ok(SessionStatus::Cancelled),
            _ => Err(format!("Unknown session status: {}", s)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledSession {
    pub session_id: i64,
    pub user_id: i64,
    pub supporter_id: i64,
    pub session_type: SessionType,
    pub scheduled_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub title: Option<String>,
    pub notes: Option<String>,
    pub status: SessionStatus,
    pub end_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Denormalized from the supporter's profile; not a column of `scheduled_sessions`.
    #[serde(default)]
    pub supporter_name: Option<String>,
}

/// Raw booking request as received from a client. Everything is optional here so that
/// missing fields surface as validation errors rather than deserialization failures.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    pub supporter_id: Option<i64>,
    pub session_type: Option<String>,
    pub scheduled_time: Option<String>,
    pub duration_minutes: Option<i32>,
    pub title: Option<String>,
    pub notes: Option<String>,
}

/// A validated booking ready to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewScheduledSession {
    pub user_id: i64,
    pub supporter_id: i64,
    pub session_type: SessionType,
    pub scheduled_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub title: Option<String>,
    pub notes: Option<String>,
}
