use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crate::error::Error;
use crate::models::chat::{
    ActiveChatSummary, ChatMessage, ChatSession, EnsureActiveChatSession, EnsureOutcome,
    MarkReadOutcome, NewChatMessage,
};
use crate::models::session::{NewScheduledSession, ScheduledSession, SessionStatus};
use crate::models::supporter::{SupporterProfile, SupporterStatus};

#[async_trait]
pub trait ScheduledSessionRepository: Send + Sync {
    async fn create(&self, session: &NewScheduledSession) -> Result<ScheduledSession, Error>;
    async fn get(&self, session_id: i64) -> Result<Option<ScheduledSession>, Error>;

    /// Ids of scheduled/active sessions for the supporter whose start time lies within
    /// `duration_minutes` of `scheduled_time`, bounds included.
    async fn find_conflicts(
        &self,
        supporter_id: i64,
        scheduled_time: DateTime<Utc>,
        duration_minutes: i32,
    ) -> Result<Vec<i64>, Error>;

    /// Returns false when no row matched.
    async fn update_status(
        &self,
        session_id: i64,
        status: SessionStatus,
        end_time: Option<DateTime<Utc>>,
    ) -> Result<bool, Error>;

    async fn list_for_supporter(&self, supporter_id: i64) -> Result<Vec<ScheduledSession>, Error>;
    async fn list_for_user(&self, user_id: i64) -> Result<Vec<ScheduledSession>, Error>;
}

#[async_trait]
pub trait ChatSessionRepository: Send + Sync {
    /// At most one active chat session per (user, supporter) pair.
    async fn ensure_active(&self, request: &EnsureActiveChatSession) -> Result<EnsureOutcome, Error>;
    async fn get(&self, session_id: i64) -> Result<Option<ChatSession>, Error>;

    /// Marks an active chat session completed. Returns false if it was not active.
    async fn close(&self, session_id: i64, end_time: DateTime<Utc>) -> Result<bool, Error>;

    /// Closes every active chat session linked to the scheduled session; returns the count.
    async fn close_for_scheduled(
        &self,
        scheduled_session_id: i64,
        end_time: DateTime<Utc>,
    ) -> Result<u64, Error>;

    async fn list_active_for_supporter(&self, supporter_id: i64) -> Result<Vec<ActiveChatSummary>, Error>;
}

#[async_trait]
pub trait ChatMessageRepository: Send + Sync {
    async fn insert(&self, message: &NewChatMessage) -> Result<ChatMessage, Error>;
    async fn get(&self, message_id: i64) -> Result<Option<ChatMessage>, Error>;
    async fn list_for_session(&self, session_id: i64) -> Result<Vec<ChatMessage>, Error>;

    /// Flips `is_read` false -> true. Never flips it back.
    async fn mark_read(&self, message_id: i64) -> Result<MarkReadOutcome, Error>;
}

#[async_trait]
pub trait SupporterRepository: Send + Sync {
    async fn get_profile(&self, supporter_id: i64) -> Result<Option<SupporterProfile>, Error>;

    /// Returns false when the supporter does not exist.
    async fn set_status(&self, supporter_id: i64, status: SupporterStatus) -> Result<bool, Error>;
}
