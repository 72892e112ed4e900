// File: solace-core/src/test_utils/memory_store.rs

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::{Barrier, Mutex};

use solace_common::models::chat::{
    ActiveChatSummary, ChatMessage, ChatSession, ChatSessionStatus, EnsureActiveChatSession,
    EnsureOutcome, MarkReadOutcome, NewChatMessage,
};
use solace_common::models::session::{NewScheduledSession, ScheduledSession, SessionStatus};
use solace_common::models::supporter::{SupporterProfile, SupporterStatus};
use solace_common::traits::repository_traits::{
    ChatMessageRepository, ChatSessionRepository, ScheduledSessionRepository, SupporterRepository,
};
use crate::Error;

#[derive(Default)]
struct State {
    next_id: i64,
    user_names: HashMap<i64, String>,
    supporters: HashMap<i64, SupporterProfile>,
    scheduled: Vec<ScheduledSession>,
    chats: Vec<ChatSession>,
    messages: Vec<ChatMessage>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory stand-in for all four repositories, with the same semantics as the
/// Postgres ones. Shared as `Arc<MemoryStore>` and coerced to each trait object.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    fail_message_inserts: AtomicBool,
    conflict_gate: Mutex<Option<Arc<Barrier>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, user_id: i64, name: &str) {
        let mut st = self.state.lock().await;
        st.user_names.insert(user_id, name.to_string());
    }

    pub async fn add_supporter(&self, supporter_id: i64, name: &str, is_verified: bool) {
        let mut st = self.state.lock().await;
        st.user_names.insert(supporter_id, name.to_string());
        st.supporters.insert(
            supporter_id,
            SupporterProfile {
                supporter_id,
                display_name: name.to_string(),
                is_verified,
                status: SupporterStatus::Offline,
            },
        );
    }

    /// Makes every following message insert fail with a database error.
    pub fn fail_message_inserts(&self, fail: bool) {
        self.fail_message_inserts.store(fail, Ordering::SeqCst);
    }

    /// Holds every conflict check until `callers` of them are in flight, so concurrent
    /// bookings all see the calendar as it was before any of them inserted.
    pub async fn hold_conflict_checks(&self, callers: usize) {
        *self.conflict_gate.lock().await = Some(Arc::new(Barrier::new(callers)));
    }

    /// Inserts a scheduled session directly, bypassing validation (for past-dated fixtures).
    pub async fn seed_scheduled(&self, session: NewScheduledSession, status: SessionStatus) -> ScheduledSession {
        let mut st = self.state.lock().await;
        let id = st.next_id();
        let supporter_name = st.supporters.get(&session.supporter_id).map(|p| p.display_name.clone());
        let record = ScheduledSession {
            session_id: id,
            user_id: session.user_id,
            supporter_id: session.supporter_id,
            session_type: session.session_type,
            scheduled_time: session.scheduled_time,
            duration_minutes: session.duration_minutes,
            title: session.title,
            notes: session.notes,
            status,
            end_time: None,
            created_at: Utc::now(),
            supporter_name,
        };
        st.scheduled.push(record.clone());
        record
    }

    pub async fn supporter_status(&self, supporter_id: i64) -> Option<SupporterStatus> {
        let st = self.state.lock().await;
        st.supporters.get(&supporter_id).map(|p| p.status)
    }

    pub async fn chat_sessions(&self) -> Vec<ChatSession> {
        self.state.lock().await.chats.clone()
    }

    pub async fn messages(&self) -> Vec<ChatMessage> {
        self.state.lock().await.messages.clone()
    }
}

#[async_trait]
impl ScheduledSessionRepository for MemoryStore {
    async fn create(&self, session: &NewScheduledSession) -> Result<ScheduledSession, Error> {
        Ok(self.seed_scheduled(session.clone(), SessionStatus::Scheduled).await)
    }

    async fn get(&self, session_id: i64) -> Result<Option<ScheduledSession>, Error> {
        let st = self.state.lock().await;
        Ok(st.scheduled.iter().find(|s| s.session_id == session_id).cloned())
    }

    async fn find_conflicts(
        &self,
        supporter_id: i64,
        scheduled_time: DateTime<Utc>,
        duration_minutes: i32,
    ) -> Result<Vec<i64>, Error> {
        let window = Duration::minutes(i64::from(duration_minutes));
        let (lo, hi) = (scheduled_time - window, scheduled_time + window);
        let found = {
            let st = self.state.lock().await;
            st.scheduled
                .iter()
                .filter(|s| s.supporter_id == supporter_id && s.status.blocks_calendar())
                .filter(|s| s.scheduled_time >= lo && s.scheduled_time <= hi)
                .map(|s| s.session_id)
                .collect()
        };
        let gate = self.conflict_gate.lock().await.clone();
        if let Some(gate) = gate {
            gate.wait().await;
        }
        Ok(found)
    }

    async fn update_status(
        &self,
        session_id: i64,
        status: SessionStatus,
        end_time: Option<DateTime<Utc>>,
    ) -> Result<bool, Error> {
        let mut st = self.state.lock().await;
        match st.scheduled.iter_mut().find(|s| s.session_id == session_id) {
            Some(s) => {
                s.status = status;
                if end_time.is_some() {
                    s.end_time = end_time;
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_for_supporter(&self, supporter_id: i64) -> Result<Vec<ScheduledSession>, Error> {
        let st = self.state.lock().await;
        let mut out: Vec<_> = st
            .scheduled
            .iter()
            .filter(|s| s.supporter_id == supporter_id)
            .cloned()
            .collect();
        out.sort_by_key(|s| s.scheduled_time);
        Ok(out)
    }

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<ScheduledSession>, Error> {
        let st = self.state.lock().await;
        let mut out: Vec<_> = st
            .scheduled
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        out.sort_by_key(|s| s.scheduled_time);
        Ok(out)
    }
}

#[async_trait]
impl ChatSessionRepository for MemoryStore {
    async fn ensure_active(&self, req: &EnsureActiveChatSession) -> Result<EnsureOutcome, Error> {
        let mut st = self.state.lock().await;

        if let Some(active) = st.chats.iter_mut().find(|c| {
            c.user_id == req.user_id
                && c.supporter_id == req.supporter_id
                && c.status == ChatSessionStatus::Active
        }) {
            if req.scheduled_session_id.is_some() {
                active.scheduled_session_id = req.scheduled_session_id;
            }
            return Ok(EnsureOutcome::AlreadyActive(active.clone()));
        }

        if let Some(previous) = st
            .chats
            .iter_mut()
            .filter(|c| c.user_id == req.user_id && c.supporter_id == req.supporter_id)
            .max_by_key(|c| c.session_id)
        {
            previous.status = ChatSessionStatus::Active;
            previous.start_time = Utc::now();
            previous.end_time = None;
            previous.session_type = req.session_type;
            if req.title.is_some() {
                previous.title = req.title.clone();
            }
            if req.scheduled_session_id.is_some() {
                previous.scheduled_session_id = req.scheduled_session_id;
            }
            return Ok(EnsureOutcome::Reactivated(previous.clone()));
        }

        let id = st.next_id();
        let created = ChatSession {
            session_id: id,
            user_id: req.user_id,
            supporter_id: req.supporter_id,
            session_type: req.session_type,
            status: ChatSessionStatus::Active,
            start_time: Utc::now(),
            end_time: None,
            title: req.title.clone(),
            scheduled_session_id: req.scheduled_session_id,
        };
        st.chats.push(created.clone());
        Ok(EnsureOutcome::Created(created))
    }

    async fn get(&self, session_id: i64) -> Result<Option<ChatSession>, Error> {
        let st = self.state.lock().await;
        Ok(st.chats.iter().find(|c| c.session_id == session_id).cloned())
    }

    async fn close(&self, session_id: i64, end_time: DateTime<Utc>) -> Result<bool, Error> {
        let mut st = self.state.lock().await;
        match st
            .chats
            .iter_mut()
            .find(|c| c.session_id == session_id && c.status == ChatSessionStatus::Active)
        {
            Some(c) => {
                c.status = ChatSessionStatus::Completed;
                c.end_time = Some(end_time);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn close_for_scheduled(
        &self,
        scheduled_session_id: i64,
        end_time: DateTime<Utc>,
    ) -> Result<u64, Error> {
        let mut st = self.state.lock().await;
        let mut closed = 0;
        for c in st.chats.iter_mut().filter(|c| {
            c.scheduled_session_id == Some(scheduled_session_id) && c.status == ChatSessionStatus::Active
        }) {
            c.status = ChatSessionStatus::Completed;
            c.end_time = Some(end_time);
            closed += 1;
        }
        Ok(closed)
    }

    async fn list_active_for_supporter(&self, supporter_id: i64) -> Result<Vec<ActiveChatSummary>, Error> {
        let st = self.state.lock().await;
        let mut out = Vec::new();
        for chat in st
            .chats
            .iter()
            .filter(|c| c.supporter_id == supporter_id && c.status == ChatSessionStatus::Active)
        {
            let in_chat: Vec<&ChatMessage> = st
                .messages
                .iter()
                .filter(|m| m.session_id == chat.session_id)
                .collect();
            let last = in_chat.iter().max_by_key(|m| (m.created_at, m.message_id));
            let unread_count = in_chat
                .iter()
                .filter(|m| !m.is_read && m.sender_id != supporter_id)
                .count() as i64;
            out.push(ActiveChatSummary {
                session_id: chat.session_id,
                user_id: chat.user_id,
                user_name: st.user_names.get(&chat.user_id).cloned(),
                title: chat.title.clone(),
                start_time: chat.start_time,
                last_message: last.map(|m| m.content.clone()),
                last_message_at: last.map(|m| m.created_at),
                unread_count,
            });
        }
        out.sort_by(|a, b| {
            b.last_message_at
                .unwrap_or(b.start_time)
                .cmp(&a.last_message_at.unwrap_or(a.start_time))
        });
        Ok(out)
    }
}

#[async_trait]
impl ChatMessageRepository for MemoryStore {
    async fn insert(&self, message: &NewChatMessage) -> Result<ChatMessage, Error> {
        if self.fail_message_inserts.load(Ordering::SeqCst) {
            return Err(Error::Database(sqlx::Error::PoolTimedOut));
        }
        let mut st = self.state.lock().await;
        if !st.chats.iter().any(|c| c.session_id == message.session_id) {
            return Err(Error::Database(sqlx::Error::RowNotFound));
        }
        let id = st.next_id();
        let stored = ChatMessage {
            message_id: id,
            session_id: message.session_id,
            sender_id: message.sender_id,
            content: message.content.clone(),
            message_type: message.message_type.clone(),
            is_read: false,
            created_at: Utc::now(),
        };
        st.messages.push(stored.clone());
        Ok(stored)
    }

    async fn get(&self, message_id: i64) -> Result<Option<ChatMessage>, Error> {
        let st = self.state.lock().await;
        Ok(st.messages.iter().find(|m| m.message_id == message_id).cloned())
    }

    async fn list_for_session(&self, session_id: i64) -> Result<Vec<ChatMessage>, Error> {
        let st = self.state.lock().await;
        let mut out: Vec<_> = st
            .messages
            .iter()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect();
        out.sort_by_key(|m| (m.created_at, m.message_id));
        Ok(out)
    }

    async fn mark_read(&self, message_id: i64) -> Result<MarkReadOutcome, Error> {
        let mut st = self.state.lock().await;
        match st.messages.iter_mut().find(|m| m.message_id == message_id) {
            Some(m) if !m.is_read => {
                m.is_read = true;
                Ok(MarkReadOutcome::Transitioned {
                    message_id,
                    session_id: m.session_id,
                    sender_id: m.sender_id,
                })
            }
            Some(m) => Ok(MarkReadOutcome::AlreadyRead { sender_id: m.sender_id }),
            None => Ok(MarkReadOutcome::NotFound),
        }
    }
}

#[async_trait]
impl SupporterRepository for MemoryStore {
    async fn get_profile(&self, supporter_id: i64) -> Result<Option<SupporterProfile>, Error> {
        let st = self.state.lock().await;
        Ok(st.supporters.get(&supporter_id).cloned())
    }

    async fn set_status(&self, supporter_id: i64, status: SupporterStatus) -> Result<bool, Error> {
        let mut st = self.state.lock().await;
        match st.supporters.get_mut(&supporter_id) {
            Some(p) => {
                p.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
