// File: solace-core/src/services/session_lifecycle.rs

use std::sync::Arc;
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use solace_common::models::chat::{ChatSession, ChatSessionStatus, EnsureActiveChatSession, EnsureOutcome};
use solace_common::models::identity::Identity;
use solace_common::models::realtime::{SessionEndedPayload, SessionStartedPayload, ServerEvent};
use solace_common::models::session::{
    NewScheduledSession, ScheduleRequest, ScheduledSession, SessionStatus, SessionType,
    DEFAULT_DURATION_MINUTES,
};
use solace_common::traits::repository_traits::{
    ChatSessionRepository, ScheduledSessionRepository, SupporterRepository,
};

use crate::access::{self, Action, Parties};
use crate::rooms::{RoomKey, RoomRegistry};
use crate::Error;

/// What `start` did besides flipping the status.
#[derive(Debug, Clone)]
pub struct StartOutcome {
    pub session: ScheduledSession,
    /// Present when the session was started as a chat.
    pub chat: Option<EnsureOutcome>,
}

/// Owns the scheduled-session state machine and its coupling to chat sessions.
/// REST handlers and socket events both come through here.
pub struct SessionLifecycleManager {
    scheduled_repo: Arc<dyn ScheduledSessionRepository>,
    chat_repo: Arc<dyn ChatSessionRepository>,
    supporter_repo: Arc<dyn SupporterRepository>,
    rooms: Arc<dyn RoomRegistry>,
}

impl SessionLifecycleManager {
    pub fn new(
        scheduled_repo: Arc<dyn ScheduledSessionRepository>,
        chat_repo: Arc<dyn ChatSessionRepository>,
        supporter_repo: Arc<dyn SupporterRepository>,
        rooms: Arc<dyn RoomRegistry>,
    ) -> Self {
        debug!("SessionLifecycleManager::new() called");
        Self {
            scheduled_repo,
            chat_repo,
            supporter_repo,
            rooms,
        }
    }

    /// Books a session for `user_id`.
    ///
    /// Checks, in order: required fields, type/time format, positive duration, time in
    /// the future, supporter exists and is verified, no overlapping booking.
    pub async fn schedule(&self, user_id: i64, request: ScheduleRequest) -> Result<ScheduledSession, Error> {
        let booking = validate_booking(user_id, request, Utc::now())?;

        let supporter = self
            .supporter_repo
            .get_profile(booking.supporter_id)
            .await?
            .filter(|p| p.is_verified)
            .ok_or_else(|| Error::NotFound("Supporter not found or not verified".into()))?;

        let conflicts = self
            .scheduled_repo
            .find_conflicts(booking.supporter_id, booking.scheduled_time, booking.duration_minutes)
            .await?;
        if !conflicts.is_empty() {
            info!(
                "Booking rejected: supporter={} time={} overlaps {:?}",
                booking.supporter_id, booking.scheduled_time, conflicts
            );
            return Err(Error::Conflict("This time slot is not available".into()));
        }

        let mut created = self.scheduled_repo.create(&booking).await?;
        if created.supporter_name.is_none() {
            created.supporter_name = Some(supporter.display_name);
        }
        info!(
            "Scheduled session {} for user={} supporter={} at {}",
            created.session_id, created.user_id, created.supporter_id, created.scheduled_time
        );
        Ok(created)
    }

    /// scheduled -> active. Starting an already-active session is accepted so retries are
    /// harmless. A chat start also ensures the pair has exactly one active chat session.
    pub async fn start(
        &self,
        session_id: i64,
        identity: &Identity,
        session_type: Option<SessionType>,
    ) -> Result<StartOutcome, Error> {
        let mut session = self.load(session_id).await?;
        let parties = Parties::new(session.user_id, session.supporter_id);
        access::authorize(identity, parties, Action::StartSession).require("start this session")?;

        if !session.status.can_transition_to(SessionStatus::Active) {
            return Err(Error::Conflict(format!("Session is already {}", session.status)));
        }

        if !self
            .scheduled_repo
            .update_status(session_id, SessionStatus::Active, None)
            .await?
        {
            return Err(Error::NotFound("Session not found".into()));
        }
        session.status = SessionStatus::Active;

        let effective_type = session_type.unwrap_or(session.session_type);
        let chat = if effective_type == SessionType::Chat {
            let outcome = self
                .chat_repo
                .ensure_active(&EnsureActiveChatSession {
                    user_id: session.user_id,
                    supporter_id: session.supporter_id,
                    session_type: SessionType::Chat,
                    title: session.title.clone(),
                    scheduled_session_id: Some(session.session_id),
                })
                .await?;
            debug!(
                "Chat session {} {} for scheduled session {}",
                outcome.session().session_id,
                outcome.label(),
                session_id
            );
            Some(outcome)
        } else {
            None
        };

        info!("Session {} started by {} ({:?})", session_id, identity.id, identity.role);

        let event = ServerEvent::SessionStarted(SessionStartedPayload {
            session_id,
            supporter_id: session.supporter_id,
            user_id: session.user_id,
            session_type: effective_type,
            timestamp: Utc::now(),
        });
        self.notify(RoomKey::Session(session_id), parties, &event).await;

        Ok(StartOutcome { session, chat })
    }

    /// -> completed, stamping `end_time`. Linked chat sessions are closed best-effort.
    pub async fn end(&self, session_id: i64, identity: &Identity) -> Result<ScheduledSession, Error> {
        let mut session = self.load(session_id).await?;
        let parties = Parties::new(session.user_id, session.supporter_id);
        access::authorize(identity, parties, Action::EndSession).require("end this session")?;

        if !session.status.can_transition_to(SessionStatus::Completed) {
            return Err(Error::Conflict(format!("Session is already {}", session.status)));
        }

        let now = Utc::now();
        if !self
            .scheduled_repo
            .update_status(session_id, SessionStatus::Completed, Some(now))
            .await?
        {
            return Err(Error::NotFound("Session not found".into()));
        }
        session.status = SessionStatus::Completed;
        session.end_time = Some(now);

        self.close_linked_chats(session_id, now).await;

        info!("Session {} ended by {}", session_id, identity.id);

        let event = ServerEvent::SessionEnded(SessionEndedPayload {
            session_id,
            ended_by: identity.id,
            timestamp: now,
        });
        self.notify(RoomKey::Session(session_id), parties, &event).await;

        Ok(session)
    }

    /// scheduled -> cancelled, by either party or an admin.
    pub async fn cancel(&self, session_id: i64, identity: &Identity) -> Result<ScheduledSession, Error> {
        let mut session = self.load(session_id).await?;
        let parties = Parties::new(session.user_id, session.supporter_id);
        access::authorize(identity, parties, Action::CancelSession).require("cancel this session")?;

        if !session.status.can_transition_to(SessionStatus::Cancelled) {
            return Err(Error::Conflict(format!(
                "Only scheduled sessions can be cancelled (status is {})",
                session.status
            )));
        }

        if !self
            .scheduled_repo
            .update_status(session_id, SessionStatus::Cancelled, None)
            .await?
        {
            return Err(Error::NotFound("Session not found".into()));
        }
        session.status = SessionStatus::Cancelled;
        info!("Session {} cancelled by {}", session_id, identity.id);
        Ok(session)
    }

    pub async fn sessions_for_supporter(
        &self,
        identity: &Identity,
        supporter_id: i64,
    ) -> Result<Vec<ScheduledSession>, Error> {
        access::can_view_as(identity, supporter_id).require("view this schedule")?;
        self.scheduled_repo.list_for_supporter(supporter_id).await
    }

    pub async fn sessions_for_user(
        &self,
        identity: &Identity,
        user_id: i64,
    ) -> Result<Vec<ScheduledSession>, Error> {
        access::can_view_as(identity, user_id).require("view this schedule")?;
        self.scheduled_repo.list_for_user(user_id).await
    }

    /// Opens (or reuses) an ad hoc chat between a user and a verified supporter.
    pub async fn start_chat(
        &self,
        identity: &Identity,
        user_id: i64,
        supporter_id: i64,
        title: Option<String>,
    ) -> Result<EnsureOutcome, Error> {
        access::authorize(identity, Parties::new(user_id, supporter_id), Action::OpenChat)
            .require("open this chat")?;

        self.supporter_repo
            .get_profile(supporter_id)
            .await?
            .filter(|p| p.is_verified)
            .ok_or_else(|| Error::NotFound("Supporter not found or not verified".into()))?;

        let outcome = self
            .chat_repo
            .ensure_active(&EnsureActiveChatSession {
                user_id,
                supporter_id,
                session_type: SessionType::Chat,
                title,
                scheduled_session_id: None,
            })
            .await?;
        info!(
            "Chat session {} {} for user={} supporter={}",
            outcome.session().session_id,
            outcome.label(),
            user_id,
            supporter_id
        );
        Ok(outcome)
    }

    /// Ends a chat session directly, without going through a scheduled session.
    pub async fn end_chat(&self, chat_session_id: i64, identity: &Identity) -> Result<ChatSession, Error> {
        let mut chat = self
            .chat_repo
            .get(chat_session_id)
            .await?
            .ok_or_else(|| Error::NotFound("Chat session not found".into()))?;
        let parties = Parties::new(chat.user_id, chat.supporter_id);
        access::authorize(identity, parties, Action::EndChat).require("end this chat")?;

        let now = Utc::now();
        if !self.chat_repo.close(chat_session_id, now).await? {
            return Err(Error::Conflict("Chat session is already completed".into()));
        }
        chat.status = ChatSessionStatus::Completed;
        chat.end_time = Some(now);

        let event = ServerEvent::SessionEnded(SessionEndedPayload {
            session_id: chat_session_id,
            ended_by: identity.id,
            timestamp: now,
        });
        self.notify(RoomKey::Session(chat_session_id), parties, &event).await;
        Ok(chat)
    }

    async fn load(&self, session_id: i64) -> Result<ScheduledSession, Error> {
        self.scheduled_repo
            .get(session_id)
            .await?
            .ok_or_else(|| Error::NotFound("Session not found".into()))
    }

    async fn close_linked_chats(&self, session_id: i64, now: DateTime<Utc>) {
        match self.chat_repo.close_for_scheduled(session_id, now).await {
            Ok(0) => debug!("No chat sessions linked to session {}", session_id),
            Ok(n) => debug!("Closed {} chat session(s) linked to session {}", n, session_id),
            Err(e) => error!(
                "Failed to close chat sessions for session {}: {:?}",
                session_id, e
            ),
        }
    }

    async fn notify(&self, session_room: RoomKey, parties: Parties, event: &ServerEvent) {
        for room in [
            session_room,
            RoomKey::User(parties.user_id),
            RoomKey::Supporter(parties.supporter_id),
        ] {
            self.rooms.broadcast(&room, event, None).await;
        }
    }
}

/// Pure booking validation against `now`.
pub fn validate_booking(
    user_id: i64,
    request: ScheduleRequest,
    now: DateTime<Utc>,
) -> Result<NewScheduledSession, Error> {
    let mut missing = Vec::new();
    if request.supporter_id.is_none() {
        missing.push("supporterId");
    }
    if request.session_type.as_deref().map(str::trim).unwrap_or("").is_empty() {
        missing.push("sessionType");
    }
    if request.scheduled_time.as_deref().map(str::trim).unwrap_or("").is_empty() {
        missing.push("scheduledTime");
    }
    if !missing.is_empty() {
        return Err(Error::Validation(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )));
    }

    let supporter_id = request.supporter_id.unwrap_or_default();
    let session_type = request
        .session_type
        .as_deref()
        .unwrap_or_default()
        .trim()
        .parse::<SessionType>()
        .map_err(Error::Validation)?;
    let raw_time = request.scheduled_time.as_deref().unwrap_or_default().trim();
    let scheduled_time = DateTime::parse_from_rfc3339(raw_time)
        .map_err(|_| Error::Validation(format!("Invalid scheduledTime '{}'", raw_time)))?
        .with_timezone(&Utc);

    let duration_minutes = request.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES);
    if duration_minutes <= 0 {
        return Err(Error::Validation("durationMinutes must be positive".into()));
    }
    if scheduled_time <= now {
        warn!("Rejected booking in the past: {} <= {}", scheduled_time, now);
        return Err(Error::Validation("Scheduled time must be in the future".into()));
    }

    Ok(NewScheduledSession {
        user_id,
        supporter_id,
        session_type,
        scheduled_time,
        duration_minutes,
        title: non_blank(request.title),
        notes: non_blank(request.notes),
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(time: &str) -> ScheduleRequest {
        ScheduleRequest {
            supporter_id: Some(7),
            session_type: Some("video".into()),
            scheduled_time: Some(time.into()),
            duration_minutes: None,
            title: Some("  First check-in ".into()),
            notes: Some("   ".into()),
        }
    }

    fn now() -> DateTime<Utc> {
        "2029-12-31T00:00:00Z".parse().unwrap()
    }

    #[test]
    fn defaults_duration_and_trims_text() {
        let booking = validate_booking(1, request("2030-01-01T10:00:00Z"), now()).unwrap();
        assert_eq!(booking.duration_minutes, 60);
        assert_eq!(booking.title.as_deref(), Some("First check-in"));
        assert_eq!(booking.notes, None);
        assert_eq!(booking.session_type, SessionType::Video);
    }

    #[test]
    fn lists_every_missing_field() {
        let err = validate_booking(1, ScheduleRequest::default(), now()).unwrap_err();
        match err {
            Error::Validation(msg) => {
                assert!(msg.contains("supporterId"));
                assert!(msg.contains("sessionType"));
                assert!(msg.contains("scheduledTime"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn rejects_malformed_and_past_times() {
        assert!(matches!(
            validate_booking(1, request("next tuesday"), now()),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            validate_booking(1, request("2029-12-31T00:00:00Z"), now()),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn rejects_non_positive_duration_and_unknown_type() {
        let mut r = request("2030-01-01T10:00:00Z");
        r.duration_minutes = Some(0);
        assert!(matches!(validate_booking(1, r, now()), Err(Error::Validation(_))));

        let mut r = request("2030-01-01T10:00:00Z");
        r.session_type = Some("hologram".into());
        assert!(matches!(validate_booking(1, r, now()), Err(Error::Validation(_))));
    }
}
