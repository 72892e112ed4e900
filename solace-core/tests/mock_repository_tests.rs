// File: solace-core/tests/mock_repository_tests.rs

use std::sync::Arc;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::mock;
use mockall::predicate::eq;

use solace_core::Error;
use solace_core::models::chat::{
    ActiveChatSummary, ChatSession, EnsureActiveChatSession, EnsureOutcome,
};
use solace_core::models::identity::{Identity, Role};
use solace_core::models::session::{NewScheduledSession, ScheduleRequest, ScheduledSession, SessionStatus};
use solace_core::models::supporter::{SupporterProfile, SupporterStatus};
use solace_core::repositories::{ChatSessionRepository, ScheduledSessionRepository, SupporterRepository};
use solace_core::rooms::InMemoryRoomRegistry;
use solace_core::services::SessionLifecycleManager;

mock! {
    ScheduledRepo {}
    #[async_trait]
    impl ScheduledSessionRepository for ScheduledRepo {
        async fn create(&self, session: &NewScheduledSession) -> Result<ScheduledSession, Error>;
        async fn get(&self, session_id: i64) -> Result<Option<ScheduledSession>, Error>;
        async fn find_conflicts(&self, supporter_id: i64, scheduled_time: DateTime<Utc>, duration_minutes: i32) -> Result<Vec<i64>, Error>;
        async fn update_status(&self, session_id: i64, status: SessionStatus, end_time: Option<DateTime<Utc>>) -> Result<bool, Error>;
        async fn list_for_supporter(&self, supporter_id: i64) -> Result<Vec<ScheduledSession>, Error>;
        async fn list_for_user(&self, user_id: i64) -> Result<Vec<ScheduledSession>, Error>;
    }
}

mock! {
    ChatRepo {}
    #[async_trait]
    impl ChatSessionRepository for ChatRepo {
        async fn ensure_active(&self, request: &EnsureActiveChatSession) -> Result<EnsureOutcome, Error>;
        async fn get(&self, session_id: i64) -> Result<Option<ChatSession>, Error>;
        async fn close(&self, session_id: i64, end_time: DateTime<Utc>) -> Result<bool, Error>;
        async fn close_for_scheduled(&self, scheduled_session_id: i64, end_time: DateTime<Utc>) -> Result<u64, Error>;
        async fn list_active_for_supporter(&self, supporter_id: i64) -> Result<Vec<ActiveChatSummary>, Error>;
    }
}

mock! {
    SupporterRepo {}
    #[async_trait]
    impl SupporterRepository for SupporterRepo {
        async fn get_profile(&self, supporter_id: i64) -> Result<Option<SupporterProfile>, Error>;
        async fn set_status(&self, supporter_id: i64, status: SupporterStatus) -> Result<bool, Error>;
    }
}

fn profile(verified: bool) -> SupporterProfile {
    SupporterProfile {
        supporter_id: 7,
        display_name: "Sam".into(),
        is_verified: verified,
        status: SupporterStatus::Online,
    }
}

fn request() -> ScheduleRequest {
    ScheduleRequest {
        supporter_id: Some(7),
        session_type: Some("chat".into()),
        scheduled_time: Some("2030-01-01T10:00:00Z".into()),
        duration_minutes: Some(30),
        title: None,
        notes: None,
    }
}

fn stored(session_id: i64, status: SessionStatus) -> ScheduledSession {
    ScheduledSession {
        session_id,
        user_id: 1,
        supporter_id: 7,
        session_type: solace_core::models::session::SessionType::Video,
        scheduled_time: "2030-01-01T10:00:00Z".parse().unwrap(),
        duration_minutes: 60,
        title: None,
        notes: None,
        status,
        end_time: None,
        created_at: Utc::now(),
        supporter_name: None,
    }
}

fn manager(scheduled: MockScheduledRepo, chat: MockChatRepo, supporters: MockSupporterRepo) -> SessionLifecycleManager {
    SessionLifecycleManager::new(
        Arc::new(scheduled),
        Arc::new(chat),
        Arc::new(supporters),
        Arc::new(InMemoryRoomRegistry::new()),
    )
}

#[tokio::test]
async fn test_unverified_supporter_never_reaches_the_store() {
    let mut scheduled = MockScheduledRepo::new();
    scheduled.expect_find_conflicts().times(0);
    scheduled.expect_create().times(0);

    let mut supporters = MockSupporterRepo::new();
    supporters
        .expect_get_profile()
        .with(eq(7))
        .times(1)
        .returning(|_| Ok(Some(profile(false))));

    let lifecycle = manager(scheduled, MockChatRepo::new(), supporters);
    let res = lifecycle.schedule(1, request()).await;
    assert!(matches!(res, Err(Error::NotFound(ref m)) if m == "Supporter not found or not verified"));
}

#[tokio::test]
async fn test_conflict_check_uses_requested_window() {
    let mut scheduled = MockScheduledRepo::new();
    scheduled
        .expect_find_conflicts()
        .withf(|supporter_id, time, duration| {
            *supporter_id == 7
                && *duration == 30
                && *time == "2030-01-01T10:00:00Z".parse::<DateTime<Utc>>().unwrap()
        })
        .times(1)
        .returning(|_, _, _| Ok(vec![11]));
    scheduled.expect_create().times(0);

    let mut supporters = MockSupporterRepo::new();
    supporters.expect_get_profile().returning(|_| Ok(Some(profile(true))));

    let lifecycle = manager(scheduled, MockChatRepo::new(), supporters);
    assert!(matches!(lifecycle.schedule(1, request()).await, Err(Error::Conflict(_))));
}

#[tokio::test]
async fn test_store_failure_surfaces_as_database_error() {
    let mut scheduled = MockScheduledRepo::new();
    scheduled
        .expect_get()
        .returning(|_| Err(Error::Database(sqlx::Error::PoolTimedOut)));

    let lifecycle = manager(scheduled, MockChatRepo::new(), MockSupporterRepo::new());
    let res = lifecycle.start(3, &Identity::new(7, Role::Supporter), None).await;
    assert!(matches!(res, Err(ref e) if e.is_storage()));
}

#[tokio::test]
async fn test_cascade_failure_does_not_fail_end() -> Result<(), Error> {
    let mut scheduled = MockScheduledRepo::new();
    scheduled.expect_get().returning(|id| Ok(Some(stored(id, SessionStatus::Active))));
    scheduled
        .expect_update_status()
        .withf(|id, status, end_time| *id == 9 && *status == SessionStatus::Completed && end_time.is_some())
        .times(1)
        .returning(|_, _, _| Ok(true));

    let mut chat = MockChatRepo::new();
    chat.expect_close_for_scheduled()
        .with(eq(9), mockall::predicate::always())
        .times(1)
        .returning(|_, _| Err(Error::Database(sqlx::Error::PoolClosed)));

    let lifecycle = manager(scheduled, chat, MockSupporterRepo::new());
    let ended = lifecycle.end(9, &Identity::new(1, Role::User)).await?;
    assert_eq!(ended.status, SessionStatus::Completed);
    Ok(())
}
