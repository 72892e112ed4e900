// File: solace-core/tests/lifecycle_tests.rs

use chrono::{Duration, Utc};
use solace_core::Error;
use solace_core::models::chat::{ChatSessionStatus, EnsureOutcome};
use solace_core::models::identity::{Identity, Role};
use solace_core::models::realtime::{ClientEvent, EndSessionPayload, ServerEvent, StartSessionPayload};
use solace_core::models::session::{NewScheduledSession, ScheduleRequest, SessionStatus, SessionType};
use solace_core::rooms::{RoomKey, RoomRegistry};
use solace_core::test_utils::TestHarness;

const USER: i64 = 1;
const SUPPORTER: i64 = 7;

fn user() -> Identity {
    Identity::new(USER, Role::User)
}

fn supporter() -> Identity {
    Identity::new(SUPPORTER, Role::Supporter)
}

fn booking(time: &str, duration: Option<i32>, session_type: &str) -> ScheduleRequest {
    ScheduleRequest {
        supporter_id: Some(SUPPORTER),
        session_type: Some(session_type.into()),
        scheduled_time: Some(time.into()),
        duration_minutes: duration,
        title: Some("Weekly check-in".into()),
        notes: None,
    }
}

async fn harness() -> TestHarness {
    let h = TestHarness::new();
    h.store.add_user(USER, "Robin").await;
    h.store.add_supporter(SUPPORTER, "Sam", true).await;
    h
}

async fn seed(h: &TestHarness, session_type: SessionType, status: SessionStatus) -> i64 {
    h.store
        .seed_scheduled(
            NewScheduledSession {
                user_id: USER,
                supporter_id: SUPPORTER,
                session_type,
                scheduled_time: Utc::now() + Duration::days(1),
                duration_minutes: 60,
                title: Some("Check-in".into()),
                notes: None,
            },
            status,
        )
        .await
        .session_id
}

#[tokio::test]
async fn test_overlapping_booking_is_rejected() -> Result<(), Error> {
    let h = harness().await;

    let first = h
        .lifecycle
        .schedule(USER, booking("2030-01-01T10:00:00Z", Some(60), "video"))
        .await?;
    assert_eq!(first.status, SessionStatus::Scheduled);
    assert_eq!(first.supporter_name.as_deref(), Some("Sam"));

    let second = h
        .lifecycle
        .schedule(USER, booking("2030-01-01T10:30:00Z", Some(60), "video"))
        .await;
    assert!(matches!(second, Err(Error::Conflict(ref m)) if m == "This time slot is not available"));

    let listed = h.lifecycle.sessions_for_supporter(&supporter(), SUPPORTER).await?;
    assert_eq!(listed.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_window_bounds_are_inclusive() -> Result<(), Error> {
    let h = harness().await;
    h.lifecycle
        .schedule(USER, booking("2030-01-01T10:00:00Z", Some(60), "audio"))
        .await?;

    // Exactly one duration away still collides.
    let edge = h
        .lifecycle
        .schedule(USER, booking("2030-01-01T11:00:00Z", Some(60), "audio"))
        .await;
    assert!(matches!(edge, Err(Error::Conflict(_))));

    let clear = h
        .lifecycle
        .schedule(USER, booking("2030-01-01T11:01:00Z", Some(60), "audio"))
        .await;
    assert!(clear.is_ok());
    Ok(())
}

/// The conflict check and the insert are not serialized: two bookings racing for the
/// same slot can both pass the check. Sequential bookings are still rejected.
#[tokio::test]
async fn test_concurrent_overlapping_bookings_can_both_land() -> Result<(), Error> {
    let h = harness().await;
    h.store.hold_conflict_checks(2).await;

    let (a, b) = tokio::join!(
        h.lifecycle.schedule(USER, booking("2030-01-01T10:00:00Z", Some(60), "video")),
        h.lifecycle.schedule(USER, booking("2030-01-01T10:30:00Z", Some(60), "video")),
    );
    let (a, b) = (a?, b?);
    assert_ne!(a.session_id, b.session_id);

    let listed = h.lifecycle.sessions_for_supporter(&supporter(), SUPPORTER).await?;
    assert_eq!(listed.len(), 2);
    assert!(listed.iter().all(|s| s.status == SessionStatus::Scheduled));
    Ok(())
}

#[tokio::test]
async fn test_cancelled_sessions_free_the_slot() -> Result<(), Error> {
    let h = harness().await;
    let first = h
        .lifecycle
        .schedule(USER, booking("2030-01-01T10:00:00Z", None, "video"))
        .await?;
    assert_eq!(first.duration_minutes, 60);

    let cancelled = h.lifecycle.cancel(first.session_id, &user()).await?;
    assert_eq!(cancelled.status, SessionStatus::Cancelled);

    h.lifecycle
        .schedule(USER, booking("2030-01-01T10:00:00Z", None, "video"))
        .await?;
    Ok(())
}

#[tokio::test]
async fn test_unverified_or_unknown_supporter_is_not_found() {
    let h = harness().await;
    h.store.add_supporter(8, "Pat", false).await;

    let mut req = booking("2030-01-01T10:00:00Z", None, "chat");
    req.supporter_id = Some(8);
    assert!(matches!(h.lifecycle.schedule(USER, req).await, Err(Error::NotFound(_))));

    let mut req = booking("2030-01-01T10:00:00Z", None, "chat");
    req.supporter_id = Some(999);
    assert!(matches!(h.lifecycle.schedule(USER, req).await, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_starting_chat_session_twice_keeps_one_active_chat() -> Result<(), Error> {
    let h = harness().await;
    let session_id = seed(&h, SessionType::Chat, SessionStatus::Scheduled).await;

    let first = h.lifecycle.start(session_id, &supporter(), None).await?;
    let second = h.lifecycle.start(session_id, &supporter(), None).await?;

    assert_eq!(first.session.status, SessionStatus::Active);
    assert!(matches!(first.chat, Some(EnsureOutcome::Created(_))));
    assert!(matches!(second.chat, Some(EnsureOutcome::AlreadyActive(_))));

    let chats = h.store.chat_sessions().await;
    let active: Vec<_> = chats
        .iter()
        .filter(|c| c.user_id == USER && c.supporter_id == SUPPORTER && c.status == ChatSessionStatus::Active)
        .collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].scheduled_session_id, Some(session_id));
    Ok(())
}

#[tokio::test]
async fn test_non_chat_start_does_not_touch_chat_sessions() -> Result<(), Error> {
    let h = harness().await;
    let session_id = seed(&h, SessionType::Video, SessionStatus::Scheduled).await;

    let started = h.lifecycle.start(session_id, &supporter(), None).await?;
    assert!(started.chat.is_none());
    assert!(h.store.chat_sessions().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_start_by_non_owner_is_forbidden_and_changes_nothing() -> Result<(), Error> {
    let h = harness().await;
    let session_id = seed(&h, SessionType::Chat, SessionStatus::Scheduled).await;

    for intruder in [user(), Identity::new(8, Role::Supporter), Identity::new(3, Role::User)] {
        let res = h.lifecycle.start(session_id, &intruder, None).await;
        assert!(matches!(res, Err(Error::Forbidden(_))), "{:?} should be refused", intruder);
    }

    let sessions = h.lifecycle.sessions_for_user(&user(), USER).await?;
    assert_eq!(sessions[0].status, SessionStatus::Scheduled);
    assert!(h.store.chat_sessions().await.is_empty());

    let admin = Identity::new(100, Role::Admin);
    h.lifecycle.start(session_id, &admin, None).await?;
    Ok(())
}

#[tokio::test]
async fn test_end_by_stranger_is_forbidden_and_session_stays_active() -> Result<(), Error> {
    let h = harness().await;
    let session_id = seed(&h, SessionType::Chat, SessionStatus::Active).await;

    let res = h.lifecycle.end(session_id, &Identity::new(3, Role::User)).await;
    assert!(matches!(res, Err(Error::Forbidden(_))));

    let sessions = h.lifecycle.sessions_for_supporter(&supporter(), SUPPORTER).await?;
    assert_eq!(sessions[0].status, SessionStatus::Active);
    assert!(sessions[0].end_time.is_none());
    Ok(())
}

#[tokio::test]
async fn test_end_closes_linked_chat_and_never_goes_backward() -> Result<(), Error> {
    let h = harness().await;
    let session_id = seed(&h, SessionType::Chat, SessionStatus::Scheduled).await;
    h.lifecycle.start(session_id, &supporter(), None).await?;

    let ended = h.lifecycle.end(session_id, &user()).await?;
    assert_eq!(ended.status, SessionStatus::Completed);
    assert!(ended.end_time.is_some());

    let chats = h.store.chat_sessions().await;
    assert_eq!(chats.len(), 1);
    assert_eq!(chats[0].status, ChatSessionStatus::Completed);

    assert!(matches!(h.lifecycle.start(session_id, &supporter(), None).await, Err(Error::Conflict(_))));
    assert!(matches!(h.lifecycle.end(session_id, &supporter()).await, Err(Error::Conflict(_))));
    assert!(matches!(h.lifecycle.cancel(session_id, &user()).await, Err(Error::Conflict(_))));
    Ok(())
}

#[tokio::test]
async fn test_cancel_only_from_scheduled() -> Result<(), Error> {
    let h = harness().await;
    let session_id = seed(&h, SessionType::Audio, SessionStatus::Active).await;
    assert!(matches!(h.lifecycle.cancel(session_id, &user()).await, Err(Error::Conflict(_))));
    Ok(())
}

#[tokio::test]
async fn test_missing_session_is_not_found() {
    let h = harness().await;
    assert!(matches!(h.lifecycle.start(404, &supporter(), None).await, Err(Error::NotFound(_))));
    assert!(matches!(h.lifecycle.end(404, &supporter()).await, Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_reopening_chat_reactivates_previous_row() -> Result<(), Error> {
    let h = harness().await;
    let first = h.lifecycle.start_chat(&user(), USER, SUPPORTER, None).await?;
    let chat_id = first.session().session_id;
    h.lifecycle.end_chat(chat_id, &supporter()).await?;

    let again = h.lifecycle.start_chat(&user(), USER, SUPPORTER, Some("Follow-up".into())).await?;
    match again {
        EnsureOutcome::Reactivated(chat) => {
            assert_eq!(chat.session_id, chat_id);
            assert_eq!(chat.status, ChatSessionStatus::Active);
            assert!(chat.end_time.is_none());
            assert_eq!(chat.title.as_deref(), Some("Follow-up"));
        }
        other => panic!("expected reactivation, got {:?}", other),
    }

    assert!(matches!(
        h.lifecycle.end_chat(chat_id, &Identity::new(3, Role::User)).await,
        Err(Error::Forbidden(_))
    ));
    Ok(())
}

#[tokio::test]
async fn test_start_and_end_notify_both_parties() -> Result<(), Error> {
    let h = harness().await;
    let session_id = seed(&h, SessionType::Chat, SessionStatus::Scheduled).await;

    let mut user_client = h.connect(USER, Role::User).await;
    h.rooms.join(user_client.ctx.id, RoomKey::User(USER)).await;
    let mut supporter_client = h.connect(SUPPORTER, Role::Supporter).await;
    h.rooms.join(supporter_client.ctx.id, RoomKey::Supporter(SUPPORTER)).await;

    h.gateway
        .handle_event(
            &supporter_client.ctx,
            ClientEvent::StartSession(StartSessionPayload {
                session_id,
                supporter_id: None,
                user_id: None,
                session_type: None,
                timestamp: None,
            }),
        )
        .await;

    let seen = user_client.drain();
    assert!(matches!(
        seen.as_slice(),
        [ServerEvent::SessionStarted(p)] if p.session_id == session_id && p.session_type == SessionType::Chat
    ));
    assert!(matches!(supporter_client.drain().as_slice(), [ServerEvent::SessionStarted(_)]));

    h.gateway
        .handle_event(
            &user_client.ctx,
            ClientEvent::EndSession(EndSessionPayload { session_id, ended_by: Some(42) }),
        )
        .await;
    let ended = supporter_client.drain();
    assert!(matches!(ended.as_slice(), [ServerEvent::SessionEnded(p)] if p.ended_by == USER));
    Ok(())
}

#[tokio::test]
async fn test_socket_lifecycle_failure_goes_to_originator_only() -> Result<(), Error> {
    let h = harness().await;
    let session_id = seed(&h, SessionType::Chat, SessionStatus::Scheduled).await;

    let mut intruder = h.connect(3, Role::User).await;
    let mut owner = h.connect(SUPPORTER, Role::Supporter).await;
    h.rooms.join(owner.ctx.id, RoomKey::Supporter(SUPPORTER)).await;

    h.gateway
        .handle_event(
            &intruder.ctx,
            ClientEvent::StartSession(StartSessionPayload {
                session_id,
                supporter_id: Some(SUPPORTER),
                user_id: Some(USER),
                session_type: Some(SessionType::Chat),
                timestamp: None,
            }),
        )
        .await;

    assert!(matches!(intruder.drain().as_slice(), [ServerEvent::Error(_)]));
    assert!(owner.drain().is_empty());
    Ok(())
}
