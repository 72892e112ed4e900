// File: solace-core/tests/presence_tests.rs

use std::time::{Duration, Instant};
use solace_core::Error;
use solace_core::models::identity::{Identity, Role};
use solace_core::models::realtime::{
    ClientEvent, MessageReadPayload, RawId, SendMessagePayload, ServerEvent, TypingPayload,
};
use solace_core::models::supporter::SupporterStatus;
use solace_core::test_utils::{TestClient, TestHarness};

const USER: i64 = 1;
const SUPPORTER: i64 = 7;

async fn chat(h: &TestHarness) -> i64 {
    h.store.add_user(USER, "Robin").await;
    h.store.add_supporter(SUPPORTER, "Sam", true).await;
    h.lifecycle
        .start_chat(&Identity::new(USER, Role::User), USER, SUPPORTER, None)
        .await
        .unwrap()
        .session()
        .session_id
}

async fn user_sends(h: &TestHarness, user: &mut TestClient, chat_id: i64, text: &str) -> i64 {
    h.gateway
        .handle_event(
            &user.ctx,
            ClientEvent::SendMessage(SendMessagePayload {
                session_id: chat_id,
                sender_id: USER,
                receiver_id: SUPPORTER,
                message: text.into(),
                sender_name: None,
                message_type: None,
            }),
        )
        .await;
    match user.drain().pop() {
        Some(ServerEvent::MessageSent(p)) => p.message_id,
        other => panic!("expected message-sent, got {:?}", other),
    }
}

fn read(message_id: i64, reader_id: i64) -> ClientEvent {
    ClientEvent::MessageRead(MessageReadPayload { message_id, reader_id })
}

#[tokio::test]
async fn test_double_read_produces_one_receipt() -> Result<(), Error> {
    let h = TestHarness::new();
    let chat_id = chat(&h).await;
    let mut user = h.connect(USER, Role::User).await;
    h.gateway.handle_event(&user.ctx, ClientEvent::JoinUser(RawId::Number(USER))).await;
    let mut supporter = h.connect(SUPPORTER, Role::Supporter).await;

    let message_id = user_sends(&h, &mut user, chat_id, "hello").await;

    h.gateway.handle_event(&supporter.ctx, read(message_id, SUPPORTER)).await;
    h.gateway.handle_event(&supporter.ctx, read(message_id, SUPPORTER)).await;

    let receipts = user.drain();
    assert!(matches!(
        receipts.as_slice(),
        [ServerEvent::MessageReadReceipt(r)] if r.message_id == message_id && r.reader_id == SUPPORTER
    ));
    assert!(supporter.drain().is_empty());

    let stored = h.store.messages().await;
    assert!(stored[0].is_read);
    Ok(())
}

#[tokio::test]
async fn test_receipt_skips_the_session_room() {
    let h = TestHarness::new();
    let chat_id = chat(&h).await;
    let mut user = h.connect(USER, Role::User).await;
    let supporter = h.connect(SUPPORTER, Role::Supporter).await;
    let mut bystander = h.connect(3, Role::User).await;
    h.gateway.handle_event(&bystander.ctx, ClientEvent::JoinSession(RawId::Number(chat_id))).await;

    let message_id = user_sends(&h, &mut user, chat_id, "hello").await;
    bystander.drain();

    h.gateway.handle_event(&supporter.ctx, read(message_id, SUPPORTER)).await;
    assert!(bystander.drain().is_empty());
}

#[tokio::test]
async fn test_read_edge_cases() {
    let h = TestHarness::new();
    let chat_id = chat(&h).await;
    let mut user = h.connect(USER, Role::User).await;
    let mut supporter = h.connect(SUPPORTER, Role::Supporter).await;
    let message_id = user_sends(&h, &mut user, chat_id, "hello").await;

    // Self-read is ignored and leaves the flag alone.
    h.gateway.handle_event(&user.ctx, read(message_id, USER)).await;
    assert!(!h.store.messages().await[0].is_read);
    assert!(user.drain().is_empty());

    // Unknown message.
    h.gateway.handle_event(&supporter.ctx, read(4242, SUPPORTER)).await;
    assert!(matches!(supporter.drain().as_slice(), [ServerEvent::MessageError(e)] if e.error == "Message not found"));

    // Reading on someone else's behalf.
    h.gateway.handle_event(&supporter.ctx, read(message_id, 99)).await;
    assert!(matches!(supporter.drain().as_slice(), [ServerEvent::MessageError(_)]));
    assert!(!h.store.messages().await[0].is_read);
}

#[tokio::test]
async fn test_typing_is_relayed_to_others_in_the_session() {
    let h = TestHarness::new();
    let chat_id = chat(&h).await;
    let mut user = h.connect(USER, Role::User).await;
    let mut supporter = h.connect(SUPPORTER, Role::Supporter).await;
    for c in [&user, &supporter] {
        h.gateway.handle_event(&c.ctx, ClientEvent::JoinSession(RawId::Number(chat_id))).await;
    }

    h.gateway
        .handle_event(
            &user.ctx,
            ClientEvent::Typing(TypingPayload { session_id: chat_id, user_id: USER, is_typing: true }),
        )
        .await;

    assert!(matches!(
        supporter.drain().as_slice(),
        [ServerEvent::UserTyping(t)] if t.user_id == USER && t.is_typing
    ));
    assert!(user.drain().is_empty());
    assert!(h.presence.is_typing(chat_id, USER));

    h.gateway
        .handle_event(
            &user.ctx,
            ClientEvent::Typing(TypingPayload { session_id: chat_id, user_id: USER, is_typing: false }),
        )
        .await;
    assert!(matches!(supporter.drain().as_slice(), [ServerEvent::UserTyping(t)] if !t.is_typing));
    assert!(!h.presence.is_typing(chat_id, USER));
}

#[tokio::test]
async fn test_stale_typing_flags_expire() {
    let h = TestHarness::with_typing_ttl(Duration::from_secs(5));
    let chat_id = chat(&h).await;
    let user = h.connect(USER, Role::User).await;
    let mut supporter = h.connect(SUPPORTER, Role::Supporter).await;
    for c in [&user, &supporter] {
        h.gateway.handle_event(&c.ctx, ClientEvent::JoinSession(RawId::Number(chat_id))).await;
    }

    h.presence.set_typing(user.ctx.id, &user.ctx.identity, chat_id, USER, true).await;
    supporter.drain();

    assert_eq!(h.presence.sweep_expired_typing_at(Instant::now()).await, 0);
    let later = Instant::now() + Duration::from_secs(10);
    assert_eq!(h.presence.sweep_expired_typing_at(later).await, 1);

    assert!(matches!(supporter.drain().as_slice(), [ServerEvent::UserTyping(t)] if !t.is_typing));
    assert!(!h.presence.is_typing(chat_id, USER));
}

#[tokio::test]
async fn test_disconnect_clears_typing_and_takes_supporter_offline() {
    let h = TestHarness::new();
    let chat_id = chat(&h).await;
    let mut user = h.connect(USER, Role::User).await;
    h.gateway.handle_event(&user.ctx, ClientEvent::JoinSession(RawId::Number(chat_id))).await;

    let first = h.connect(SUPPORTER, Role::Supporter).await;
    let second = h.connect(SUPPORTER, Role::Supporter).await;
    for c in [&first, &second] {
        h.gateway.handle_event(&c.ctx, ClientEvent::JoinSupporter(RawId::Number(SUPPORTER))).await;
        h.gateway.handle_event(&c.ctx, ClientEvent::JoinSession(RawId::Number(chat_id))).await;
    }
    assert_eq!(h.store.supporter_status(SUPPORTER).await, Some(SupporterStatus::Online));

    h.presence.set_typing(first.ctx.id, &first.ctx.identity, chat_id, SUPPORTER, true).await;
    user.drain();

    h.gateway.disconnect(&first.ctx).await;
    assert!(matches!(user.drain().as_slice(), [ServerEvent::UserTyping(t)] if !t.is_typing));
    // Another tab is still open.
    assert_eq!(h.store.supporter_status(SUPPORTER).await, Some(SupporterStatus::Online));

    h.gateway.disconnect(&second.ctx).await;
    assert_eq!(h.store.supporter_status(SUPPORTER).await, Some(SupporterStatus::Offline));
}

#[tokio::test]
async fn test_personal_rooms_belong_to_their_owner() {
    let h = TestHarness::new();
    chat(&h).await;
    let mut user = h.connect(USER, Role::User).await;

    h.gateway.handle_event(&user.ctx, ClientEvent::JoinSupporter(RawId::Number(SUPPORTER))).await;
    h.gateway.handle_event(&user.ctx, ClientEvent::JoinUser(RawId::Number(2))).await;

    assert_eq!(user.drain().len(), 2);
    assert_eq!(h.store.supporter_status(SUPPORTER).await, Some(SupporterStatus::Offline));
}

#[tokio::test]
async fn test_explicit_status_toggle() -> Result<(), Error> {
    let h = TestHarness::new();
    chat(&h).await;

    h.presence
        .set_supporter_status(&Identity::new(SUPPORTER, Role::Supporter), SUPPORTER, SupporterStatus::Away)
        .await?;
    assert_eq!(h.store.supporter_status(SUPPORTER).await, Some(SupporterStatus::Away));

    let res = h
        .presence
        .set_supporter_status(&Identity::new(USER, Role::User), SUPPORTER, SupporterStatus::Online)
        .await;
    assert!(matches!(res, Err(Error::Forbidden(_))));

    let res = h
        .presence
        .set_supporter_status(&Identity::new(100, Role::Admin), 555, SupporterStatus::Online)
        .await;
    assert!(matches!(res, Err(Error::NotFound(_))));
    Ok(())
}

#[tokio::test]
async fn test_outsiders_cannot_mark_messages_read() {
    let h = TestHarness::new();
    let chat_id = chat(&h).await;
    let mut user = h.connect(USER, Role::User).await;
    h.gateway.handle_event(&user.ctx, ClientEvent::JoinUser(RawId::Number(USER))).await;
    let mut stranger = h.connect(3, Role::User).await;
    let mut admin = h.connect(100, Role::Admin).await;
    let message_id = user_sends(&h, &mut user, chat_id, "hello").await;

    h.gateway.handle_event(&stranger.ctx, read(message_id, 3)).await;
    h.gateway.handle_event(&admin.ctx, read(message_id, 100)).await;

    assert!(!h.store.messages().await[0].is_read);
    assert!(user.drain().is_empty());
    assert!(matches!(
        stranger.drain().as_slice(),
        [ServerEvent::MessageError(e)] if e.error == "Not allowed to read this message"
    ));
    assert!(matches!(admin.drain().as_slice(), [ServerEvent::MessageError(_)]));
}

#[tokio::test]
async fn test_admin_watching_a_supporter_room_leaves_status_alone() -> Result<(), Error> {
    let h = TestHarness::new();
    chat(&h).await;
    let admin = h.connect(100, Role::Admin).await;

    h.gateway.handle_event(&admin.ctx, ClientEvent::JoinSupporter(RawId::Number(SUPPORTER))).await;
    assert_eq!(h.store.supporter_status(SUPPORTER).await, Some(SupporterStatus::Offline));

    h.presence
        .set_supporter_status(&Identity::new(SUPPORTER, Role::Supporter), SUPPORTER, SupporterStatus::Away)
        .await?;
    h.gateway.disconnect(&admin.ctx).await;
    assert_eq!(h.store.supporter_status(SUPPORTER).await, Some(SupporterStatus::Away));
    Ok(())
}
