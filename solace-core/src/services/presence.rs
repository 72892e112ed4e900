// File: solace-core/src/services/presence.rs

use std::sync::Arc;
use std::time::{Duration, Instant};
use chrono::Utc;
use dashmap::DashMap;
use tracing::{debug, error, info, trace, warn};

use solace_common::models::chat::MarkReadOutcome;
use solace_common::models::identity::{Identity, Role};
use solace_common::models::realtime::{
    ConnectionId, ReadReceiptPayload, ServerEvent, UserTypingPayload,
};
use solace_common::models::supporter::SupporterStatus;
use solace_common::traits::repository_traits::{
    ChatMessageRepository, ChatSessionRepository, SupporterRepository,
};

use crate::access::{self, Action, Parties};
use crate::rooms::{RoomKey, RoomRegistry};
use crate::Error;

/// How long a typing flag lives without a refresh.
pub const DEFAULT_TYPING_TTL: Duration = Duration::from_secs(8);

#[derive(Debug, Clone, Copy)]
struct TypingEntry {
    conn: ConnectionId,
    expires_at: Instant,
}

/// Typing indicators, read receipts and supporter availability.
pub struct PresenceTracker {
    supporter_repo: Arc<dyn SupporterRepository>,
    message_repo: Arc<dyn ChatMessageRepository>,
    chat_repo: Arc<dyn ChatSessionRepository>,
    rooms: Arc<dyn RoomRegistry>,
    /// (session_id, user_id) -> who is typing and until when.
    typing: DashMap<(i64, i64), TypingEntry>,
    typing_ttl: Duration,
}

impl PresenceTracker {
    pub fn new(
        supporter_repo: Arc<dyn SupporterRepository>,
        message_repo: Arc<dyn ChatMessageRepository>,
        chat_repo: Arc<dyn ChatSessionRepository>,
        rooms: Arc<dyn RoomRegistry>,
        typing_ttl: Duration,
    ) -> Self {
        debug!("PresenceTracker::new() called with ttl={:?}", typing_ttl);
        Self {
            supporter_repo,
            message_repo,
            chat_repo,
            rooms,
            typing: DashMap::new(),
            typing_ttl,
        }
    }

    /// Explicit availability change from a supporter (or an admin acting for one).
    pub async fn set_supporter_status(
        &self,
        identity: &Identity,
        supporter_id: i64,
        status: SupporterStatus,
    ) -> Result<(), Error> {
        let allowed = identity.is_admin()
            || (identity.role == Role::Supporter && identity.id == supporter_id);
        if !allowed {
            return Err(Error::Forbidden("Not allowed to change this supporter's status".into()));
        }
        if !self.supporter_repo.set_status(supporter_id, status).await? {
            return Err(Error::NotFound("Supporter not found".into()));
        }
        info!("Supporter {} is now {}", supporter_id, status);
        Ok(())
    }

    /// A connection joined `supporter_<id>`.
    pub async fn supporter_connected(&self, supporter_id: i64) {
        self.update_status_quietly(supporter_id, SupporterStatus::Online).await;
    }

    /// A connection left `supporter_<id>`; goes offline once nobody is left in the room.
    pub async fn supporter_disconnected(&self, supporter_id: i64) {
        if self.rooms.member_count(&RoomKey::Supporter(supporter_id)).await == 0 {
            self.update_status_quietly(supporter_id, SupporterStatus::Offline).await;
        }
    }

    async fn update_status_quietly(&self, supporter_id: i64, status: SupporterStatus) {
        match self.supporter_repo.set_status(supporter_id, status).await {
            Ok(true) => debug!("Supporter {} -> {}", supporter_id, status),
            Ok(false) => trace!("No supporter profile for {}", supporter_id),
            Err(e) => error!("Failed to set supporter {} {}: {:?}", supporter_id, status, e),
        }
    }

    /// Handles `message-read`. Receipts go out only on an actual false -> true flip.
    pub async fn mark_read(
        &self,
        conn: ConnectionId,
        identity: &Identity,
        message_id: i64,
        reader_id: i64,
    ) {
        if reader_id != identity.id {
            warn!("Connection {} (user {}) tried to read as {}", conn, identity.id, reader_id);
            self.rooms
                .send_to(conn, &ServerEvent::message_error("Reader does not match the connected user"))
                .await;
            return;
        }

        let message = match self.message_repo.get(message_id).await {
            Ok(Some(m)) => m,
            Ok(None) => {
                self.rooms
                    .send_to(conn, &ServerEvent::message_error("Message not found"))
                    .await;
                return;
            }
            Err(e) => {
                error!("Failed to load message {}: {:?}", message_id, e);
                self.rooms
                    .send_to(conn, &ServerEvent::message_error("Failed to mark message as read"))
                    .await;
                return;
            }
        };
        // Reading your own message is not a read.
        if message.sender_id == reader_id {
            trace!("Ignoring self-read of message {}", message_id);
            return;
        }

        let allowed = match self.chat_repo.get(message.session_id).await {
            Ok(Some(chat)) => access::authorize(
                identity,
                Parties::new(chat.user_id, chat.supporter_id),
                Action::MarkRead,
            )
            .is_allowed(),
            Ok(None) => false,
            Err(e) => {
                error!("Failed to load chat session {}: {:?}", message.session_id, e);
                self.rooms
                    .send_to(conn, &ServerEvent::message_error("Failed to mark message as read"))
                    .await;
                return;
            }
        };
        if !allowed {
            warn!("User {} may not read message {} in chat {}", reader_id, message_id, message.session_id);
            self.rooms
                .send_to(conn, &ServerEvent::message_error("Not allowed to read this message"))
                .await;
            return;
        }

        match self.message_repo.mark_read(message_id).await {
            Ok(MarkReadOutcome::Transitioned { sender_id, .. }) => {
                let receipt = ServerEvent::MessageReadReceipt(ReadReceiptPayload {
                    message_id,
                    reader_id,
                    timestamp: Utc::now(),
                });
                for room in [RoomKey::User(sender_id), RoomKey::Supporter(sender_id)] {
                    self.rooms.broadcast(&room, &receipt, None).await;
                }
                debug!("Message {} read by {}", message_id, reader_id);
            }
            Ok(MarkReadOutcome::AlreadyRead { .. }) => {
                trace!("Message {} was already read", message_id);
            }
            Ok(MarkReadOutcome::NotFound) => {
                self.rooms
                    .send_to(conn, &ServerEvent::message_error("Message not found"))
                    .await;
            }
            Err(e) => {
                error!("Failed to mark message {} read: {:?}", message_id, e);
                self.rooms
                    .send_to(conn, &ServerEvent::message_error("Failed to mark message as read"))
                    .await;
            }
        }
    }

    /// Relays a typing flag to the rest of the session room. Ids that do not match the
    /// connection are rejected.
    pub async fn set_typing(
        &self,
        conn: ConnectionId,
        identity: &Identity,
        session_id: i64,
        user_id: i64,
        is_typing: bool,
    ) {
        if user_id != identity.id {
            self.rooms
                .send_to(conn, &ServerEvent::message_error("Typing user does not match the connected user"))
                .await;
            return;
        }

        let key = (session_id, user_id);
        if is_typing {
            self.typing.insert(
                key,
                TypingEntry {
                    conn,
                    expires_at: Instant::now() + self.typing_ttl,
                },
            );
        } else {
            self.typing.remove(&key);
        }
        self.announce_typing(session_id, user_id, is_typing, Some(conn)).await;
    }

    /// Clears flags whose TTL has lapsed and tells the room. Returns how many were cleared.
    pub async fn sweep_expired_typing(&self) -> usize {
        self.sweep_expired_typing_at(Instant::now()).await
    }

    pub async fn sweep_expired_typing_at(&self, now: Instant) -> usize {
        let expired: Vec<((i64, i64), TypingEntry)> = self
            .typing
            .iter()
            .filter(|e| e.value().expires_at <= now)
            .map(|e| (*e.key(), *e.value()))
            .collect();

        let mut cleared = 0;
        for (key, entry) in expired {
            // Only drop it if nobody refreshed it in the meantime.
            if self
                .typing
                .remove_if(&key, |_, current| current.expires_at <= now)
                .is_some()
            {
                cleared += 1;
                self.announce_typing(key.0, key.1, false, Some(entry.conn)).await;
            }
        }
        if cleared > 0 {
            debug!("Expired {} typing indicator(s)", cleared);
        }
        cleared
    }

    /// Drops every flag raised by `conn`, announcing each as stopped.
    pub async fn clear_typing_for_connection(&self, conn: ConnectionId) {
        let owned: Vec<(i64, i64)> = self
            .typing
            .iter()
            .filter(|e| e.value().conn == conn)
            .map(|e| *e.key())
            .collect();
        for key in owned {
            if self.typing.remove_if(&key, |_, e| e.conn == conn).is_some() {
                self.announce_typing(key.0, key.1, false, Some(conn)).await;
            }
        }
    }

    pub fn is_typing(&self, session_id: i64, user_id: i64) -> bool {
        self.typing.contains_key(&(session_id, user_id))
    }

    async fn announce_typing(&self, session_id: i64, user_id: i64, is_typing: bool, exclude: Option<ConnectionId>) {
        let event = ServerEvent::UserTyping(UserTypingPayload { user_id, is_typing });
        self.rooms
            .broadcast(&RoomKey::Session(session_id), &event, exclude)
            .await;
    }
}
