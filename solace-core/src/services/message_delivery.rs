// File: solace-core/src/services/message_delivery.rs

use std::sync::Arc;
use chrono::Utc;
use tracing::{debug, error, warn};

use solace_common::models::chat::{ActiveChatSummary, ChatMessage, NewChatMessage, DEFAULT_MESSAGE_TYPE};
use solace_common::models::identity::Identity;
use solace_common::models::realtime::{
    ConnectionId, MessagePayload, SendMessagePayload, ServerEvent, DELIVERED,
};
use solace_common::traits::repository_traits::{ChatMessageRepository, ChatSessionRepository};

use crate::access::{self, Action, Parties};
use crate::rooms::{RoomKey, RoomRegistry};
use crate::Error;

/// Persist-then-broadcast for chat messages.
///
/// A message is only fanned out after the store has accepted it, so every `new-message`
/// a client sees has a real `messageId`. Failures go back to the sender alone.
pub struct MessageDeliveryPipeline {
    message_repo: Arc<dyn ChatMessageRepository>,
    chat_repo: Arc<dyn ChatSessionRepository>,
    rooms: Arc<dyn RoomRegistry>,
}

impl MessageDeliveryPipeline {
    pub fn new(
        message_repo: Arc<dyn ChatMessageRepository>,
        chat_repo: Arc<dyn ChatSessionRepository>,
        rooms: Arc<dyn RoomRegistry>,
    ) -> Self {
        debug!("MessageDeliveryPipeline::new() called");
        Self {
            message_repo,
            chat_repo,
            rooms,
        }
    }

    /// Handles one `send-message` from connection `conn`.
    ///
    /// Nothing is stored unless the sender and the receiver are the chat's two parties.
    /// Returns the delivered payload, or `None` when the sender was sent a
    /// `message-error` instead.
    pub async fn send(
        &self,
        conn: ConnectionId,
        identity: &Identity,
        payload: SendMessagePayload,
    ) -> Option<MessagePayload> {
        if payload.sender_id != identity.id {
            warn!(
                "Connection {} (user {}) tried to send as {}",
                conn, identity.id, payload.sender_id
            );
            self.reject(conn, "Sender does not match the connected user").await;
            return None;
        }
        if payload.message.trim().is_empty() {
            self.reject(conn, "Message content is required").await;
            return None;
        }

        let chat = match self.chat_repo.get(payload.session_id).await {
            Ok(Some(chat)) => chat,
            Ok(None) => {
                self.reject(conn, "Chat session not found").await;
                return None;
            }
            Err(e) => {
                error!("Failed to load chat session {}: {:?}", payload.session_id, e);
                self.reject(conn, "Failed to send message").await;
                return None;
            }
        };
        let parties = Parties::new(chat.user_id, chat.supporter_id);
        if !access::authorize(identity, parties, Action::SendMessage).is_allowed() {
            warn!(
                "User {} is not a party of chat {} ({}/{})",
                identity.id, chat.session_id, chat.user_id, chat.supporter_id
            );
            self.reject(conn, "Not allowed to send in this chat").await;
            return None;
        }
        if Some(payload.receiver_id) != parties.other(payload.sender_id) {
            self.reject(conn, "Receiver is not the other party of this chat").await;
            return None;
        }

        let message_type = payload
            .message_type
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_MESSAGE_TYPE)
            .to_string();

        let stored = match self
            .message_repo
            .insert(&NewChatMessage {
                session_id: payload.session_id,
                sender_id: payload.sender_id,
                content: payload.message.clone(),
                message_type,
            })
            .await
        {
            Ok(m) => m,
            Err(e) => {
                error!(
                    "Failed to persist message for session {} from {}: {:?}",
                    payload.session_id, payload.sender_id, e
                );
                self.reject(conn, "Failed to send message").await;
                return None;
            }
        };

        let delivered = MessagePayload {
            message_id: stored.message_id,
            session_id: stored.session_id,
            sender_id: stored.sender_id,
            sender_name: payload.sender_name,
            receiver_id: payload.receiver_id,
            message: stored.content,
            message_type: stored.message_type,
            timestamp: Utc::now(),
            status: DELIVERED.to_string(),
        };

        let event = ServerEvent::NewMessage(delivered.clone());
        let mut reached = 0;
        for room in [
            RoomKey::User(delivered.receiver_id),
            RoomKey::Supporter(delivered.receiver_id),
            RoomKey::Session(delivered.session_id),
        ] {
            reached += self.rooms.broadcast(&room, &event, Some(conn)).await;
        }
        debug!(
            "Message {} in session {} reached {} queue(s)",
            delivered.message_id, delivered.session_id, reached
        );

        self.rooms
            .send_to(conn, &ServerEvent::MessageSent(delivered.clone()))
            .await;
        Some(delivered)
    }

    /// Chronological history of a chat session, for its participants.
    pub async fn messages_for_session(
        &self,
        session_id: i64,
        identity: &Identity,
    ) -> Result<Vec<ChatMessage>, Error> {
        let chat = self
            .chat_repo
            .get(session_id)
            .await?
            .ok_or_else(|| Error::NotFound("Chat session not found".into()))?;
        access::authorize(identity, Parties::new(chat.user_id, chat.supporter_id), Action::ReadChat)
            .require("read this chat")?;
        self.message_repo.list_for_session(session_id).await
    }

    /// Active chats of a supporter with last message and unread count.
    pub async fn active_chats_for_supporter(
        &self,
        supporter_id: i64,
        identity: &Identity,
    ) -> Result<Vec<ActiveChatSummary>, Error> {
        access::can_view_as(identity, supporter_id).require("view these chats")?;
        self.chat_repo.list_active_for_supporter(supporter_id).await
    }

    async fn reject(&self, conn: ConnectionId, reason: &str) {
        self.rooms.send_to(conn, &ServerEvent::message_error(reason)).await;
    }
}
