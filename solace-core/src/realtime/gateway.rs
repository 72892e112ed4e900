// File: solace-core/src/realtime/gateway.rs

use std::sync::Arc;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use solace_common::models::identity::{Identity, Role};
use solace_common::models::realtime::{ClientEvent, ConnectionId, RawId, ServerEvent};

use crate::rooms::{ConnectionSender, RoomKey, RoomRegistry};
use crate::services::{MessageDeliveryPipeline, PresenceTracker, SessionLifecycleManager};
use crate::Error;

/// One open socket and the caller behind it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionContext {
    pub id: ConnectionId,
    pub identity: Identity,
}

/// Routes inbound socket events to the services. The transport calls `connect`,
/// then `handle_frame` for every text frame (sequentially), then `disconnect`.
pub struct RealtimeGateway {
    rooms: Arc<dyn RoomRegistry>,
    lifecycle: Arc<SessionLifecycleManager>,
    delivery: Arc<MessageDeliveryPipeline>,
    presence: Arc<PresenceTracker>,
}

impl RealtimeGateway {
    pub fn new(
        rooms: Arc<dyn RoomRegistry>,
        lifecycle: Arc<SessionLifecycleManager>,
        delivery: Arc<MessageDeliveryPipeline>,
        presence: Arc<PresenceTracker>,
    ) -> Self {
        Self {
            rooms,
            lifecycle,
            delivery,
            presence,
        }
    }

    pub async fn connect(&self, identity: Identity, sender: ConnectionSender) -> ConnectionContext {
        let ctx = ConnectionContext {
            id: Uuid::new_v4(),
            identity,
        };
        self.rooms.register(ctx.id, sender).await;
        info!("Connection {} opened for {} ({})", ctx.id, identity.id, identity.role);
        ctx
    }

    /// Parses one text frame. Malformed frames get an `error` event back.
    pub async fn handle_frame(&self, ctx: &ConnectionContext, text: &str) {
        match serde_json::from_str::<ClientEvent>(text) {
            Ok(event) => self.handle_event(ctx, event).await,
            Err(e) => {
                debug!("Malformed frame on {}: {}", ctx.id, e);
                self.rooms
                    .send_to(ctx.id, &ServerEvent::error(format!("Malformed event: {}", e)))
                    .await;
            }
        }
    }

    pub async fn handle_event(&self, ctx: &ConnectionContext, event: ClientEvent) {
        trace!("{} <- {}", ctx.id, event.name());
        match event {
            ClientEvent::JoinUser(raw) => {
                if let Some(id) = self.personal_id(ctx, &raw, Role::User).await {
                    self.rooms.join(ctx.id, RoomKey::User(id)).await;
                }
            }
            ClientEvent::JoinSupporter(raw) => {
                if let Some(id) = self.personal_id(ctx, &raw, Role::Supporter).await {
                    self.rooms.join(ctx.id, RoomKey::Supporter(id)).await;
                    // An admin watching the room does not make the supporter available.
                    if id == ctx.identity.id {
                        self.presence.supporter_connected(id).await;
                    }
                }
            }
            ClientEvent::JoinSession(raw) => {
                if let Some(id) = self.parse_id(ctx, &raw).await {
                    self.rooms.join(ctx.id, RoomKey::Session(id)).await;
                }
            }
            ClientEvent::LeaveSession(raw) => {
                if let Some(id) = self.parse_id(ctx, &raw).await {
                    self.rooms.leave(ctx.id, &RoomKey::Session(id)).await;
                }
            }
            ClientEvent::SendMessage(payload) => {
                self.delivery.send(ctx.id, &ctx.identity, payload).await;
            }
            ClientEvent::Typing(p) => {
                self.presence
                    .set_typing(ctx.id, &ctx.identity, p.session_id, p.user_id, p.is_typing)
                    .await;
            }
            ClientEvent::MessageRead(p) => {
                self.presence
                    .mark_read(ctx.id, &ctx.identity, p.message_id, p.reader_id)
                    .await;
            }
            ClientEvent::StartSession(p) => {
                let result = self
                    .lifecycle
                    .start(p.session_id, &ctx.identity, p.session_type)
                    .await;
                self.report(ctx, "start-session", result.map(|_| ())).await;
            }
            ClientEvent::EndSession(p) => {
                if let Some(claimed) = p.ended_by.filter(|by| *by != ctx.identity.id) {
                    debug!("Ignoring endedBy={} from {}; using connection identity", claimed, ctx.id);
                }
                let result = self.lifecycle.end(p.session_id, &ctx.identity).await;
                self.report(ctx, "end-session", result.map(|_| ())).await;
            }
        }
    }

    /// Leaves every room, clears typing flags and updates supporter availability.
    pub async fn disconnect(&self, ctx: &ConnectionContext) {
        self.presence.clear_typing_for_connection(ctx.id).await;
        let left = self.rooms.unregister(ctx.id).await;
        for room in &left {
            match room {
                RoomKey::Supporter(id) if *id == ctx.identity.id => {
                    self.presence.supporter_disconnected(*id).await;
                }
                _ => {}
            }
        }
        info!("Connection {} closed ({} room(s) left)", ctx.id, left.len());
    }

    async fn parse_id(&self, ctx: &ConnectionContext, raw: &RawId) -> Option<i64> {
        match raw.to_id() {
            Ok(id) => Some(id),
            Err(e) => {
                self.rooms.send_to(ctx.id, &ServerEvent::error(e.client_message())).await;
                None
            }
        }
    }

    /// Personal rooms are only joinable by their owner (or an admin).
    async fn personal_id(&self, ctx: &ConnectionContext, raw: &RawId, role: Role) -> Option<i64> {
        let id = self.parse_id(ctx, raw).await?;
        let identity = ctx.identity;
        let owns = identity.id == id && (role == Role::User || identity.role == role);
        if owns || identity.is_admin() {
            Some(id)
        } else {
            warn!("Connection {} ({}) may not join personal room of {}", ctx.id, identity.id, id);
            self.rooms
                .send_to(ctx.id, &ServerEvent::error("Not allowed to join this room"))
                .await;
            None
        }
    }

    async fn report(&self, ctx: &ConnectionContext, what: &str, result: Result<(), Error>) {
        if let Err(e) = result {
            debug!("{} failed for {}: {}", what, ctx.id, e);
            self.rooms
                .send_to(ctx.id, &ServerEvent::error(e.client_message()))
                .await;
        }
    }
}
