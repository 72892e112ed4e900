//! solace-server/src/context.rs
//!
//! Shared state handed to every route: the services, wired once at startup.

use std::sync::Arc;
use std::time::Duration;

use solace_common::traits::repository_traits::{
    ChatMessageRepository, ChatSessionRepository, ScheduledSessionRepository, SupporterRepository,
};
use solace_core::db::Database;
use solace_core::realtime::RealtimeGateway;
use solace_core::repositories::{
    PostgresChatMessageRepository, PostgresChatSessionRepository,
    PostgresScheduledSessionRepository, PostgresSupporterRepository,
};
use solace_core::rooms::{InMemoryRoomRegistry, RoomRegistry};
use solace_core::services::{MessageDeliveryPipeline, PresenceTracker, SessionLifecycleManager};

#[derive(Clone)]
pub struct AppState {
    pub lifecycle: Arc<SessionLifecycleManager>,
    pub delivery: Arc<MessageDeliveryPipeline>,
    pub presence: Arc<PresenceTracker>,
    pub gateway: Arc<RealtimeGateway>,
}

/// The repositories a context is built from.
pub struct Repositories {
    pub scheduled: Arc<dyn ScheduledSessionRepository>,
    pub chats: Arc<dyn ChatSessionRepository>,
    pub messages: Arc<dyn ChatMessageRepository>,
    pub supporters: Arc<dyn SupporterRepository>,
}

impl Repositories {
    pub fn postgres(db: &Database) -> Self {
        let pool = db.pool().clone();
        Self {
            scheduled: Arc::new(PostgresScheduledSessionRepository::new(pool.clone())),
            chats: Arc::new(PostgresChatSessionRepository::new(pool.clone())),
            messages: Arc::new(PostgresChatMessageRepository::new(pool.clone())),
            supporters: Arc::new(PostgresSupporterRepository::new(pool)),
        }
    }
}

impl AppState {
    pub fn new(repos: Repositories, typing_ttl: Duration) -> Self {
        let rooms: Arc<dyn RoomRegistry> = Arc::new(InMemoryRoomRegistry::new());

        let lifecycle = Arc::new(SessionLifecycleManager::new(
            repos.scheduled,
            repos.chats.clone(),
            repos.supporters.clone(),
            rooms.clone(),
        ));
        let delivery = Arc::new(MessageDeliveryPipeline::new(
            repos.messages.clone(),
            repos.chats.clone(),
            rooms.clone(),
        ));
        let presence = Arc::new(PresenceTracker::new(
            repos.supporters,
            repos.messages,
            repos.chats,
            rooms.clone(),
            typing_ttl,
        ));
        let gateway = Arc::new(RealtimeGateway::new(
            rooms,
            lifecycle.clone(),
            delivery.clone(),
            presence.clone(),
        ));

        Self {
            lifecycle,
            delivery,
            presence,
            gateway,
        }
    }
}
