// File: solace-core/src/test_utils/harness.rs

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use solace_common::models::identity::{Identity, Role};
use solace_common::models::realtime::ServerEvent;

use crate::realtime::{ConnectionContext, RealtimeGateway};
use crate::rooms::{InMemoryRoomRegistry, RoomRegistry};
use crate::services::{MessageDeliveryPipeline, PresenceTracker, SessionLifecycleManager};
use super::MemoryStore;

/// Every service wired over one `MemoryStore` and one in-process registry.
pub struct TestHarness {
    pub store: Arc<MemoryStore>,
    pub rooms: Arc<InMemoryRoomRegistry>,
    pub lifecycle: Arc<SessionLifecycleManager>,
    pub delivery: Arc<MessageDeliveryPipeline>,
    pub presence: Arc<PresenceTracker>,
    pub gateway: Arc<RealtimeGateway>,
}

/// A fake client: its context plus the receiving end of its outbound queue.
pub struct TestClient {
    pub ctx: ConnectionContext,
    pub rx: mpsc::UnboundedReceiver<ServerEvent>,
}

impl TestClient {
    /// Everything queued so far, without waiting.
    pub fn drain(&mut self) -> Vec<ServerEvent> {
        let mut out = Vec::new();
        while let Ok(evt) = self.rx.try_recv() {
            out.push(evt);
        }
        out
    }
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_typing_ttl(Duration::from_secs(8))
    }

    pub fn with_typing_ttl(ttl: Duration) -> Self {
        let store = Arc::new(MemoryStore::new());
        let rooms = Arc::new(InMemoryRoomRegistry::new());
        let registry: Arc<dyn RoomRegistry> = rooms.clone();

        let lifecycle = Arc::new(SessionLifecycleManager::new(
            store.clone(),
            store.clone(),
            store.clone(),
            registry.clone(),
        ));
        let delivery = Arc::new(MessageDeliveryPipeline::new(
            store.clone(),
            store.clone(),
            registry.clone(),
        ));
        let presence = Arc::new(PresenceTracker::new(
            store.clone(),
            store.clone(),
            store.clone(),
            registry.clone(),
            ttl,
        ));
        let gateway = Arc::new(RealtimeGateway::new(
            registry,
            lifecycle.clone(),
            delivery.clone(),
            presence.clone(),
        ));

        Self {
            store,
            rooms,
            lifecycle,
            delivery,
            presence,
            gateway,
        }
    }

    pub async fn connect(&self, id: i64, role: Role) -> TestClient {
        let (tx, rx) = mpsc::unbounded_channel();
        let ctx = self.gateway.connect(Identity::new(id, role), tx).await;
        TestClient { ctx, rx }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
