// File: solace-core/src/rooms/registry.rs

use std::collections::HashSet;
use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, trace};
use solace_common::models::realtime::{ConnectionId, ServerEvent};

use super::{ConnectionSender, RoomKey, RoomRegistry};

/// Process-local registry. Two indexes are kept in step: room -> members and
/// connection -> rooms, so a disconnect can leave everything without a scan.
#[derive(Default)]
pub struct InMemoryRoomRegistry {
    rooms: DashMap<RoomKey, HashSet<ConnectionId>>,
    memberships: DashMap<ConnectionId, HashSet<RoomKey>>,
    senders: DashMap<ConnectionId, ConnectionSender>,
}

impl InMemoryRoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn connection_count(&self) -> usize {
        self.senders.len()
    }

    fn remove_member(&self, conn: ConnectionId, room: &RoomKey) {
        if let Some(mut members) = self.rooms.get_mut(room) {
            members.remove(&conn);
        }
        // Rooms vanish once empty.
        self.rooms.remove_if(room, |_, members| members.is_empty());
    }

    fn snapshot(&self, room: &RoomKey) -> Vec<ConnectionId> {
        self.rooms
            .get(room)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    fn deliver(&self, conn: ConnectionId, event: &ServerEvent) -> bool {
        let sender = match self.senders.get(&conn) {
            Some(s) => s.value().clone(),
            None => return false,
        };
        match sender.send(event.clone()) {
            Ok(()) => true,
            Err(_) => {
                debug!("Dropping {} for closed connection {}", event.name(), conn);
                false
            }
        }
    }
}

#[async_trait]
impl RoomRegistry for InMemoryRoomRegistry {
    async fn register(&self, conn: ConnectionId, sender: ConnectionSender) {
        self.senders.insert(conn, sender);
    }

    async fn unregister(&self, conn: ConnectionId) -> Vec<RoomKey> {
        let left = self.leave_all(conn).await;
        self.senders.remove(&conn);
        left
    }

    async fn join(&self, conn: ConnectionId, room: RoomKey) -> bool {
        let inserted = self.rooms.entry(room).or_default().insert(conn);
        self.memberships.entry(conn).or_default().insert(room);
        if inserted {
            trace!("{} joined {}", conn, room);
        }
        inserted
    }

    async fn leave(&self, conn: ConnectionId, room: &RoomKey) {
        self.remove_member(conn, room);
        if let Some(mut rooms) = self.memberships.get_mut(&conn) {
            rooms.remove(room);
        }
        self.memberships.remove_if(&conn, |_, rooms| rooms.is_empty());
    }

    async fn leave_all(&self, conn: ConnectionId) -> Vec<RoomKey> {
        let rooms: Vec<RoomKey> = self
            .memberships
            .remove(&conn)
            .map(|(_, rooms)| rooms.into_iter().collect())
            .unwrap_or_default();
        for room in &rooms {
            self.remove_member(conn, room);
        }
        rooms
    }

    async fn broadcast(&self, room: &RoomKey, event: &ServerEvent, exclude: Option<ConnectionId>) -> usize {
        let mut delivered = 0;
        for member in self.snapshot(room) {
            if Some(member) == exclude {
                continue;
            }
            if self.deliver(member, event) {
                delivered += 1;
            }
        }
        trace!("{} -> {} reached {} member(s)", event.name(), room, delivered);
        delivered
    }

    async fn send_to(&self, conn: ConnectionId, event: &ServerEvent) -> bool {
        self.deliver(conn, event)
    }

    async fn member_count(&self, room: &RoomKey) -> usize {
        self.rooms.get(room).map(|m| m.len()).unwrap_or(0)
    }
}
