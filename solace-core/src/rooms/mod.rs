//! src/rooms/mod.rs
//!
//! Logical broadcast groups for connected clients. A connection can sit in any number
//! of rooms; membership is ephemeral and disappears with the connection.

pub mod registry;

use std::fmt;
use std::str::FromStr;
use async_trait::async_trait;
use tokio::sync::mpsc;
use solace_common::models::realtime::{ConnectionId, ServerEvent};

pub use registry::InMemoryRoomRegistry;

/// Outbound queue of one connection. The socket writer task drains it.
pub type ConnectionSender = mpsc::UnboundedSender<ServerEvent>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoomKey {
    User(i64),
    Supporter(i64),
    Session(i64),
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoomKey::User(id) => write!(f, "user_{}", id),
            RoomKey::Supporter(id) => write!(f, "supporter_{}", id),
            RoomKey::Session(id) => write!(f, "session_{}", id),
        }
    }
}

impl FromStr for RoomKey {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, id) = s
            .rsplit_once('_')
            .ok_or_else(|| format!("Invalid room key: {}", s))?;
        let id: i64 = id.parse().map_err(|_| format!("Invalid room key: {}", s))?;
        match prefix {
            "user" => Ok(RoomKey::User(id)),
            "supporter" => Ok(RoomKey::Supporter(id)),
            "session" => Ok(RoomKey::Session(id)),
            _ => Err(format!("Invalid room key: {}", s)),
        }
    }
}

/// Room membership and fan-out. Injected as `Arc<dyn RoomRegistry>` so a shared broker
/// can replace the in-process map without touching callers.
#[async_trait]
pub trait RoomRegistry: Send + Sync {
    /// Attach the outbound queue for a freshly opened connection.
    async fn register(&self, conn: ConnectionId, sender: ConnectionSender);

    /// Detach a connection and drop it from every room. Returns the rooms it was in.
    async fn unregister(&self, conn: ConnectionId) -> Vec<RoomKey>;

    /// Idempotent. Returns true if the connection was not yet a member.
    async fn join(&self, conn: ConnectionId, room: RoomKey) -> bool;

    async fn leave(&self, conn: ConnectionId, room: &RoomKey);

    async fn leave_all(&self, conn: ConnectionId) -> Vec<RoomKey>;

    /// Deliver to every member except `exclude`. Returns how many queues accepted it;
    /// an empty room is not an error.
    async fn broadcast(&self, room: &RoomKey, event: &ServerEvent, exclude: Option<ConnectionId>) -> usize;

    async fn send_to(&self, conn: ConnectionId, event: &ServerEvent) -> bool;

    async fn member_count(&self, room: &RoomKey) -> usize;
}
