//! src/realtime/mod.rs
//!
//! Transport-independent handling of socket events. The server crate owns the actual
//! WebSocket and feeds text frames in here.

pub mod gateway;

pub use gateway::{ConnectionContext, RealtimeGateway};
