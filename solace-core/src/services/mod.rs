// File: src/services/mod.rs

pub mod session_lifecycle;
pub mod message_delivery;
pub mod presence;

pub use session_lifecycle::{SessionLifecycleManager, StartOutcome};
pub use message_delivery::MessageDeliveryPipeline;
pub use presence::{PresenceTracker, DEFAULT_TYPING_TTL};
