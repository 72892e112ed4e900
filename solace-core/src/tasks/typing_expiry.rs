// solace-core/src/tasks/typing_expiry.rs

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::trace;
use crate::services::PresenceTracker;

/// Spawns a background task that periodically clears typing flags whose TTL lapsed,
/// broadcasting `isTyping: false` for each.
pub fn spawn_typing_expiry_task(
    tracker: Arc<PresenceTracker>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            sleep(interval).await;
            let cleared = tracker.sweep_expired_typing().await;
            trace!("typing sweep cleared {}", cleared);
        }
    })
}
