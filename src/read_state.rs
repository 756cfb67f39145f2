use crate::api::ChatApi;
use crate::directory::RoomDirectory;
use crate::types::RoomId;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Marks rooms read: zeroes the local counter first, then confirms with the
/// backend.
pub struct ReadStateTracker {
    api: Arc<dyn ChatApi>,
    directory: Arc<RwLock<RoomDirectory>>,
    rollback_on_failure: bool,
}

impl ReadStateTracker {
    pub fn new(
        api: Arc<dyn ChatApi>,
        directory: Arc<RwLock<RoomDirectory>>,
        rollback_on_failure: bool,
    ) -> Self {
        Self {
            api,
            directory,
            rollback_on_failure,
        }
    }

    /// Returns whether the backend confirmed the read. Failures never propagate.
    pub async fn mark_read(&self, room: RoomId) -> bool {
        let previous = self.directory.write().await.zero_unread(room);

        match self.api.mark_read(room).await {
            Ok(()) => {
                tracing::debug!("Room {} marked read", room);
                true
            }
            Err(e) => {
                tracing::warn!("Mark-read for room {} failed: {}", room, e);
                if self.rollback_on_failure
                    && let Some(count) = previous.filter(|count| *count > 0)
                {
                    tracing::debug!("Restoring {} unread on room {}", count, room);
                    self.directory.write().await.restore_unread(room, count);
                }
                false
            }
        }
    }

    /// A read acknowledged elsewhere (another device or tab).
    pub async fn apply_remote_read(&self, room: RoomId) {
        self.directory.write().await.zero_unread(room);
    }
}
