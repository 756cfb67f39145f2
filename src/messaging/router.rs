use super::{SocketEvent, SocketEventKind};
use crate::session::SessionState;
use crate::types::{Message, RoomId};
use std::sync::Arc;

/// Routes parsed socket frames into the store, the directory and the read tracker
pub struct EventRouter {
    state: Arc<SessionState>,
}

impl EventRouter {
    pub fn new(state: Arc<SessionState>) -> Self {
        Self { state }
    }

    /// Parse and route one text frame received on the socket scoped to `scope`.
    pub async fn route_text(&self, scope: RoomId, text: &str) {
        match SocketEvent::parse(text) {
            Ok(event) => self.route(scope, event).await,
            Err(e) => {
                tracing::error!("Failed to parse frame on room {}: {} - Raw: {}", scope, e, text);
            }
        }
    }

    /// Routes an event to the appropriate handler
    pub async fn route(&self, scope: RoomId, event: SocketEvent) {
        tracing::debug!("Routing {} on room {}", event.kind(), scope);

        match event {
            SocketEvent::Ready { membership_id } => {
                self.state
                    .own_memberships
                    .write()
                    .await
                    .insert(scope, membership_id);
                tracing::debug!("Bound own membership {} for room {}", membership_id, scope);
            }
            SocketEvent::MessageCreated(message) => {
                let room = message.conversation.unwrap_or(scope);
                self.handle_message(room, message).await;
            }
            SocketEvent::MessageRead { room } => {
                self.state.reads.apply_remote_read(room.unwrap_or(scope)).await;
            }
            SocketEvent::MessageBadge(badge) => {
                let is_active = self.state.active_room().await == Some(badge.conversation_id);
                self.state
                    .directory
                    .write()
                    .await
                    .apply_badge(&badge, is_active);
            }
            SocketEvent::Unknown(tag) => {
                tracing::debug!(
                    "Ignoring {} frame on room {}",
                    SocketEventKind::Other(tag),
                    scope
                );
            }
        }
    }

    /// Mark the room read once its socket is open.
    pub async fn on_open(&self, room: RoomId) -> bool {
        self.state.reads.mark_read(room).await
    }

    async fn handle_message(&self, room: RoomId, message: Message) {
        let inserted = self
            .state
            .store
            .write()
            .await
            .append_incoming(room, message.clone());
        if !inserted {
            tracing::debug!("Message {} already in room {}", message.id, room);
            return;
        }

        let is_active = self.state.active_room().await == Some(room);
        let is_mine = self.state.own_memberships.read().await.get(&room) == Some(&message.sender);
        let sender_name = self.state.members.read().await.display_name(message.sender);

        self.state.directory.write().await.record_message(
            room,
            &message,
            Some(sender_name),
            !is_active && !is_mine,
        );
    }
}
