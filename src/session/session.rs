use super::{
    ChatSessionBuilder, ChatSessionOptions, Selection, SessionState, SocketController,
    SocketState,
};
use crate::api::{CredentialsProvider, HistoryQuery};
use crate::types::{
    ChatError, MembershipId, Message, PharmacyId, Result, Room, RoomId, RoomKind, UserId,
};
use std::sync::Arc;
use tokio::sync::watch;

/// Result of a history load request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryLoad {
    /// Fetched and merged; carries the number of new messages
    Loaded(usize),
    /// Already loaded this session; nothing fetched
    Cached,
    /// The room was deselected while the fetch was in flight; result dropped
    Stale,
}

/// The chat session manager: room directory, message store, read tracking and
/// the room socket behind one handle.
///
/// # Example
///
/// ```no_run
/// use pharmachat::{ChatSession, ChatSessionOptions, StaticCredentials};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let session = ChatSession::new(
///     ChatSessionOptions {
///         api_base: "https://api.example.com/api/".to_string(),
///         ..Default::default()
///     },
///     Arc::new(StaticCredentials::new("access-token", 12)),
/// )?;
///
/// session.initial_load(&[5]).await?;
/// session.select_room(42).await?;
/// session.send_message(42, "hello").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ChatSession {
    pub(crate) options: Arc<ChatSessionOptions>,
    pub(crate) state: Arc<SessionState>,
    pub(crate) controller: Arc<SocketController>,
}

impl ChatSession {
    /// Creates a session talking to the backend over HTTP.
    ///
    /// No network traffic happens until a load or a room selection.
    pub fn new(
        options: ChatSessionOptions,
        credentials: Arc<dyn CredentialsProvider>,
    ) -> Result<Self> {
        ChatSessionBuilder::new(options).credentials(credentials).build()
    }

    pub fn builder(options: ChatSessionOptions) -> ChatSessionBuilder {
        ChatSessionBuilder::new(options)
    }

    pub fn options(&self) -> &ChatSessionOptions {
        &self.options
    }

    /// Members, rooms from the listing, then the group room of each pharmacy.
    ///
    /// Failures are non-fatal: a failed listing leaves the directory as it was
    /// and sets [`load_error`](Self::load_error).
    pub async fn initial_load(&self, pharmacies: &[PharmacyId]) -> Result<()> {
        self.load_members(pharmacies).await;
        self.refresh_rooms().await?;
        self.list_group_rooms(pharmacies).await;
        Ok(())
    }

    /// Index the members of each pharmacy not indexed yet.
    pub async fn load_members(&self, pharmacies: &[PharmacyId]) {
        for &pharmacy in pharmacies {
            if self.state.members.read().await.is_populated(pharmacy) {
                continue;
            }
            match self.state.api.list_members(pharmacy).await {
                Ok(members) => {
                    tracing::debug!("Indexed {} members of pharmacy {}", members.len(), pharmacy);
                    self.state.members.write().await.populate(pharmacy, members);
                }
                Err(e) => {
                    tracing::warn!("Loading members of pharmacy {} failed: {}", pharmacy, e);
                }
            }
        }
    }

    /// Reload the room listing; backend unread counts replace local ones.
    pub async fn refresh_rooms(&self) -> Result<()> {
        match self.state.api.list_rooms().await {
            Ok(mut rooms) => {
                self.resolve_titles(&mut rooms).await;
                tracing::info!("Loaded {} rooms", rooms.len());
                self.state.directory.write().await.replace_all(rooms);
                Ok(())
            }
            Err(e) => {
                tracing::error!("Loading rooms failed: {}", e);
                self.state
                    .directory
                    .write()
                    .await
                    .set_load_error(e.to_string());
                Err(e)
            }
        }
    }

    /// Group room of each pharmacy, created on the backend when absent.
    ///
    /// A pharmacy whose room is already known is answered locally, so repeated
    /// calls yield the same room. Pharmacies that fail are skipped.
    pub async fn list_group_rooms(&self, pharmacies: &[PharmacyId]) -> Vec<Room> {
        let mut rooms = Vec::with_capacity(pharmacies.len());
        for &pharmacy in pharmacies {
            if let Some(room) = self.state.directory.read().await.group_room(pharmacy) {
                rooms.push(room.clone());
                continue;
            }

            match self.state.api.get_or_create_group_room(pharmacy).await {
                Ok(mut room) => {
                    if room.pharmacy.is_none() {
                        room.pharmacy = Some(pharmacy);
                    }
                    room.kind = RoomKind::Group;
                    self.state.directory.write().await.upsert(room.clone());
                    rooms.push(room);
                }
                Err(e) => {
                    tracing::warn!("Group room for pharmacy {} unavailable: {}", pharmacy, e);
                }
            }
        }
        rooms
    }

    pub async fn list_direct_rooms(&self) -> Vec<Room> {
        self.state
            .directory
            .read()
            .await
            .rooms_of_kind(RoomKind::Direct)
    }

    /// Open (or fetch) the DM room with a partner within a pharmacy.
    pub async fn start_direct(&self, pharmacy: PharmacyId, partner: UserId) -> Result<Room> {
        let mut room = self.state.api.start_direct_message(pharmacy, partner).await?;
        if room.pharmacy.is_none() {
            room.pharmacy = Some(pharmacy);
        }
        room.kind = RoomKind::Direct;
        self.resolve_titles(std::slice::from_mut(&mut room)).await;
        self.state.directory.write().await.upsert(room.clone());
        Ok(room)
    }

    async fn resolve_titles(&self, rooms: &mut [Room]) {
        let Some(me) = self.state.user_id() else {
            return;
        };
        let members = self.state.members.read().await;
        for room in rooms.iter_mut() {
            members.resolve_title(room, me);
        }
    }

    pub async fn rooms(&self) -> Vec<Room> {
        self.state.directory.read().await.rooms()
    }

    pub async fn room(&self, id: RoomId) -> Option<Room> {
        self.state.directory.read().await.room(id).cloned()
    }

    pub async fn total_unread(&self) -> u32 {
        self.state.directory.read().await.total_unread()
    }

    /// Follows the total unread count (e.g. for a navigation badge).
    pub async fn watch_total_unread(&self) -> watch::Receiver<u32> {
        self.state.directory.read().await.watch_total_unread()
    }

    /// Last non-fatal load failure, cleared by a successful refresh
    pub async fn load_error(&self) -> Option<String> {
        self.state
            .directory
            .read()
            .await
            .load_error()
            .map(str::to_string)
    }

    /// Make `room` the open room: swap the socket over to it and load its
    /// history.
    pub async fn select_room(&self, room: RoomId) -> Result<HistoryLoad> {
        let stamp = self.controller.open(room).await?;
        self.load_latest(room, stamp).await
    }

    /// Leave the open room and close its socket.
    pub async fn close(&self) {
        self.controller.close().await;
    }

    /// Room the socket belongs to while it is connecting or open
    pub async fn socket_room(&self) -> Option<RoomId> {
        self.controller.scope().await
    }

    pub async fn active_room(&self) -> Option<RoomId> {
        self.state.active_room().await
    }

    /// Fetch the latest history page unless the room was already loaded.
    pub async fn load_history(&self, room: RoomId) -> Result<HistoryLoad> {
        let stamp = self.state.selection().await;
        self.load_latest(room, stamp).await
    }

    async fn load_latest(&self, room: RoomId, stamp: Selection) -> Result<HistoryLoad> {
        if self.state.store.read().await.is_loaded(room) {
            return Ok(HistoryLoad::Cached);
        }

        let page_size = self.options.history_page_size;
        let page = self
            .state
            .api
            .fetch_messages(room, HistoryQuery::latest(page_size))
            .await
            .inspect_err(|e| tracing::error!("Loading history of room {} failed: {}", room, e))?;

        if stamp.room == Some(room) && !self.state.is_current(stamp).await {
            tracing::debug!("Dropping stale history of room {}", room);
            return Ok(HistoryLoad::Stale);
        }

        let newest = page.first().cloned();
        let added = self
            .state
            .store
            .write()
            .await
            .seed_history(room, page, page_size);

        // history may carry a newer preview than the room listing did
        if let Some(newest) = newest {
            let sender_name = self.state.members.read().await.display_name(newest.sender);
            let mut directory = self.state.directory.write().await;
            if directory.contains(room) {
                directory.record_message(room, &newest, Some(sender_name), false);
            }
        }
        Ok(HistoryLoad::Loaded(added))
    }

    /// Fetch the page before the oldest loaded message.
    pub async fn load_older(&self, room: RoomId) -> Result<HistoryLoad> {
        let oldest = {
            let store = self.state.store.read().await;
            if !store.has_more(room) {
                return Ok(HistoryLoad::Cached);
            }
            store.oldest_id(room)
        };
        let Some(oldest) = oldest else {
            return self.load_history(room).await;
        };

        let stamp = self.state.selection().await;
        let page_size = self.options.history_page_size;
        let page = self
            .state
            .api
            .fetch_messages(room, HistoryQuery::before(oldest, page_size))
            .await?;

        if stamp.room == Some(room) && !self.state.is_current(stamp).await {
            return Ok(HistoryLoad::Stale);
        }

        let added = self
            .state
            .store
            .write()
            .await
            .merge_older(room, page, page_size);
        Ok(HistoryLoad::Loaded(added))
    }

    pub async fn has_more_history(&self, room: RoomId) -> bool {
        self.state.store.read().await.has_more(room)
    }

    /// Make the next [`load_history`](Self::load_history) refetch.
    pub async fn invalidate(&self, room: RoomId) {
        self.state.store.write().await.invalidate(room);
    }

    /// Insert a message unless already present (see [`MessageStore`](crate::store::MessageStore)).
    pub async fn append_incoming(&self, room: RoomId, message: Message) -> bool {
        self.state
            .store
            .write()
            .await
            .append_incoming(room, message)
    }

    pub async fn messages(&self, room: RoomId) -> Vec<Message> {
        self.state.store.read().await.messages(room).to_vec()
    }

    /// Messages of the open room, empty when none is open
    pub async fn active_messages(&self) -> Vec<Message> {
        match self.active_room().await {
            Some(room) => self.messages(room).await,
            None => Vec::new(),
        }
    }

    /// Post a message. It shows up when the server broadcasts it back.
    ///
    /// On failure the body is kept as the room's draft and returned in
    /// [`ChatError::SendFailed`].
    pub async fn send_message(&self, room: RoomId, body: &str) -> Result<()> {
        if body.trim().is_empty() {
            return Ok(());
        }
        self.state.drafts.write().await.remove(&room);

        match self.state.api.post_message(room, body).await {
            Ok(()) => {
                tracing::debug!("Posted message to room {}", room);
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Sending to room {} failed: {}", room, e);
                self.state
                    .drafts
                    .write()
                    .await
                    .insert(room, body.to_string());
                Err(ChatError::SendFailed {
                    draft: body.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    pub async fn set_draft(&self, room: RoomId, text: impl Into<String>) {
        self.state.drafts.write().await.insert(room, text.into());
    }

    pub async fn draft(&self, room: RoomId) -> Option<String> {
        self.state.drafts.read().await.get(&room).cloned()
    }

    /// Zero the room's unread counter now and confirm with the backend.
    pub async fn mark_read(&self, room: RoomId) -> bool {
        self.state.reads.mark_read(room).await
    }

    /// Own membership in the room, once the socket's `ready` event arrived
    pub async fn my_membership(&self, room: RoomId) -> Option<MembershipId> {
        self.state.own_memberships.read().await.get(&room).copied()
    }

    pub async fn is_mine(&self, room: RoomId, message: &Message) -> bool {
        self.my_membership(room).await == Some(message.sender)
    }

    pub async fn sender_name(&self, membership: MembershipId) -> String {
        self.state.members.read().await.display_name(membership)
    }

    pub fn socket_state(&self) -> SocketState {
        self.controller.state()
    }

    pub fn watch_socket_state(&self) -> watch::Receiver<SocketState> {
        self.controller.watch_state()
    }
}
