use crate::api::{ChatApi, CredentialsProvider};
use crate::directory::RoomDirectory;
use crate::membership::MembershipIndex;
use crate::read_state::ReadStateTracker;
use crate::store::MessageStore;
use crate::types::{MembershipId, RoomId, UserId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Which room is on screen, stamped with a generation that changes on every
/// selection so late results can be recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Selection {
    pub room: Option<RoomId>,
    pub generation: u64,
}

/// State shared by the session facade, the socket controller and the router
pub struct SessionState {
    pub api: Arc<dyn ChatApi>,
    pub credentials: Arc<dyn CredentialsProvider>,
    pub directory: Arc<RwLock<RoomDirectory>>,
    pub store: RwLock<MessageStore>,
    pub members: RwLock<MembershipIndex>,
    pub reads: ReadStateTracker,
    /// Own membership per room, bound by the socket `ready` event
    pub own_memberships: RwLock<HashMap<RoomId, MembershipId>>,
    pub drafts: RwLock<HashMap<RoomId, String>>,
    selection: RwLock<Selection>,
}

impl SessionState {
    pub fn new(
        api: Arc<dyn ChatApi>,
        credentials: Arc<dyn CredentialsProvider>,
        rollback_unread_on_failure: bool,
    ) -> Self {
        let directory = Arc::new(RwLock::new(RoomDirectory::new()));
        let reads = ReadStateTracker::new(
            Arc::clone(&api),
            Arc::clone(&directory),
            rollback_unread_on_failure,
        );

        Self {
            api,
            credentials,
            directory,
            store: RwLock::new(MessageStore::new()),
            members: RwLock::new(MembershipIndex::new()),
            reads,
            own_memberships: RwLock::new(HashMap::new()),
            drafts: RwLock::new(HashMap::new()),
            selection: RwLock::new(Selection::default()),
        }
    }

    /// Make `room` the active selection and return its stamp
    pub async fn select(&self, room: Option<RoomId>) -> Selection {
        let mut selection = self.selection.write().await;
        selection.room = room;
        selection.generation += 1;
        *selection
    }

    pub async fn selection(&self) -> Selection {
        *self.selection.read().await
    }

    pub async fn active_room(&self) -> Option<RoomId> {
        self.selection.read().await.room
    }

    /// Whether a stamp taken earlier still describes the active selection
    pub async fn is_current(&self, stamp: Selection) -> bool {
        *self.selection.read().await == stamp
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.credentials.credentials().map(|c| c.user_id)
    }
}
