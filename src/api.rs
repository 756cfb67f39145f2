//! REST contract consumed from the chat backend, and the credentials seam.

use crate::types::{Member, Message, MessageId, PharmacyId, Result, Room, RoomId, UserId};
use async_trait::async_trait;

/// Cursor for one page of room history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryQuery {
    /// Only messages strictly older than this one
    pub before: Option<MessageId>,
    pub limit: usize,
}

impl HistoryQuery {
    pub fn latest(limit: usize) -> Self {
        Self {
            before: None,
            limit,
        }
    }

    pub fn before(id: MessageId, limit: usize) -> Self {
        Self {
            before: Some(id),
            limit,
        }
    }
}

/// Backend REST operations used by the chat session.
///
/// Implemented over HTTP by [`HttpChatApi`](crate::infrastructure::HttpChatApi);
/// tests substitute in-memory implementations.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// All rooms visible to the caller.
    async fn list_rooms(&self) -> Result<Vec<Room>>;

    /// One page of history, newest first.
    async fn fetch_messages(&self, room: RoomId, query: HistoryQuery) -> Result<Vec<Message>>;

    /// Post a message. Delivery is confirmed by the socket broadcast, not by this reply.
    async fn post_message(&self, room: RoomId, body: &str) -> Result<()>;

    async fn mark_read(&self, room: RoomId) -> Result<()>;

    /// Idempotent: returns the existing group room when there is one.
    async fn get_or_create_group_room(&self, pharmacy: PharmacyId) -> Result<Room>;

    async fn start_direct_message(&self, pharmacy: PharmacyId, partner: UserId) -> Result<Room>;

    /// Memberships of a pharmacy with user display fields.
    async fn list_members(&self, pharmacy: PharmacyId) -> Result<Vec<Member>>;
}

/// Credentials of the signed-in user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_token: String,
    pub user_id: UserId,
}

/// Supplies the current credentials on demand, so token refreshes are picked up
/// by the next request or socket connect.
pub trait CredentialsProvider: Send + Sync {
    fn credentials(&self) -> Option<Credentials>;
}

/// Fixed credentials, for tools and tests.
#[derive(Debug, Clone)]
pub struct StaticCredentials(pub Credentials);

impl StaticCredentials {
    pub fn new(access_token: impl Into<String>, user_id: UserId) -> Self {
        Self(Credentials {
            access_token: access_token.into(),
            user_id,
        })
    }
}

impl CredentialsProvider for StaticCredentials {
    fn credentials(&self) -> Option<Credentials> {
        Some(self.0.clone())
    }
}
