use super::constants::PREVIEW_MAX_CHARS;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type RoomId = u64;
pub type MessageId = u64;
pub type PharmacyId = u64;
pub type UserId = u64;

/// A user's identity scoped to one pharmacy. Message senders are memberships.
pub type MembershipId = u64;

/// Conversation kind as reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum RoomKind {
    /// Pharmacy-wide group room
    #[serde(rename = "GROUP")]
    Group,

    /// Two-party direct message room within a pharmacy
    #[serde(rename = "DM")]
    Direct,

    /// Room synthesized from partial data (e.g. a badge event)
    #[default]
    #[serde(other)]
    Unknown,
}

/// Summary of the latest message in a room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LastMessage {
    #[serde(default)]
    pub sender: Option<MembershipId>,
    #[serde(default)]
    pub sender_name: Option<String>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl LastMessage {
    pub fn from_message(message: &Message, sender_name: Option<String>) -> Self {
        Self {
            sender: Some(message.sender),
            sender_name,
            body: preview(&message.body),
            created_at: Some(message.created_at),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    #[serde(rename = "type", default)]
    pub kind: RoomKind,
    #[serde(default)]
    pub pharmacy: Option<PharmacyId>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub last_message: Option<LastMessage>,
    #[serde(default)]
    pub unread_count: u32,
    #[serde(default)]
    pub participant_ids: Vec<MembershipId>,
}

impl Room {
    /// A room known only by its identifier.
    pub fn placeholder(id: RoomId) -> Self {
        Self {
            id,
            kind: RoomKind::Unknown,
            pharmacy: None,
            title: String::new(),
            last_message: None,
            unread_count: 0,
            participant_ids: Vec::new(),
        }
    }

    pub fn is_direct(&self) -> bool {
        self.kind == RoomKind::Direct
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    /// Owning room; absent when the frame is implicitly scoped to the socket's room
    #[serde(default, alias = "conversation_id", skip_serializing_if = "Option::is_none")]
    pub conversation: Option<RoomId>,
    pub sender: MembershipId,
    #[serde(default)]
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Display ordering key: creation time, ties broken by identifier.
    pub fn order_key(&self) -> (DateTime<Utc>, MessageId) {
        (self.created_at, self.id)
    }
}

/// A pharmacy membership with the user display fields attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    #[serde(rename = "id")]
    pub membership_id: MembershipId,
    #[serde(alias = "user")]
    pub user_id: UserId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl Member {
    pub fn display_name(&self) -> String {
        if !self.name.trim().is_empty() {
            self.name.trim().to_string()
        } else if !self.email.is_empty() {
            self.email.clone()
        } else {
            fallback_member_name(self.membership_id)
        }
    }
}

pub(crate) fn fallback_member_name(id: MembershipId) -> String {
    format!("Member #{}", id)
}

/// Truncate a message body into a single-line preview.
pub fn preview(body: &str) -> String {
    let line = body.lines().next().unwrap_or_default();
    let mut out: String = line.chars().take(PREVIEW_MAX_CHARS).collect();
    if line.chars().count() > PREVIEW_MAX_CHARS || body.lines().nth(1).is_some() {
        out.push('…');
    }
    out
}
