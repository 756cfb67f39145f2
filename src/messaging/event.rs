use crate::types::constants::{EVENT_TAG_FIELD, socket_events};
use crate::types::{MembershipId, Message, PharmacyId, Result, RoomId};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

/// Tag of an incoming socket frame
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SocketEventKind {
    Ready,
    MessageCreated,
    MessageRead,
    MessageBadge,
    /// Any tag this client does not understand
    Other(String),
}

impl SocketEventKind {
    /// Parse a frame tag into a SocketEventKind
    pub fn from_tag(s: &str) -> Self {
        match s {
            socket_events::READY => Self::Ready,
            socket_events::MESSAGE_CREATED => Self::MessageCreated,
            // older backends acknowledge reads with these tags
            socket_events::MESSAGE_READ | "room.read" | "read" => Self::MessageRead,
            socket_events::MESSAGE_BADGE => Self::MessageBadge,
            _ => Self::Other(s.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Ready => socket_events::READY,
            Self::MessageCreated => socket_events::MESSAGE_CREATED,
            Self::MessageRead => socket_events::MESSAGE_READ,
            Self::MessageBadge => socket_events::MESSAGE_BADGE,
            Self::Other(s) => s,
        }
    }
}

impl std::fmt::Display for SocketEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payload of a `message.badge` frame: just enough to bump a counter
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BadgeEvent {
    #[serde(alias = "room_id")]
    pub conversation_id: RoomId,
    #[serde(default)]
    pub unread: Option<u32>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub pharmacy: Option<PharmacyId>,
    #[serde(default)]
    pub sender: Option<MembershipId>,
    #[serde(default)]
    pub sender_name: Option<String>,
    #[serde(default)]
    pub body_preview: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// A parsed socket frame
#[derive(Debug, Clone, PartialEq)]
pub enum SocketEvent {
    /// Binds the caller's own membership id for the room
    Ready { membership_id: MembershipId },
    MessageCreated(Message),
    /// Room was read (possibly from another device)
    MessageRead { room: Option<RoomId> },
    MessageBadge(BadgeEvent),
    /// Unrecognized tag; ignored by the router
    Unknown(String),
}

#[derive(Deserialize)]
struct ReadyPayload {
    #[serde(alias = "membership")]
    membership_id: MembershipId,
}

#[derive(Deserialize)]
struct CreatedPayload {
    message: Message,
}

#[derive(Deserialize)]
struct ReadPayload {
    #[serde(default, alias = "room_id")]
    conversation_id: Option<RoomId>,
}

impl SocketEvent {
    /// Parse a raw text frame.
    ///
    /// Frames without a string `type` field and frames whose tag is not
    /// recognized become [`SocketEvent::Unknown`]. A recognized tag with a
    /// malformed body is an error.
    pub fn parse(text: &str) -> Result<Self> {
        let frame: Value = serde_json::from_str(text)?;
        let Some(tag) = frame.get(EVENT_TAG_FIELD).and_then(Value::as_str) else {
            return Ok(Self::Unknown(String::new()));
        };

        let event = match SocketEventKind::from_tag(tag) {
            SocketEventKind::Ready => {
                let payload: ReadyPayload = serde_json::from_value(frame)?;
                Self::Ready {
                    membership_id: payload.membership_id,
                }
            }
            SocketEventKind::MessageCreated => {
                let payload: CreatedPayload = serde_json::from_value(frame)?;
                Self::MessageCreated(payload.message)
            }
            SocketEventKind::MessageRead => {
                let payload: ReadPayload = serde_json::from_value(frame)?;
                Self::MessageRead {
                    room: payload.conversation_id,
                }
            }
            SocketEventKind::MessageBadge => Self::MessageBadge(serde_json::from_value(frame)?),
            SocketEventKind::Other(tag) => Self::Unknown(tag),
        };
        Ok(event)
    }

    pub fn kind(&self) -> SocketEventKind {
        match self {
            Self::Ready { .. } => SocketEventKind::Ready,
            Self::MessageCreated(_) => SocketEventKind::MessageCreated,
            Self::MessageRead { .. } => SocketEventKind::MessageRead,
            Self::MessageBadge(_) => SocketEventKind::MessageBadge,
            Self::Unknown(tag) => SocketEventKind::Other(tag.clone()),
        }
    }
}
