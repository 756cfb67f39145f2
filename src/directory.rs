//! Room directory: the rooms the caller participates in, with previews and
//! unread counters.
//!
//! The total unread count is recomputed after every mutation and published
//! through a [`watch`] channel so badges elsewhere in the application follow it.

use crate::messaging::BadgeEvent;
use crate::types::{LastMessage, Message, PharmacyId, Room, RoomId, RoomKind};
use std::collections::HashMap;
use tokio::sync::watch;

pub struct RoomDirectory {
    rooms: HashMap<RoomId, Room>,
    group_by_pharmacy: HashMap<PharmacyId, RoomId>,
    total_tx: watch::Sender<u32>,
    load_error: Option<String>,
}

impl RoomDirectory {
    pub fn new() -> Self {
        let (total_tx, _) = watch::channel(0);
        Self {
            rooms: HashMap::new(),
            group_by_pharmacy: HashMap::new(),
            total_tx,
            load_error: None,
        }
    }

    /// Replace the directory with a fresh REST listing.
    ///
    /// Backend unread counts are authoritative and overwrite local optimistic
    /// values. Rooms known only locally (synthesized from badges) are dropped
    /// unless the listing contains them.
    pub fn replace_all(&mut self, rooms: Vec<Room>) {
        self.rooms.clear();
        self.group_by_pharmacy.clear();
        for room in rooms {
            self.insert(room);
        }
        self.load_error = None;
        self.recompute();
    }

    /// Insert or update one room record.
    pub fn upsert(&mut self, room: Room) {
        self.insert(room);
        self.recompute();
    }

    fn insert(&mut self, room: Room) {
        if room.kind == RoomKind::Group
            && let Some(pharmacy) = room.pharmacy
        {
            self.group_by_pharmacy.insert(pharmacy, room.id);
        }
        self.rooms.insert(room.id, room);
    }

    pub fn room(&self, id: RoomId) -> Option<&Room> {
        self.rooms.get(&id)
    }

    pub fn contains(&self, id: RoomId) -> bool {
        self.rooms.contains_key(&id)
    }

    pub fn group_room(&self, pharmacy: PharmacyId) -> Option<&Room> {
        self.group_by_pharmacy
            .get(&pharmacy)
            .and_then(|id| self.rooms.get(id))
    }

    /// All rooms, most recent activity first.
    pub fn rooms(&self) -> Vec<Room> {
        let mut rooms: Vec<Room> = self.rooms.values().cloned().collect();
        rooms.sort_by(|a, b| {
            let a_at = a.last_message.as_ref().and_then(|m| m.created_at);
            let b_at = b.last_message.as_ref().and_then(|m| m.created_at);
            b_at.cmp(&a_at).then(a.id.cmp(&b.id))
        });
        rooms
    }

    pub fn rooms_of_kind(&self, kind: RoomKind) -> Vec<Room> {
        self.rooms()
            .into_iter()
            .filter(|room| room.kind == kind)
            .collect()
    }

    /// Zero a room's unread counter. Returns the previous value.
    pub fn zero_unread(&mut self, id: RoomId) -> Option<u32> {
        let previous = self
            .rooms
            .get_mut(&id)
            .map(|room| std::mem::replace(&mut room.unread_count, 0));
        self.recompute();
        previous
    }

    /// Put back an unread count zeroed optimistically, unless the counter has
    /// moved since.
    pub fn restore_unread(&mut self, id: RoomId, count: u32) {
        if let Some(room) = self.rooms.get_mut(&id)
            && room.unread_count == 0
        {
            room.unread_count = count;
        }
        self.recompute();
    }

    /// Apply a badge notification, synthesizing the room if it is unknown.
    ///
    /// For the room currently open on screen the counter stays at zero.
    pub fn apply_badge(&mut self, badge: &BadgeEvent, is_active: bool) {
        let room = self
            .rooms
            .entry(badge.conversation_id)
            .or_insert_with(|| {
                tracing::debug!(
                    "Synthesizing room {} from badge event",
                    badge.conversation_id
                );
                let mut room = Room::placeholder(badge.conversation_id);
                room.pharmacy = badge.pharmacy;
                room
            });

        if room.title.is_empty()
            && let Some(title) = badge.title.as_ref().or(badge.sender_name.as_ref())
        {
            room.title = title.clone();
        }

        if badge.body_preview.is_some() || badge.sender_name.is_some() {
            room.last_message = Some(LastMessage {
                sender: badge.sender,
                sender_name: badge.sender_name.clone(),
                body: badge.body_preview.clone().unwrap_or_default(),
                created_at: badge.created_at,
            });
        }

        room.unread_count = if is_active {
            0
        } else {
            badge
                .unread
                .unwrap_or_else(|| room.unread_count.saturating_add(1))
        };

        self.recompute();
    }

    /// Record a newly delivered message in the room's preview.
    ///
    /// `counts_as_unread` bumps the counter by one (message from someone else in
    /// a room that is not open).
    pub fn record_message(
        &mut self,
        id: RoomId,
        message: &Message,
        sender_name: Option<String>,
        counts_as_unread: bool,
    ) {
        let room = self
            .rooms
            .entry(id)
            .or_insert_with(|| Room::placeholder(id));

        let is_newer = room
            .last_message
            .as_ref()
            .and_then(|last| last.created_at)
            .is_none_or(|at| at <= message.created_at);
        if is_newer {
            room.last_message = Some(LastMessage::from_message(message, sender_name));
        }
        if counts_as_unread {
            room.unread_count = room.unread_count.saturating_add(1);
        }
        self.recompute();
    }

    pub fn total_unread(&self) -> u32 {
        *self.total_tx.borrow()
    }

    /// Receiver that observes every change of the total unread count.
    pub fn watch_total_unread(&self) -> watch::Receiver<u32> {
        self.total_tx.subscribe()
    }

    pub fn set_load_error(&mut self, error: impl Into<String>) {
        self.load_error = Some(error.into());
    }

    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    fn recompute(&self) {
        let total = self
            .rooms
            .values()
            .fold(0u32, |acc, room| acc.saturating_add(room.unread_count));
        self.total_tx.send_if_modified(|current| {
            let changed = *current != total;
            *current = total;
            changed
        });
    }
}

impl Default for RoomDirectory {
    fn default() -> Self {
        Self::new()
    }
}
