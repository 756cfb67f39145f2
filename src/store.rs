//! Per-room ordered message logs.
//!
//! Every insertion goes through the same dedupe-by-identifier path, so history
//! pages, socket broadcasts and refetches may overlap in any order.

use crate::types::{Message, MessageId, RoomId};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
struct RoomLog {
    /// Oldest first, ordered by `(created_at, id)`
    messages: Vec<Message>,
    ids: HashSet<MessageId>,
    loaded: bool,
    has_more: bool,
}

impl RoomLog {
    fn insert(&mut self, message: Message) -> bool {
        if !self.ids.insert(message.id) {
            return false;
        }

        let key = message.order_key();
        let out_of_order = self
            .messages
            .last()
            .is_some_and(|last| last.order_key() > key);
        if out_of_order {
            let at = self.messages.partition_point(|m| m.order_key() <= key);
            self.messages.insert(at, message);
        } else {
            self.messages.push(message);
        }
        true
    }

    /// Merge a newest-first page. Returns how many messages were new.
    fn merge_page(&mut self, newest_first: Vec<Message>, page_size: usize) -> usize {
        let fetched = newest_first.len();
        let mut added = 0;
        for message in newest_first.into_iter().rev() {
            if self.insert(message) {
                added += 1;
            }
        }
        self.has_more = page_size > 0 && fetched >= page_size;
        added
    }
}

#[derive(Debug, Default)]
pub struct MessageStore {
    rooms: HashMap<RoomId, RoomLog>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a message unless its identifier is already present.
    /// Returns `true` when the message was new.
    pub fn append_incoming(&mut self, room: RoomId, message: Message) -> bool {
        self.rooms.entry(room).or_default().insert(message)
    }

    /// Seed a room from its latest history page (newest first) and mark it loaded.
    pub fn seed_history(
        &mut self,
        room: RoomId,
        newest_first: Vec<Message>,
        page_size: usize,
    ) -> usize {
        let log = self.rooms.entry(room).or_default();
        let added = log.merge_page(newest_first, page_size);
        log.loaded = true;
        added
    }

    /// Merge an older history page (newest first).
    pub fn merge_older(
        &mut self,
        room: RoomId,
        newest_first: Vec<Message>,
        page_size: usize,
    ) -> usize {
        self.rooms
            .entry(room)
            .or_default()
            .merge_page(newest_first, page_size)
    }

    pub fn is_loaded(&self, room: RoomId) -> bool {
        self.rooms.get(&room).is_some_and(|log| log.loaded)
    }

    /// Whether older history may exist beyond the loaded pages
    pub fn has_more(&self, room: RoomId) -> bool {
        self.rooms.get(&room).is_some_and(|log| log.has_more)
    }

    pub fn oldest_id(&self, room: RoomId) -> Option<MessageId> {
        self.rooms
            .get(&room)
            .and_then(|log| log.messages.first())
            .map(|message| message.id)
    }

    pub fn messages(&self, room: RoomId) -> &[Message] {
        self.rooms
            .get(&room)
            .map(|log| log.messages.as_slice())
            .unwrap_or(&[])
    }

    /// Force the next history load for the room to refetch.
    pub fn invalidate(&mut self, room: RoomId) {
        if let Some(log) = self.rooms.get_mut(&room) {
            log.loaded = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn msg(id: MessageId, secs: i64) -> Message {
        Message {
            id,
            conversation: None,
            sender: 7,
            body: format!("m{}", id),
            created_at: Utc.timestamp_opt(1_767_225_600 + secs, 0).unwrap(),
        }
    }

    fn ids(store: &MessageStore, room: RoomId) -> Vec<MessageId> {
        store.messages(room).iter().map(|m| m.id).collect()
    }

    #[test]
    fn duplicate_append_keeps_one_copy() {
        let mut store = MessageStore::new();
        assert!(store.append_incoming(42, msg(901, 10)));
        assert!(!store.append_incoming(42, msg(901, 10)));
        assert_eq!(ids(&store, 42), vec![901]);
    }

    #[test]
    fn late_message_lands_at_its_timestamp() {
        let mut store = MessageStore::new();
        store.append_incoming(1, msg(1, 0));
        store.append_incoming(1, msg(3, 30));
        store.append_incoming(1, msg(2, 20));
        assert_eq!(ids(&store, 1), vec![1, 2, 3]);
    }

    #[test]
    fn history_is_reversed_and_merged_with_socket_copies() {
        let mut store = MessageStore::new();
        // broadcast arrived before the history fetch resolved
        store.append_incoming(1, msg(3, 30));

        let added = store.seed_history(1, vec![msg(3, 30), msg(2, 20), msg(1, 10)], 50);
        assert_eq!(added, 2);
        assert_eq!(ids(&store, 1), vec![1, 2, 3]);
        assert!(store.is_loaded(1));
        assert!(!store.has_more(1));
    }

    #[test]
    fn older_pages_prepend_and_track_more() {
        let mut store = MessageStore::new();
        store.seed_history(1, vec![msg(4, 40), msg(3, 30)], 2);
        assert!(store.has_more(1));
        assert_eq!(store.oldest_id(1), Some(3));

        store.merge_older(1, vec![msg(2, 20)], 2);
        assert_eq!(ids(&store, 1), vec![2, 3, 4]);
        assert!(!store.has_more(1));
    }

    #[test]
    fn invalidate_keeps_messages_but_clears_loaded() {
        let mut store = MessageStore::new();
        store.seed_history(1, vec![msg(1, 10)], 50);
        store.invalidate(1);
        assert!(!store.is_loaded(1));
        assert_eq!(ids(&store, 1), vec![1]);
    }

    #[test]
    fn rooms_are_independent() {
        let mut store = MessageStore::new();
        store.append_incoming(1, msg(1, 10));
        assert!(store.messages(2).is_empty());
        assert!(store.append_incoming(2, msg(1, 10)));
    }
}
