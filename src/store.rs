use crate::model::{Message, MessageId};
use std::collections::HashSet;

/// Ordered, deduplicated client-side buffer of messages for the active room.
///
/// Display order is creation order, not arrival order: a message that arrives
/// late is inserted at its correct `(created_at, id)` position, never blindly
/// appended to the tail. All merge paths are keyed by id, so overlapping
/// deliveries from the poller and the send command can never duplicate an
/// entry.
#[derive(Debug)]
pub struct MessageStore {
    messages: Vec<Message>,
    ids: HashSet<MessageId>,
    has_more_older: bool,
    page_size: usize,
}

impl MessageStore {
    pub fn new(page_size: usize) -> Self {
        Self {
            messages: Vec::new(),
            ids: HashSet::new(),
            has_more_older: true,
            page_size: page_size.max(1),
        }
    }

    /// Replace the contents with an initial fetch, sorted ascending.
    pub fn hydrate(&mut self, initial: Vec<Message>) {
        self.messages.clear();
        self.ids.clear();
        self.has_more_older = true;
        for msg in initial {
            if self.ids.insert(msg.id) {
                self.insert_sorted(msg);
            }
        }
    }

    /// Merge newly observed messages, skipping any id already present.
    /// Returns the messages actually added, in ascending order, for UI-level
    /// new-message effects. Idempotent: overlapping calls never duplicate.
    pub fn append_new(&mut self, incoming: Vec<Message>) -> Vec<Message> {
        let mut added = Vec::new();
        for msg in incoming {
            if self.ids.insert(msg.id) {
                self.insert_sorted(msg.clone());
                added.push(msg);
            }
        }
        added.sort_by_key(Message::sort_key);
        added
    }

    /// Merge an older history page at the head. The page is presence-filtered
    /// like `append_new` (the poller may already have observed an entry) and
    /// sorted into place. Exhaustion is judged on the raw page length, before
    /// dedup filtering.
    pub fn prepend_older(&mut self, page: &[Message]) {
        self.has_more_older = page.len() >= self.page_size;
        for msg in page {
            if self.ids.insert(msg.id) {
                self.insert_sorted(msg.clone());
            }
        }
    }

    /// Drop everything. Called on room switch; there is no cross-room cache.
    pub fn reset(&mut self) {
        self.messages.clear();
        self.ids.clear();
        self.has_more_older = true;
    }

    fn insert_sorted(&mut self, msg: Message) {
        let key = msg.sort_key();
        let idx = self.messages.partition_point(|m| m.sort_key() <= key);
        self.messages.insert(idx, msg);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn contains(&self, id: MessageId) -> bool {
        self.ids.contains(&id)
    }

    /// Sync cursor: the id of the newest known message. Derived from the tail
    /// on demand so additions through any path move the cursor.
    pub fn last_id(&self) -> Option<MessageId> {
        self.messages.last().map(|m| m.id)
    }

    pub fn has_more_older(&self) -> bool {
        self.has_more_older
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Author;

    fn msg(id: u64, created_at: i64) -> Message {
        Message {
            id: MessageId(id),
            room_id: "global".to_string(),
            author: Author {
                id: format!("user_{}", id),
                display_name: "Someone".to_string(),
                avatar_url: None,
            },
            body: Some(format!("m{}", id)),
            attachment: None,
            created_at,
        }
    }

    fn ids(store: &MessageStore) -> Vec<u64> {
        store.messages().iter().map(|m| m.id.0).collect()
    }

    #[test]
    fn append_is_idempotent() {
        let mut store = MessageStore::new(10);
        store.hydrate(vec![msg(1, 100), msg(2, 110)]);
        let added = store.append_new(vec![msg(2, 110), msg(3, 120)]);
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].id, MessageId(3));
        assert_eq!(ids(&store), vec![1, 2, 3]);
        // same batch again is a complete no-op
        assert!(store.append_new(vec![msg(2, 110), msg(3, 120)]).is_empty());
        assert_eq!(ids(&store), vec![1, 2, 3]);
    }

    #[test]
    fn late_arrival_inserts_in_creation_order() {
        let mut store = MessageStore::new(10);
        store.hydrate(vec![msg(1, 100), msg(4, 130)]);
        store.append_new(vec![msg(3, 120), msg(2, 110)]);
        assert_eq!(ids(&store), vec![1, 2, 3, 4]);
    }

    #[test]
    fn hydrate_sorts_and_replaces() {
        let mut store = MessageStore::new(10);
        store.hydrate(vec![msg(9, 900)]);
        store.hydrate(vec![msg(3, 120), msg(1, 100), msg(2, 110), msg(2, 110)]);
        assert_eq!(ids(&store), vec![1, 2, 3]);
        assert_eq!(store.last_id(), Some(MessageId(3)));
    }

    #[test]
    fn same_timestamp_orders_by_id() {
        let mut store = MessageStore::new(10);
        store.hydrate(vec![msg(2, 100), msg(1, 100), msg(3, 100)]);
        assert_eq!(ids(&store), vec![1, 2, 3]);
    }

    #[test]
    fn prepend_filters_and_tracks_exhaustion() {
        let mut store = MessageStore::new(2);
        store.hydrate(vec![msg(5, 500), msg(6, 600)]);
        store.prepend_older(&[msg(4, 400), msg(3, 300)]);
        assert_eq!(ids(&store), vec![3, 4, 5, 6]);
        assert!(store.has_more_older());
        // short page, overlapping an already-known id
        store.prepend_older(&[msg(3, 300)]);
        assert_eq!(ids(&store), vec![3, 4, 5, 6]);
        assert!(!store.has_more_older());
    }

    #[test]
    fn zero_length_page_exhausts() {
        let mut store = MessageStore::new(2);
        store.hydrate(vec![msg(1, 100)]);
        store.prepend_older(&[]);
        assert!(!store.has_more_older());
    }

    #[test]
    fn reset_clears_state() {
        let mut store = MessageStore::new(2);
        store.hydrate(vec![msg(1, 100), msg(2, 110)]);
        store.prepend_older(&[]);
        store.reset();
        assert!(store.is_empty());
        assert!(store.has_more_older());
        assert_eq!(store.last_id(), None);
    }
}
