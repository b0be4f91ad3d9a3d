use std::collections::{HashSet, VecDeque};

use crate::buffer::message::ChatMessage;

/// Fixed-capacity, insertion-ordered, deduplicated message store.
///
/// `ids` always holds exactly the ids of the messages in `messages`.
/// Duplicates are only suppressed while the original is resident: an id
/// that was evicted and shows up again is accepted as a new message.
#[derive(Debug)]
pub struct RollingBuffer {
    capacity: usize,
    messages: VecDeque<ChatMessage>,
    ids: HashSet<String>,
}

impl RollingBuffer {
    /// Creates an empty buffer. A capacity of zero is clamped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            messages: VecDeque::with_capacity(capacity),
            ids: HashSet::with_capacity(capacity),
        }
    }

    /// Adds a message unless its id is already resident.
    ///
    /// Returns `true` when the message was accepted. When the buffer is full
    /// the oldest resident message is evicted first.
    pub fn add(&mut self, id: &str, timestamp_ms: i64, author: &str, text: &str) -> bool {
        if self.ids.contains(id) {
            return false;
        }

        if self.messages.len() >= self.capacity {
            if let Some(oldest) = self.messages.pop_front() {
                self.ids.remove(&oldest.id);
            }
        }

        self.messages
            .push_back(ChatMessage::new(id, timestamp_ms, author, text));
        self.ids.insert(id.to_string());
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Resident messages, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter()
    }

    /// Number of ids tracked for deduplication. Always equal to `len()`.
    pub fn tracked_ids(&self) -> usize {
        self.ids.len()
    }
}
