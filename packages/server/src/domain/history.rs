//! Bounded recent-message history replayed to newly joined sessions.

use std::collections::VecDeque;

use super::Message;

/// Bounded FIFO of the most recent Chat / System messages.
///
/// Once `capacity` is reached, appending drops the oldest entry. Control messages are
/// never stored.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    capacity: usize,
    entries: VecDeque<Message>,
}

impl HistoryBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a message. Returns `false` (and stores nothing) for Control messages.
    pub fn append(&mut self, message: Message) -> bool {
        if !message.is_broadcastable() {
            return false;
        }
        if self.capacity == 0 {
            return true;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(message);
        true
    }

    /// Entries oldest first.
    pub fn snapshot(&self) -> Vec<Message> {
        self.entries.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
