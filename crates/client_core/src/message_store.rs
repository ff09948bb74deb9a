use std::collections::HashMap;

use shared::domain::{ChatId, Message, MessageId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingest {
    Inserted,
    Duplicate,
    /// The message belongs to a chat other than the one this store holds.
    Foreign,
}

#[derive(Debug, Default)]
pub struct MessageStore {
    chat_id: Option<ChatId>,
    loaded: bool,
    by_id: HashMap<MessageId, Message>,
    /// Ids in ascending order; server ids are monotonic so this is also time order.
    order: Vec<MessageId>,
}

impl MessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chat_id(&self) -> Option<ChatId> {
        self.chat_id
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Switches the store to `chat_id`, discarding the previous chat's log.
    pub fn open(&mut self, chat_id: ChatId) {
        self.chat_id = Some(chat_id);
        self.loaded = false;
        self.by_id.clear();
        self.order.clear();
    }

    pub fn close(&mut self) {
        self.chat_id = None;
        self.loaded = false;
        self.by_id.clear();
        self.order.clear();
    }

    pub fn ingest(&mut self, message: Message) -> Ingest {
        if self.chat_id != Some(message.chat_id) {
            return Ingest::Foreign;
        }
        if self.by_id.contains_key(&message.id) {
            return Ingest::Duplicate;
        }
        let position = self.order.partition_point(|id| *id < message.id);
        self.order.insert(position, message.id);
        self.by_id.insert(message.id, message);
        Ingest::Inserted
    }

    pub fn append_live(&mut self, message: Message) -> Ingest {
        self.ingest(message)
    }

    /// Replaces local state for `chat_id` with a freshly pulled snapshot.
    ///
    /// Live messages newer than everything in the snapshot were received while
    /// the pull was in flight and are kept. Returns how many were kept.
    pub fn replace_with_snapshot(&mut self, chat_id: ChatId, messages: Vec<Message>) -> usize {
        let newest_in_snapshot = messages.iter().map(|m| m.id).max();
        let retained: Vec<Message> = if self.chat_id == Some(chat_id) {
            self.order
                .iter()
                .filter(|id| newest_in_snapshot.map_or(true, |newest| **id > newest))
                .filter_map(|id| self.by_id.get(id).cloned())
                .collect()
        } else {
            Vec::new()
        };
        let kept = retained.len();

        self.open(chat_id);
        for message in messages.into_iter().chain(retained) {
            if message.chat_id == chat_id {
                self.ingest(message);
            }
        }
        self.loaded = true;
        kept
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.by_id.get(&id)
    }

    pub fn get_mut(&mut self, id: MessageId) -> Option<&mut Message> {
        self.by_id.get_mut(&id)
    }

    pub fn contains(&self, id: MessageId) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> + '_ {
        self.order.iter().filter_map(|id| self.by_id.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
#[path = "tests/message_store_tests.rs"]
mod tests;
