use std::collections::HashMap;

use shared::{domain::ChatId, protocol::ChatSummary};
use tracing::debug;

#[derive(Debug, Default)]
pub struct ReadTracker {
    chats: Vec<ChatSummary>,
    issued_generation: u64,
    applied_generation: u64,
    /// Latest issued list generation at the moment each chat was marked read.
    read_marks: HashMap<ChatId, u64>,
}

impl ReadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves the generation for a chat-list pull about to be issued.
    pub fn begin_list_fetch(&mut self) -> u64 {
        self.issued_generation += 1;
        self.issued_generation
    }

    /// Applies a pulled chat list. Returns false for a response older than
    /// one already applied.
    pub fn apply_chat_list(&mut self, generation: u64, mut chats: Vec<ChatSummary>) -> bool {
        if generation < self.applied_generation {
            debug!(generation, applied = self.applied_generation, "dropping stale chat list");
            return false;
        }
        self.applied_generation = generation;

        for chat in &mut chats {
            if self
                .read_marks
                .get(&chat.id)
                .is_some_and(|marked_at| generation <= *marked_at)
            {
                chat.unread_count = 0;
            }
        }
        self.read_marks
            .retain(|_, marked_at| *marked_at >= generation);
        self.chats = chats;
        true
    }

    pub fn mark_read_succeeded(&mut self, chat_id: ChatId) {
        self.read_marks.insert(chat_id, self.issued_generation);
        if let Some(chat) = self.chats.iter_mut().find(|c| c.id == chat_id) {
            chat.unread_count = 0;
        }
    }

    pub fn chats(&self) -> &[ChatSummary] {
        &self.chats
    }

    pub fn chat(&self, chat_id: ChatId) -> Option<&ChatSummary> {
        self.chats.iter().find(|c| c.id == chat_id)
    }

    pub fn unread(&self, chat_id: ChatId) -> Option<u32> {
        self.chat(chat_id).map(|c| c.unread_count)
    }

    pub fn clear(&mut self) {
        self.chats.clear();
        self.read_marks.clear();
    }
}

#[cfg(test)]
mod tests {
    use shared::domain::ChatKind;

    use super::*;

    fn chat(id: i64, unread: u32) -> ChatSummary {
        ChatSummary {
            id: ChatId(id),
            name: None,
            kind: ChatKind::Direct,
            members: vec!["alice".into(), "bob".into()],
            unread_count: unread,
        }
    }

    #[test]
    fn mark_read_zeroes_only_that_chat() {
        let mut tracker = ReadTracker::new();
        let generation = tracker.begin_list_fetch();
        tracker.apply_chat_list(generation, vec![chat(1, 3), chat(2, 5)]);

        tracker.mark_read_succeeded(ChatId(1));
        assert_eq!(tracker.unread(ChatId(1)), Some(0));
        assert_eq!(tracker.unread(ChatId(2)), Some(5));
    }

    #[test]
    fn list_pulled_before_mark_read_cannot_resurrect_count() {
        let mut tracker = ReadTracker::new();
        let first = tracker.begin_list_fetch();
        tracker.apply_chat_list(first, vec![chat(1, 3)]);

        let in_flight = tracker.begin_list_fetch();
        tracker.mark_read_succeeded(ChatId(1));
        tracker.apply_chat_list(in_flight, vec![chat(1, 3)]);
        assert_eq!(tracker.unread(ChatId(1)), Some(0));

        let fresh = tracker.begin_list_fetch();
        tracker.apply_chat_list(fresh, vec![chat(1, 1)]);
        assert_eq!(tracker.unread(ChatId(1)), Some(1));
    }

    #[test]
    fn out_of_order_list_responses_are_dropped() {
        let mut tracker = ReadTracker::new();
        let older = tracker.begin_list_fetch();
        let newer = tracker.begin_list_fetch();
        assert!(tracker.apply_chat_list(newer, vec![chat(1, 4)]));
        assert!(!tracker.apply_chat_list(older, vec![chat(1, 2)]));
        assert_eq!(tracker.unread(ChatId(1)), Some(4));
    }
}
