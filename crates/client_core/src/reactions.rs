use serde::Deserialize;
use shared::{
    domain::{ChatId, MessageId, ReactionEntry, ReactionSet, User, UserId},
    protocol::ClientRequest,
};

use crate::message_store::MessageStore;

/// Quick-reaction palette offered by the picker.
pub const QUICK_REACTIONS: [&str; 5] = ["👍", "❤️", "😂", "😮", "😢"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionPolicy {
    /// One emoji per user per message; a new emoji replaces the old one.
    #[default]
    SinglePerUser,
    /// A user may hold several distinct emoji on one message.
    MultiPerUser,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionOutcome {
    Applied,
    Unchanged,
    UnknownMessage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionSummary {
    pub emoji: String,
    pub count: usize,
    pub reacted_by_viewer: bool,
    pub usernames: Vec<String>,
}

/// Adds `user`'s `emoji` to `set`. Returns whether anything changed.
pub fn apply_add(set: &mut ReactionSet, emoji: &str, user: &User, policy: ReactionPolicy) -> bool {
    let already_held = set
        .get(emoji)
        .is_some_and(|entries| entries.iter().any(|e| e.user_id == user.id));
    if already_held && policy == ReactionPolicy::MultiPerUser {
        return false;
    }

    let mut changed = false;
    if policy == ReactionPolicy::SinglePerUser {
        let held_elsewhere = set
            .iter()
            .any(|(key, entries)| key != emoji && entries.iter().any(|e| e.user_id == user.id));
        if already_held && !held_elsewhere {
            return false;
        }
        changed |= remove_user_except(set, user.id, Some(emoji));
        if already_held {
            return changed;
        }
    }

    set.entry(emoji.to_string())
        .or_default()
        .push(ReactionEntry {
            user_id: user.id,
            username: user.username.clone(),
        });
    true
}

/// Clears every emoji `user_id` holds in `set`. Removing nothing is a no-op.
pub fn apply_remove(set: &mut ReactionSet, user_id: UserId) -> bool {
    remove_user_except(set, user_id, None)
}

fn remove_user_except(set: &mut ReactionSet, user_id: UserId, keep: Option<&str>) -> bool {
    let mut changed = false;
    set.retain(|emoji, entries| {
        if Some(emoji.as_str()) != keep {
            let before = entries.len();
            entries.retain(|e| e.user_id != user_id);
            changed |= entries.len() != before;
        }
        !entries.is_empty()
    });
    changed
}

pub fn summarize(set: &ReactionSet, viewer: UserId) -> Vec<ReactionSummary> {
    set.iter()
        .filter(|(_, entries)| !entries.is_empty())
        .map(|(emoji, entries)| ReactionSummary {
            emoji: emoji.clone(),
            count: entries.len(),
            reacted_by_viewer: entries.iter().any(|e| e.user_id == viewer),
            usernames: entries.iter().map(|e| e.username.clone()).collect(),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReactionAggregator {
    policy: ReactionPolicy,
}

impl ReactionAggregator {
    pub fn new(policy: ReactionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> ReactionPolicy {
        self.policy
    }

    pub fn apply_add(
        &self,
        store: &mut MessageStore,
        message_id: MessageId,
        emoji: &str,
        user: &User,
    ) -> ReactionOutcome {
        let Some(message) = store.get_mut(message_id) else {
            return ReactionOutcome::UnknownMessage;
        };
        if apply_add(&mut message.reactions, emoji, user, self.policy) {
            ReactionOutcome::Applied
        } else {
            ReactionOutcome::Unchanged
        }
    }

    pub fn apply_remove(
        &self,
        store: &mut MessageStore,
        message_id: MessageId,
        user_id: UserId,
    ) -> ReactionOutcome {
        let Some(message) = store.get_mut(message_id) else {
            return ReactionOutcome::UnknownMessage;
        };
        if apply_remove(&mut message.reactions, user_id) {
            ReactionOutcome::Applied
        } else {
            ReactionOutcome::Unchanged
        }
    }

    /// Outbound request for clicking `emoji` on a message: removes the
    /// viewer's reaction when they already hold that emoji, adds it otherwise.
    pub fn toggle_request(
        &self,
        store: &MessageStore,
        chat_id: ChatId,
        message_id: MessageId,
        emoji: &str,
        viewer: UserId,
    ) -> Option<ClientRequest> {
        let message = store.get(message_id)?;
        let held = message
            .reactions
            .get(emoji)
            .is_some_and(|entries| entries.iter().any(|e| e.user_id == viewer));
        Some(if held {
            ClientRequest::RemoveReaction {
                message_id,
                user_id: viewer,
                chat_id,
            }
        } else {
            ClientRequest::AddReaction {
                message_id,
                user_id: viewer,
                emoji: emoji.to_string(),
                chat_id,
            }
        })
    }
}

#[cfg(test)]
#[path = "tests/reactions_tests.rs"]
mod tests;
