use chrono::NaiveDate;
use shared::domain::{Message, MessageKind};

use super::*;

fn alice() -> User {
    User::new(UserId(1), "alice")
}

fn bob() -> User {
    User::new(UserId(2), "bob")
}

fn store_with_message(chat: i64, id: i64) -> MessageStore {
    let mut store = MessageStore::new();
    store.open(ChatId(chat));
    store.append_live(Message {
        id: MessageId(id),
        chat_id: ChatId(chat),
        author: alice(),
        kind: MessageKind::Text,
        content: Some("hi".into()),
        attachment_ref: None,
        link_preview: None,
        created_at: NaiveDate::from_ymd_opt(2024, 5, 1)
            .and_then(|d| d.and_hms_opt(9, 0, 0))
            .expect("timestamp"),
        reply_ref: None,
        reactions: ReactionSet::new(),
    });
    store
}

fn usernames(set: &ReactionSet, emoji: &str) -> Vec<String> {
    set.get(emoji)
        .map(|entries| entries.iter().map(|e| e.username.clone()).collect())
        .unwrap_or_default()
}

#[test]
fn two_users_on_same_emoji_are_listed_in_arrival_order() {
    let mut store = store_with_message(42, 7);
    let aggregator = ReactionAggregator::default();

    assert_eq!(
        aggregator.apply_add(&mut store, MessageId(7), "👍", &bob()),
        ReactionOutcome::Applied
    );
    assert_eq!(
        aggregator.apply_add(&mut store, MessageId(7), "👍", &alice()),
        ReactionOutcome::Applied
    );

    let reactions = &store.get(MessageId(7)).expect("message").reactions;
    assert_eq!(usernames(reactions, "👍"), vec!["bob", "alice"]);
    assert_eq!(summarize(reactions, UserId(1))[0].count, 2);
}

#[test]
fn removal_only_clears_that_users_entry() {
    let mut store = store_with_message(42, 7);
    let aggregator = ReactionAggregator::default();
    aggregator.apply_add(&mut store, MessageId(7), "👍", &bob());
    aggregator.apply_add(&mut store, MessageId(7), "👍", &alice());

    assert_eq!(
        aggregator.apply_remove(&mut store, MessageId(7), UserId(2)),
        ReactionOutcome::Applied
    );

    let reactions = &store.get(MessageId(7)).expect("message").reactions;
    assert_eq!(usernames(reactions, "👍"), vec!["alice"]);
}

#[test]
fn removing_a_missing_reaction_is_a_no_op() {
    let mut store = store_with_message(42, 7);
    let aggregator = ReactionAggregator::default();
    assert_eq!(
        aggregator.apply_remove(&mut store, MessageId(7), UserId(2)),
        ReactionOutcome::Unchanged
    );
    assert_eq!(
        aggregator.apply_remove(&mut store, MessageId(99), UserId(2)),
        ReactionOutcome::UnknownMessage
    );
}

#[test]
fn repeated_add_does_not_duplicate() {
    let mut set = ReactionSet::new();
    for policy in [ReactionPolicy::SinglePerUser, ReactionPolicy::MultiPerUser] {
        set.clear();
        assert!(apply_add(&mut set, "😂", &bob(), policy));
        assert!(!apply_add(&mut set, "😂", &bob(), policy));
        assert_eq!(usernames(&set, "😂"), vec!["bob"]);
    }
}

#[test]
fn empty_emoji_buckets_are_dropped() {
    let mut set = ReactionSet::new();
    apply_add(&mut set, "😮", &bob(), ReactionPolicy::SinglePerUser);
    apply_remove(&mut set, UserId(2));
    assert!(set.is_empty());
    assert!(summarize(&set, UserId(2)).is_empty());
}

#[derive(Debug, Clone, Copy)]
enum Op {
    Add(&'static str),
    Remove,
}

fn apply(set: &mut ReactionSet, op: Op, policy: ReactionPolicy) {
    match op {
        Op::Add(emoji) => {
            apply_add(set, emoji, &bob(), policy);
        }
        Op::Remove => {
            apply_remove(set, UserId(2));
        }
    }
}

fn sequences(len: usize) -> Vec<Vec<Op>> {
    let alphabet = [Op::Add("👍"), Op::Add("❤️"), Op::Remove];
    let mut out = vec![Vec::new()];
    for _ in 0..len {
        out = out
            .into_iter()
            .flat_map(|seq| {
                alphabet.iter().map(move |op| {
                    let mut next = seq.clone();
                    next.push(*op);
                    next
                })
            })
            .collect();
    }
    out
}

#[test]
fn last_operation_determines_final_state_for_single_reaction_policy() {
    for len in 1..=4 {
        for seq in sequences(len) {
            let mut replayed = ReactionSet::new();
            // A second user's reaction must survive every sequence.
            apply_add(&mut replayed, "👍", &alice(), ReactionPolicy::SinglePerUser);
            let mut expected = replayed.clone();

            for op in &seq {
                apply(&mut replayed, *op, ReactionPolicy::SinglePerUser);
            }
            apply(
                &mut expected,
                *seq.last().expect("non-empty"),
                ReactionPolicy::SinglePerUser,
            );

            assert_eq!(replayed, expected, "sequence {seq:?}");
        }
    }
}

#[test]
fn multi_policy_keeps_distinct_emoji_until_removal() {
    let mut set = ReactionSet::new();
    apply_add(&mut set, "👍", &bob(), ReactionPolicy::MultiPerUser);
    apply_add(&mut set, "❤️", &bob(), ReactionPolicy::MultiPerUser);
    assert_eq!(set.len(), 2);

    assert!(apply_remove(&mut set, UserId(2)));
    assert!(set.is_empty());

    apply_add(&mut set, "😢", &bob(), ReactionPolicy::MultiPerUser);
    assert_eq!(set.keys().collect::<Vec<_>>(), vec!["😢"]);
}

#[test]
fn single_policy_moves_reaction_to_new_emoji() {
    let mut set = ReactionSet::new();
    apply_add(&mut set, "👍", &bob(), ReactionPolicy::SinglePerUser);
    assert!(apply_add(&mut set, "❤️", &bob(), ReactionPolicy::SinglePerUser));
    assert!(!set.contains_key("👍"));
    assert_eq!(usernames(&set, "❤️"), vec!["bob"]);
}

#[test]
fn summary_flags_viewer_reactions() {
    let mut set = ReactionSet::new();
    apply_add(&mut set, "👍", &bob(), ReactionPolicy::SinglePerUser);
    apply_add(&mut set, "❤️", &alice(), ReactionPolicy::SinglePerUser);

    let summary = summarize(&set, UserId(1));
    let heart = summary.iter().find(|s| s.emoji == "❤️").expect("heart");
    let thumbs = summary.iter().find(|s| s.emoji == "👍").expect("thumbs");
    assert!(heart.reacted_by_viewer);
    assert!(!thumbs.reacted_by_viewer);
    assert_eq!(thumbs.usernames, vec!["bob"]);
}

#[test]
fn toggle_removes_held_emoji_and_adds_otherwise() {
    let mut store = store_with_message(42, 7);
    let aggregator = ReactionAggregator::default();
    aggregator.apply_add(&mut store, MessageId(7), "👍", &alice());

    let remove = aggregator.toggle_request(&store, ChatId(42), MessageId(7), "👍", UserId(1));
    assert_eq!(
        remove,
        Some(ClientRequest::RemoveReaction {
            message_id: MessageId(7),
            user_id: UserId(1),
            chat_id: ChatId(42),
        })
    );

    let add = aggregator.toggle_request(&store, ChatId(42), MessageId(7), "😂", UserId(1));
    assert!(matches!(add, Some(ClientRequest::AddReaction { ref emoji, .. }) if emoji == "😂"));

    assert!(aggregator
        .toggle_request(&store, ChatId(42), MessageId(8), "😂", UserId(1))
        .is_none());
}
