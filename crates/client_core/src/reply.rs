use shared::domain::{MessageId, ReplyRef};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingDraft {
    pub content: String,
    pub reply_to_id: Option<MessageId>,
}

#[derive(Debug, Default, Clone)]
pub struct ComposeState {
    draft: String,
    reply: Option<ReplyRef>,
}

impl ComposeState {
    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    pub fn pending_reply(&self) -> Option<&ReplyRef> {
        self.reply.as_ref()
    }

    /// Starts replying to a message, replacing any reply already pending.
    pub fn begin_reply(&mut self, reply: ReplyRef) {
        self.reply = Some(reply);
    }

    pub fn clear_reply(&mut self) {
        self.reply = None;
    }

    /// What would be sent right now. `None` when there is neither text nor
    /// an attachment to carry.
    pub fn outgoing(&self, has_attachment: bool) -> Option<OutgoingDraft> {
        let content = self.draft.trim();
        if content.is_empty() && !has_attachment {
            return None;
        }
        Some(OutgoingDraft {
            content: content.to_string(),
            reply_to_id: self.reply.as_ref().map(|r| r.message_id),
        })
    }

    /// Clears what `sent` carried. Edits made after it was captured, e.g.
    /// while its attachment uploaded, stay in place.
    pub fn send_issued(&mut self, sent: &OutgoingDraft) {
        if self.draft.trim() == sent.content {
            self.draft.clear();
        }
        if self.reply.as_ref().map(|r| r.message_id) == sent.reply_to_id {
            self.reply = None;
        }
    }

    pub fn clear(&mut self) {
        self.draft.clear();
        self.reply = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply_to(id: i64, username: &str) -> ReplyRef {
        ReplyRef {
            message_id: MessageId(id),
            author_username: username.into(),
            content_excerpt: "quoted".into(),
        }
    }

    #[test]
    fn new_reply_replaces_pending_one() {
        let mut compose = ComposeState::default();
        compose.begin_reply(reply_to(1, "alice"));
        compose.begin_reply(reply_to(2, "bob"));
        assert_eq!(compose.pending_reply().map(|r| r.message_id), Some(MessageId(2)));
    }

    #[test]
    fn outgoing_embeds_reply_id_and_trims() {
        let mut compose = ComposeState::default();
        compose.set_draft("  hello  ");
        compose.begin_reply(reply_to(7, "alice"));
        assert_eq!(
            compose.outgoing(false),
            Some(OutgoingDraft {
                content: "hello".into(),
                reply_to_id: Some(MessageId(7)),
            })
        );
    }

    #[test]
    fn blank_draft_only_sends_with_attachment() {
        let mut compose = ComposeState::default();
        compose.set_draft("   ");
        assert_eq!(compose.outgoing(false), None);
        assert_eq!(compose.outgoing(true).map(|d| d.content), Some(String::new()));
    }

    #[test]
    fn issuing_a_send_clears_text_and_reply() {
        let mut compose = ComposeState::default();
        compose.set_draft("hi");
        compose.begin_reply(reply_to(7, "alice"));
        let sent = compose.outgoing(false).expect("draft");
        compose.send_issued(&sent);
        assert_eq!(compose.draft(), "");
        assert!(compose.pending_reply().is_none());
    }

    #[test]
    fn edits_after_capture_survive_the_send() {
        let mut compose = ComposeState::default();
        compose.set_draft("caption");
        let sent = compose.outgoing(true).expect("draft");
        compose.set_draft("next thought");
        compose.begin_reply(reply_to(3, "bob"));
        compose.send_issued(&sent);
        assert_eq!(compose.draft(), "next thought");
        assert_eq!(compose.pending_reply().map(|r| r.message_id), Some(MessageId(3)));
    }
}
