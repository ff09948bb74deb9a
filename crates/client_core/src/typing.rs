use std::time::Duration;

use shared::domain::ChatId;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Indicator {
    chat_id: ChatId,
    username: String,
    token: u64,
    expires_at: Instant,
}

/// Expiry timer the caller must arm; only the latest token clears the indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypingRenewal {
    pub chat_id: ChatId,
    pub token: u64,
    pub after: Duration,
}

#[derive(Debug)]
pub struct TypingTracker {
    ttl: Duration,
    active_chat: Option<ChatId>,
    indicator: Option<Indicator>,
    next_token: u64,
}

impl TypingTracker {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            active_chat: None,
            indicator: None,
            next_token: 0,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Switches chats; any indicator for the previous chat is dropped.
    pub fn set_active_chat(&mut self, chat_id: Option<ChatId>) {
        self.active_chat = chat_id;
        self.indicator = None;
    }

    /// Shows (or renews) the indicator. Returns `None` for other chats.
    pub fn on_remote_typing(
        &mut self,
        chat_id: ChatId,
        username: &str,
        now: Instant,
    ) -> Option<TypingRenewal> {
        if self.active_chat != Some(chat_id) {
            return None;
        }
        self.next_token += 1;
        self.indicator = Some(Indicator {
            chat_id,
            username: username.to_string(),
            token: self.next_token,
            expires_at: now + self.ttl,
        });
        Some(TypingRenewal {
            chat_id,
            token: self.next_token,
            after: self.ttl,
        })
    }

    /// Clears the indicator if `token` is still the latest renewal.
    pub fn expire(&mut self, chat_id: ChatId, token: u64) -> bool {
        match &self.indicator {
            Some(current) if current.chat_id == chat_id && current.token == token => {
                self.indicator = None;
                true
            }
            _ => false,
        }
    }

    pub fn current(&self) -> Option<&str> {
        self.indicator.as_ref().map(|i| i.username.as_str())
    }

    pub fn expires_at(&self) -> Option<Instant> {
        self.indicator.as_ref().map(|i| i.expires_at)
    }
}
