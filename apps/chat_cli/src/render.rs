use std::collections::HashMap;

use client_core::{ChatView, ConnectionState, MessageView, SyncError, SyncEvent};
use shared::domain::{ChatId, MessageId};

/// Turns synchronizer events into terminal lines, printing each message only
/// when it first appears or its rendering changes.
#[derive(Default)]
pub struct Renderer {
    chat: Option<ChatId>,
    shown: HashMap<MessageId, String>,
    messages: Vec<MessageView>,
    chats: Vec<ChatView>,
    list_requested: bool,
}

impl Renderer {
    pub fn message(&self, id: MessageId) -> Option<&MessageView> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Prints the chat list once the next refreshed list arrives.
    pub fn request_chat_list(&mut self) {
        self.list_requested = true;
    }

    pub fn render(&mut self, event: &SyncEvent) -> Vec<String> {
        match event {
            SyncEvent::ConnectionChanged(state) => vec![match state {
                ConnectionState::Connecting => "* connecting...".to_string(),
                ConnectionState::Connected => "* connected".to_string(),
                ConnectionState::Reconnecting => "* connection lost, reconnecting...".to_string(),
            }],
            SyncEvent::PhaseChanged(_) => Vec::new(),
            SyncEvent::ChatsUpdated(chats) => {
                self.chats = chats.clone();
                if std::mem::take(&mut self.list_requested) {
                    self.chat_list()
                } else {
                    Vec::new()
                }
            }
            SyncEvent::MessagesUpdated { chat_id, messages } => {
                if self.chat != Some(*chat_id) {
                    self.chat = Some(*chat_id);
                    self.shown.clear();
                }
                self.messages = messages.clone();
                let mut lines = Vec::new();
                for message in messages {
                    let line = format_message(message);
                    if self.shown.get(&message.id) != Some(&line) {
                        self.shown.insert(message.id, line.clone());
                        lines.push(line);
                    }
                }
                lines
            }
            SyncEvent::TypingChanged {
                username: Some(username),
                ..
            } => vec![format!("* {username} is typing...")],
            SyncEvent::TypingChanged { username: None, .. } => Vec::new(),
            SyncEvent::ComposeChanged {
                reply: Some(reply), ..
            } => vec![format!(
                "* replying to {}: {}",
                reply.author_username, reply.content_excerpt
            )],
            SyncEvent::ComposeChanged { reply: None, .. } => Vec::new(),
            SyncEvent::ChatCreated { chat_id } => vec![format!("* created chat {chat_id}")],
            SyncEvent::Error(SyncError::Conflict { chat_id }) => {
                vec![format!("* chat {chat_id} already exists")]
            }
            SyncEvent::Error(err) => vec![format!("! {:?}: {err}", err.category())],
        }
    }

    pub fn chat_list(&self) -> Vec<String> {
        if self.chats.is_empty() {
            return vec!["* no chats yet".to_string()];
        }
        self.chats
            .iter()
            .map(|chat| {
                let marker = if chat.is_active { '*' } else { ' ' };
                let unread = match chat.unread_count {
                    0 => String::new(),
                    n => format!(" ({n} unread)"),
                };
                format!(
                    "{marker} {:>4}  {} [{}]{unread}",
                    chat.id.0, chat.display_name, chat.kind_label
                )
            })
            .collect()
    }
}

fn format_message(message: &MessageView) -> String {
    let mut line = format!(
        "[{}] #{} {}{}:",
        message.created_at.format("%H:%M"),
        message.id,
        message.author,
        if message.is_own { " (you)" } else { "" }
    );
    if let Some(reply) = &message.reply {
        line.push_str(&format!(
            " ↪ {}: \"{}\"",
            reply.author_username, reply.content_excerpt
        ));
    }
    if let Some(text) = &message.content {
        line.push(' ');
        line.push_str(text);
    }
    if let Some(url) = &message.attachment_url {
        line.push_str(&format!(" <{url}>"));
    }
    if let Some(preview) = &message.link_preview {
        line.push_str(&format!(" [{}: {}]", preview.domain, preview.title));
    }
    if !message.reactions.is_empty() {
        let reactions: Vec<String> = message
            .reactions
            .iter()
            .map(|r| {
                let mine = if r.reacted_by_viewer { "*" } else { "" };
                format!("{}{}{mine}", r.emoji, r.count)
            })
            .collect();
        line.push_str(&format!("  {}", reactions.join(" ")));
    }
    line
}
