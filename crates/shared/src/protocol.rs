use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::{
    ChatId, ChatKind, LinkPreview, Message, MessageId, MessageKind, ReactionSet, ReplyRef, User,
    UserId,
};

/// Reply body of the server when an identical direct chat already exists.
pub const CHAT_ALREADY_EXISTS: &str = "Chat already exists";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: UserId,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSummary {
    pub id: ChatId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: ChatKind,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default)]
    pub unread_count: u32,
}

impl ChatSummary {
    pub fn display_name(&self) -> String {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => self.members.join(", "),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateChatRequest {
    #[serde(rename = "type")]
    pub kind: ChatKind,
    pub name: Option<String>,
    pub members: Vec<UserId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateChatResponse {
    #[serde(default)]
    pub message: String,
    pub chat_id: ChatId,
}

impl CreateChatResponse {
    pub fn already_exists(&self) -> bool {
        self.message == CHAT_ALREADY_EXISTS
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub file_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadBase64Request {
    pub data: String,
}

/// A message as it travels on the wire. Pulled history omits `chat_id` and
/// pushed messages omit `reactions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePayload {
    pub id: MessageId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<ChatId>,
    pub user_id: UserId,
    pub username: String,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_preview: Option<LinkPreview>,
    #[serde(with = "crate::timestamp")]
    pub created_at: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<ReplyRef>,
    #[serde(default)]
    pub reactions: ReactionSet,
}

impl MessagePayload {
    /// Converts to the domain message, using `fallback_chat` when the payload
    /// does not name its chat.
    pub fn into_message(self, fallback_chat: ChatId) -> Message {
        Message {
            id: self.id,
            chat_id: self.chat_id.unwrap_or(fallback_chat),
            author: User::new(self.user_id, self.username),
            kind: self.kind,
            content: self.content.filter(|text| !text.is_empty()),
            attachment_ref: self.file_path,
            link_preview: self.link_preview,
            created_at: self.created_at,
            reply_ref: self.reply_to,
            reactions: self.reactions,
        }
    }
}

/// Events the client emits on the push channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientRequest {
    Join {
        username: String,
        room: String,
    },
    Leave {
        username: String,
        room: String,
    },
    Typing {
        username: String,
        chat_id: ChatId,
    },
    SendMessage {
        chat_id: ChatId,
        user_id: UserId,
        content: Option<String>,
        #[serde(rename = "type")]
        kind: MessageKind,
        file_path: Option<String>,
        reply_to_id: Option<MessageId>,
    },
    AddReaction {
        message_id: MessageId,
        user_id: UserId,
        emoji: String,
        chat_id: ChatId,
    },
    RemoveReaction {
        message_id: MessageId,
        user_id: UserId,
        chat_id: ChatId,
    },
}

impl ClientRequest {
    pub fn join(username: impl Into<String>, chat_id: ChatId) -> Self {
        Self::Join {
            username: username.into(),
            room: chat_id.to_string(),
        }
    }

    pub fn leave(username: impl Into<String>, chat_id: ChatId) -> Self {
        Self::Leave {
            username: username.into(),
            room: chat_id.to_string(),
        }
    }
}

/// Events the server pushes to subscribed rooms.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    NewMessage(MessagePayload),
    UserTyping {
        chat_id: ChatId,
        username: String,
    },
    ReactionAdded {
        message_id: MessageId,
        emoji: String,
        username: String,
        user_id: UserId,
    },
    ReactionRemoved {
        message_id: MessageId,
        user_id: UserId,
    },
    ChatUpdated {
        #[serde(default)]
        chat_id: Option<ChatId>,
    },
    UserJoined {
        username: String,
    },
    UserLeft {
        username: String,
    },
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::NewMessage(_) => "new_message",
            Self::UserTyping { .. } => "user_typing",
            Self::ReactionAdded { .. } => "reaction_added",
            Self::ReactionRemoved { .. } => "reaction_removed",
            Self::ChatUpdated { .. } => "chat_updated",
            Self::UserJoined { .. } => "user_joined",
            Self::UserLeft { .. } => "user_left",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pulled_message_without_chat_id_takes_fallback() {
        let raw = r#"{
            "id": 7, "content": "hi", "type": "text", "file_path": null,
            "link_preview": null, "created_at": "2024-05-01 10:00:00",
            "username": "alice", "user_id": 1, "reply_to": null,
            "reactions": {"👍": [{"username": "bob", "user_id": 2}]}
        }"#;
        let payload: MessagePayload = serde_json::from_str(raw).expect("decode");
        let message = payload.into_message(ChatId(42));
        assert_eq!(message.chat_id, ChatId(42));
        assert_eq!(message.author, User::new(UserId(1), "alice"));
        assert_eq!(message.reactions["👍"][0].username, "bob");
    }

    #[test]
    fn pushed_message_has_empty_reactions() {
        let raw = r#"{"event": "new_message", "data": {
            "id": 9, "chat_id": 3, "content": "", "type": "image",
            "file_path": "abc.png", "username": "bob", "user_id": 2,
            "reply_to": {"id": 7, "username": "alice", "content": "hi"},
            "created_at": "2024-05-01T10:00:01.500000"
        }}"#;
        let ServerEvent::NewMessage(payload) = serde_json::from_str(raw).expect("decode") else {
            panic!("expected new_message");
        };
        let message = payload.into_message(ChatId(99));
        assert_eq!(message.chat_id, ChatId(3));
        assert_eq!(message.kind, MessageKind::Image);
        assert_eq!(message.content, None);
        assert!(message.reactions.is_empty());
        assert_eq!(message.reply_ref.map(|r| r.message_id), Some(MessageId(7)));
    }

    #[test]
    fn send_message_request_uses_wire_field_names() {
        let request = ClientRequest::SendMessage {
            chat_id: ChatId(42),
            user_id: UserId(1),
            content: Some("hi".into()),
            kind: MessageKind::Text,
            file_path: None,
            reply_to_id: Some(MessageId(7)),
        };
        let value = serde_json::to_value(&request).expect("encode");
        assert_eq!(value["event"], "send_message");
        assert_eq!(value["data"]["type"], "text");
        assert_eq!(value["data"]["reply_to_id"], 7);
    }

    #[test]
    fn captionless_media_sends_null_content() {
        let request = ClientRequest::SendMessage {
            chat_id: ChatId(42),
            user_id: UserId(1),
            content: None,
            kind: MessageKind::Image,
            file_path: Some("abc.png".into()),
            reply_to_id: None,
        };
        let value = serde_json::to_value(&request).expect("encode");
        assert!(value["data"]["content"].is_null());
        assert_eq!(value["data"]["file_path"], "abc.png");
    }

    #[test]
    fn join_room_is_the_chat_id_string() {
        let value = serde_json::to_value(ClientRequest::join("alice", ChatId(5))).expect("encode");
        assert_eq!(value["data"]["room"], "5");
        let value = serde_json::to_value(ClientRequest::leave("alice", ChatId(5))).expect("encode");
        assert_eq!(value["event"], "leave");
        assert_eq!(value["data"]["room"], "5");
    }

    #[test]
    fn create_chat_conflict_is_detected() {
        let response: CreateChatResponse =
            serde_json::from_str(r#"{"message": "Chat already exists", "chat_id": 4}"#)
                .expect("decode");
        assert!(response.already_exists());
    }
}
