use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(UserId);
id_newtype!(ChatId);
id_newtype!(MessageId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatKind {
    Direct,
    Group,
}

impl ChatKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Direct => "Direct",
            Self::Group => "Group",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
    Video,
}

impl MessageKind {
    /// Infers the message kind for an attachment from its MIME type.
    pub fn from_mime(mime_type: Option<&str>) -> Self {
        match mime_type {
            Some(mime) if mime.starts_with("image/") => Self::Image,
            Some(mime) if mime.starts_with("video/") => Self::Video,
            _ => Self::Text,
        }
    }

    /// Stand-in text used when a captionless media message is quoted.
    pub fn placeholder(self) -> Option<&'static str> {
        match self {
            Self::Text => None,
            Self::Image => Some("📷 Image"),
            Self::Video => Some("🎥 Video"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
}

impl User {
    pub fn new(id: UserId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionEntry {
    pub user_id: UserId,
    pub username: String,
}

/// Emoji symbol to the users holding it, in the order they reacted.
pub type ReactionSet = BTreeMap<String, Vec<ReactionEntry>>;

/// Excerpt of a quoted message, captured when the reply was composed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyRef {
    #[serde(rename = "id")]
    pub message_id: MessageId,
    #[serde(rename = "username")]
    pub author_username: String,
    #[serde(rename = "content", default)]
    pub content_excerpt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkPreview {
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub domain: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: MessageId,
    pub chat_id: ChatId,
    pub author: User,
    pub kind: MessageKind,
    pub content: Option<String>,
    pub attachment_ref: Option<String>,
    pub link_preview: Option<LinkPreview>,
    pub created_at: NaiveDateTime,
    pub reply_ref: Option<ReplyRef>,
    pub reactions: ReactionSet,
}

impl Message {
    /// Builds the excerpt used when this message is quoted in a reply.
    pub fn reply_ref(&self) -> ReplyRef {
        let excerpt = match self.content.as_deref() {
            Some(text) if !text.is_empty() => text.to_string(),
            _ => self.kind.placeholder().unwrap_or_default().to_string(),
        };
        ReplyRef {
            message_id: self.id,
            author_username: self.author.username.clone(),
            content_excerpt: excerpt,
        }
    }
}
