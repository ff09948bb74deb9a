use shared::{domain::ChatId, error::ApiException};
use thiserror::Error;

pub type SyncResult<T> = std::result::Result<T, SyncError>;

/// How a failure should be presented; none of them are fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Transport,
    Conflict,
    Storage,
    Auth,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("server unreachable: {0}")]
    Transport(String),
    #[error("chat {chat_id} already exists")]
    Conflict { chat_id: ChatId },
    #[error("attachment upload failed: {0}")]
    Storage(String),
    #[error("server rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("no chat selected")]
    NoActiveChat,
    #[error("synchronizer is not running")]
    Stopped,
}

impl SyncError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation(_) | Self::NoActiveChat => ErrorCategory::Validation,
            Self::Transport(_) | Self::Stopped => ErrorCategory::Transport,
            Self::Conflict { .. } => ErrorCategory::Conflict,
            Self::Storage(_) => ErrorCategory::Storage,
            Self::Rejected { status, .. } => match status {
                401 | 403 => ErrorCategory::Auth,
                400..=499 => ErrorCategory::Validation,
                _ => ErrorCategory::Transport,
            },
        }
    }

    /// Transport failures recover through reconnect-and-resync.
    pub fn is_retryable(&self) -> bool {
        self.category() == ErrorCategory::Transport
    }

    /// Re-labels any failure that happened while uploading as a storage error.
    pub fn into_storage(self) -> Self {
        match self {
            Self::Storage(_) => self,
            other => Self::Storage(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(value: reqwest::Error) -> Self {
        if let Some(status) = value.status() {
            return Self::Rejected {
                status: status.as_u16(),
                message: value.to_string(),
            };
        }
        Self::Transport(value.to_string())
    }
}

impl From<ApiException> for SyncError {
    fn from(value: ApiException) -> Self {
        Self::Rejected {
            status: value.status,
            message: value.message,
        }
    }
}

impl From<anyhow::Error> for SyncError {
    fn from(value: anyhow::Error) -> Self {
        Self::Transport(format!("{value:#}"))
    }
}
