use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use shared::domain::MessageKind;
use tracing::info;

use crate::{api::ChatApi, error::SyncResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attachment {
    /// A picked file, sent as multipart.
    File {
        filename: String,
        mime_type: Option<String>,
        bytes: Vec<u8>,
    },
    /// Pasted image content: a `data:` URL or bare base64.
    Pasted { data: String },
}

impl Attachment {
    pub fn pasted_image(mime_type: &str, bytes: &[u8]) -> Self {
        Self::Pasted {
            data: format!("data:{mime_type};base64,{}", STANDARD.encode(bytes)),
        }
    }

    /// Kind of the message that will carry this attachment.
    pub fn message_kind(&self) -> MessageKind {
        match self {
            Self::File { mime_type, .. } => MessageKind::from_mime(mime_type.as_deref()),
            Self::Pasted { .. } => MessageKind::Image,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedAttachment {
    pub file_path: String,
    pub kind: MessageKind,
}

#[derive(Clone)]
pub struct UploadCoordinator {
    api: Arc<dyn ChatApi>,
}

impl UploadCoordinator {
    pub fn new(api: Arc<dyn ChatApi>) -> Self {
        Self { api }
    }

    /// Any failure comes back as `SyncError::Storage`.
    pub async fn upload(&self, attachment: Attachment) -> SyncResult<UploadedAttachment> {
        let kind = attachment.message_kind();
        let file_path = match attachment {
            Attachment::File {
                filename,
                mime_type,
                bytes,
            } => {
                let size = bytes.len();
                let file_path = self
                    .api
                    .upload_file(&filename, mime_type.as_deref(), bytes)
                    .await
                    .map_err(|e| e.into_storage())?;
                info!(filename = %filename, size, file_path = %file_path, "uploaded attachment");
                file_path
            }
            Attachment::Pasted { data } => self
                .api
                .upload_base64(&data)
                .await
                .map_err(|e| e.into_storage())?,
        };
        Ok(UploadedAttachment { file_path, kind })
    }
}
