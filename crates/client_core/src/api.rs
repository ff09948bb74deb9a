use async_trait::async_trait;
use reqwest::{multipart, Client, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::{ChatId, UserId},
    error::{ApiError, ApiException},
    protocol::{
        AuthResponse, ChatSummary, CreateChatRequest, CreateChatResponse, CredentialsRequest,
        MessagePayload, UploadBase64Request, UploadResponse, UserSummary,
    },
};
use tracing::debug;

use crate::error::{SyncError, SyncResult};

/// Request/response surface of the server of record.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn register(&self, credentials: &CredentialsRequest) -> SyncResult<UserId>;
    async fn login(&self, credentials: &CredentialsRequest) -> SyncResult<UserId>;
    async fn list_users(&self) -> SyncResult<Vec<UserSummary>>;
    async fn list_chats(&self, user_id: UserId) -> SyncResult<Vec<ChatSummary>>;
    async fn fetch_messages(&self, chat_id: ChatId) -> SyncResult<Vec<MessagePayload>>;
    async fn create_chat(&self, request: &CreateChatRequest) -> SyncResult<CreateChatResponse>;
    async fn mark_read(&self, chat_id: ChatId, user_id: UserId) -> SyncResult<()>;
    async fn upload_file(
        &self,
        filename: &str,
        mime_type: Option<&str>,
        bytes: Vec<u8>,
    ) -> SyncResult<String>;
    async fn upload_base64(&self, data: &str) -> SyncResult<String>;
    async fn download_attachment(&self, file_path: &str) -> SyncResult<Vec<u8>>;
    fn attachment_url(&self, file_path: &str) -> String;
}

pub struct HttpChatApi {
    http: Client,
    server_url: String,
}

impl HttpChatApi {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), server_url)
    }

    pub fn with_client(http: Client, server_url: impl Into<String>) -> Self {
        let server_url = server_url.into().trim_end_matches('/').to_string();
        Self { http, server_url }
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }
}

/// Decodes a success body, or turns a 4xx/5xx `{error}` body into
/// `SyncError::Rejected` carrying the server's message.
async fn read_json<T: DeserializeOwned>(response: Response) -> SyncResult<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiError>(&body)
        .map(|e| e.error)
        .unwrap_or_else(|_| status.canonical_reason().unwrap_or("request failed").to_string());
    Err(ApiException::new(status.as_u16(), message).into())
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn register(&self, credentials: &CredentialsRequest) -> SyncResult<UserId> {
        let response = self
            .http
            .post(format!("{}/register", self.server_url))
            .json(credentials)
            .send()
            .await?;
        let body: AuthResponse = read_json(response).await?;
        Ok(body.user_id)
    }

    async fn login(&self, credentials: &CredentialsRequest) -> SyncResult<UserId> {
        let response = self
            .http
            .post(format!("{}/login", self.server_url))
            .json(credentials)
            .send()
            .await?;
        let body: AuthResponse = read_json(response).await?;
        Ok(body.user_id)
    }

    async fn list_users(&self) -> SyncResult<Vec<UserSummary>> {
        let response = self
            .http
            .get(format!("{}/users", self.server_url))
            .send()
            .await?;
        read_json(response).await
    }

    async fn list_chats(&self, user_id: UserId) -> SyncResult<Vec<ChatSummary>> {
        let response = self
            .http
            .get(format!("{}/chats/{}", self.server_url, user_id.0))
            .send()
            .await?;
        read_json(response).await
    }

    async fn fetch_messages(&self, chat_id: ChatId) -> SyncResult<Vec<MessagePayload>> {
        let response = self
            .http
            .get(format!("{}/messages/{}", self.server_url, chat_id.0))
            .send()
            .await?;
        let messages: Vec<MessagePayload> = read_json(response).await?;
        debug!(chat_id = chat_id.0, count = messages.len(), "pulled chat snapshot");
        Ok(messages)
    }

    async fn create_chat(&self, request: &CreateChatRequest) -> SyncResult<CreateChatResponse> {
        let response = self
            .http
            .post(format!("{}/chats", self.server_url))
            .json(request)
            .send()
            .await?;
        read_json(response).await
    }

    async fn mark_read(&self, chat_id: ChatId, user_id: UserId) -> SyncResult<()> {
        self.http
            .post(format!(
                "{}/mark-read/{}/{}",
                self.server_url, chat_id.0, user_id.0
            ))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn upload_file(
        &self,
        filename: &str,
        mime_type: Option<&str>,
        bytes: Vec<u8>,
    ) -> SyncResult<String> {
        let mut part = multipart::Part::bytes(bytes).file_name(filename.to_string());
        if let Some(mime) = mime_type {
            part = part
                .mime_str(mime)
                .map_err(|e| SyncError::Validation(format!("invalid mime type '{mime}': {e}")))?;
        }
        let form = multipart::Form::new().part("file", part);
        let response = self
            .http
            .post(format!("{}/upload", self.server_url))
            .multipart(form)
            .send()
            .await?;
        let body: UploadResponse = read_json(response).await?;
        Ok(body.file_path)
    }

    async fn upload_base64(&self, data: &str) -> SyncResult<String> {
        let response = self
            .http
            .post(format!("{}/upload-base64", self.server_url))
            .json(&UploadBase64Request {
                data: data.to_string(),
            })
            .send()
            .await?;
        let body: UploadResponse = read_json(response).await?;
        Ok(body.file_path)
    }

    async fn download_attachment(&self, file_path: &str) -> SyncResult<Vec<u8>> {
        let bytes = self
            .http
            .get(self.attachment_url(file_path))
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(bytes.to_vec())
    }

    fn attachment_url(&self, file_path: &str) -> String {
        format!("{}/uploads/{file_path}", self.server_url)
    }
}

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod tests;
