use shared::{
    domain::User,
    protocol::CredentialsRequest,
};
use tracing::info;

use crate::{
    api::ChatApi,
    error::{SyncError, SyncResult},
};

/// Who is logged in and where. Built by `login`/`register`, owned by the
/// synchronizer until logout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub server_url: String,
    pub user: User,
}

impl SessionContext {
    pub fn new(server_url: impl Into<String>, user: User) -> Self {
        Self {
            server_url: server_url.into().trim_end_matches('/').to_string(),
            user,
        }
    }

    pub fn attachment_url(&self, file_path: &str) -> String {
        format!("{}/uploads/{file_path}", self.server_url)
    }
}

fn validated_credentials(username: &str, password: &str) -> SyncResult<CredentialsRequest> {
    let username = username.trim();
    let password = password.trim();
    if username.is_empty() || password.is_empty() {
        return Err(SyncError::Validation(
            "username and password are required".into(),
        ));
    }
    Ok(CredentialsRequest {
        username: username.to_string(),
        password: password.to_string(),
    })
}

pub async fn login(
    api: &dyn ChatApi,
    server_url: &str,
    username: &str,
    password: &str,
) -> SyncResult<SessionContext> {
    let credentials = validated_credentials(username, password)?;
    let user_id = api.login(&credentials).await?;
    info!(user_id = user_id.0, username = %credentials.username, "logged in");
    Ok(SessionContext::new(
        server_url,
        User::new(user_id, credentials.username),
    ))
}

pub async fn register(
    api: &dyn ChatApi,
    server_url: &str,
    username: &str,
    password: &str,
) -> SyncResult<SessionContext> {
    let credentials = validated_credentials(username, password)?;
    let user_id = api.register(&credentials).await?;
    info!(user_id = user_id.0, username = %credentials.username, "registered");
    Ok(SessionContext::new(
        server_url,
        User::new(user_id, credentials.username),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_credentials_are_rejected_before_any_request() {
        assert!(matches!(
            validated_credentials("  ", "pw"),
            Err(SyncError::Validation(_))
        ));
        assert!(matches!(
            validated_credentials("alice", ""),
            Err(SyncError::Validation(_))
        ));
        let credentials = validated_credentials(" alice ", " pw ").expect("valid");
        assert_eq!(credentials.username, "alice");
    }

    #[test]
    fn attachment_urls_hang_off_uploads() {
        let context = SessionContext::new(
            "http://127.0.0.1:5000/",
            User::new(shared::domain::UserId(1), "alice"),
        );
        assert_eq!(
            context.attachment_url("abc.png"),
            "http://127.0.0.1:5000/uploads/abc.png"
        );
    }
}
