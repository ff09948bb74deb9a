use std::{fs, path::Path, str::FromStr, time::Duration};

use anyhow::{anyhow, Context};
use serde::Deserialize;
use tracing::warn;

use crate::reactions::ReactionPolicy;

const DEFAULT_SETTINGS_FILE: &str = "client.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    pub server_url: String,
    pub typing_ttl: Duration,
    pub reconnect_initial_backoff: Duration,
    pub reconnect_max_backoff: Duration,
    pub event_buffer: usize,
    pub reaction_policy: ReactionPolicy,
    /// Re-pull the active chat after every reaction event.
    pub reaction_resync: bool,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:5000".into(),
            typing_ttl: Duration::from_secs(3),
            reconnect_initial_backoff: Duration::from_millis(500),
            reconnect_max_backoff: Duration::from_secs(30),
            event_buffer: 1024,
            reaction_policy: ReactionPolicy::SinglePerUser,
            reaction_resync: true,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    server_url: Option<String>,
    typing_ttl_ms: Option<u64>,
    reconnect_initial_ms: Option<u64>,
    reconnect_max_ms: Option<u64>,
    event_buffer: Option<usize>,
    reaction_policy: Option<ReactionPolicy>,
    reaction_resync: Option<bool>,
}

/// Defaults, then `client.toml` in the working directory, then environment.
pub fn load_settings() -> ClientSettings {
    let mut settings = ClientSettings::default();
    if Path::new(DEFAULT_SETTINGS_FILE).exists() {
        if let Err(err) = apply_file(&mut settings, Path::new(DEFAULT_SETTINGS_FILE)) {
            warn!("ignoring {DEFAULT_SETTINGS_FILE}: {err:#}");
        }
    }
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    settings
}

pub fn load_settings_from(path: &Path) -> anyhow::Result<ClientSettings> {
    let mut settings = ClientSettings::default();
    apply_file(&mut settings, path)?;
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

fn apply_file(settings: &mut ClientSettings, path: &Path) -> anyhow::Result<()> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read settings file '{}'", path.display()))?;
    let file_cfg: FileSettings = toml::from_str(&raw)
        .with_context(|| format!("failed to parse settings file '{}'", path.display()))?;

    if let Some(v) = file_cfg.server_url {
        settings.server_url = v;
    }
    if let Some(v) = file_cfg.typing_ttl_ms {
        settings.typing_ttl = Duration::from_millis(v);
    }
    if let Some(v) = file_cfg.reconnect_initial_ms {
        settings.reconnect_initial_backoff = Duration::from_millis(v);
    }
    if let Some(v) = file_cfg.reconnect_max_ms {
        settings.reconnect_max_backoff = Duration::from_millis(v);
    }
    if let Some(v) = file_cfg.event_buffer {
        settings.event_buffer = v.max(1);
    }
    if let Some(v) = file_cfg.reaction_policy {
        settings.reaction_policy = v;
    }
    if let Some(v) = file_cfg.reaction_resync {
        settings.reaction_resync = v;
    }
    Ok(())
}

pub(crate) fn apply_env_overrides(
    settings: &mut ClientSettings,
    lookup: impl Fn(&str) -> Option<String>,
) {
    if let Some(v) = lookup("CHAT_SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = lookup("APP__SERVER_URL") {
        settings.server_url = v;
    }

    if let Some(ms) = lookup("APP__TYPING_TTL_MS").and_then(|v| v.parse::<u64>().ok()) {
        settings.typing_ttl = Duration::from_millis(ms);
    }
    if let Some(ms) = lookup("APP__RECONNECT_INITIAL_MS").and_then(|v| v.parse::<u64>().ok()) {
        settings.reconnect_initial_backoff = Duration::from_millis(ms);
    }
    if let Some(ms) = lookup("APP__RECONNECT_MAX_MS").and_then(|v| v.parse::<u64>().ok()) {
        settings.reconnect_max_backoff = Duration::from_millis(ms);
    }

    if let Some(v) = lookup("APP__REACTION_POLICY") {
        match ReactionPolicy::from_str(&v) {
            Ok(policy) => settings.reaction_policy = policy,
            Err(err) => warn!("ignoring APP__REACTION_POLICY: {err}"),
        }
    }
    if let Some(v) = lookup("APP__REACTION_RESYNC").and_then(|v| v.parse::<bool>().ok()) {
        settings.reaction_resync = v;
    }
}

impl FromStr for ReactionPolicy {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "single_per_user" | "single" => Ok(Self::SinglePerUser),
            "multi_per_user" | "multi" => Ok(Self::MultiPerUser),
            other => Err(anyhow!("unknown reaction policy '{other}'")),
        }
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
