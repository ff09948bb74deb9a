use std::{
    collections::HashMap,
    env, fs,
    time::{SystemTime, UNIX_EPOCH},
};

use super::*;

fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn defaults_match_protocol_constants() {
    let settings = ClientSettings::default();
    assert_eq!(settings.typing_ttl, Duration::from_secs(3));
    assert_eq!(settings.reaction_policy, ReactionPolicy::SinglePerUser);
    assert!(settings.reconnect_initial_backoff < settings.reconnect_max_backoff);
}

#[test]
fn app_prefixed_env_wins_over_plain_env() {
    let mut settings = ClientSettings::default();
    apply_env_overrides(
        &mut settings,
        lookup_from(&[
            ("CHAT_SERVER_URL", "http://plain:5000"),
            ("APP__SERVER_URL", "http://prefixed:5000"),
            ("APP__TYPING_TTL_MS", "1500"),
        ]),
    );
    assert_eq!(settings.server_url, "http://prefixed:5000");
    assert_eq!(settings.typing_ttl, Duration::from_millis(1500));
}

#[test]
fn malformed_env_values_are_ignored() {
    let mut settings = ClientSettings::default();
    apply_env_overrides(
        &mut settings,
        lookup_from(&[
            ("APP__RECONNECT_MAX_MS", "soon"),
            ("APP__REACTION_POLICY", "sometimes"),
        ]),
    );
    assert_eq!(settings, ClientSettings::default());
}

#[test]
fn reads_settings_file() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let temp_root = env::temp_dir().join(format!("chat_client_config_test_{suffix}"));
    fs::create_dir_all(&temp_root).expect("temp root");
    let path = temp_root.join("client.toml");
    fs::write(
        &path,
        "server_url = \"http://chat.local:8080\"\nreaction_policy = \"multi_per_user\"\nreconnect_initial_ms = 250\nreaction_resync = false\n",
    )
    .expect("write settings");

    let mut settings = ClientSettings::default();
    apply_file(&mut settings, &path).expect("apply file");
    assert_eq!(settings.server_url, "http://chat.local:8080");
    assert_eq!(settings.reaction_policy, ReactionPolicy::MultiPerUser);
    assert_eq!(settings.reconnect_initial_backoff, Duration::from_millis(250));
    assert!(!settings.reaction_resync);

    fs::remove_dir_all(temp_root).expect("cleanup");
}

#[test]
fn unparsable_file_is_an_error() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let temp_root = env::temp_dir().join(format!("chat_client_bad_config_{suffix}"));
    fs::create_dir_all(&temp_root).expect("temp root");
    let path = temp_root.join("client.toml");
    fs::write(&path, "typing_ttl_ms = \"three seconds\"").expect("write settings");

    let mut settings = ClientSettings::default();
    assert!(apply_file(&mut settings, &path).is_err());

    fs::remove_dir_all(temp_root).expect("cleanup");
}
