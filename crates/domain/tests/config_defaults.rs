use pb_domain::config::{Config, ConfigSeverity};

#[test]
fn default_gateway_is_discord_v10_json() {
    let config = Config::default();
    assert_eq!(
        config.discord.gateway_url,
        "wss://gateway.discord.gg/?v=10&encoding=json"
    );
    assert_eq!(config.discord.api_base_url, "https://discord.com/api/v10");
    assert_eq!(config.discord.token_env, "DISCORD_BOT_TOKEN");
}

#[test]
fn default_backoff_matches_reconnect_policy() {
    let config = Config::default();
    assert_eq!(config.backoff.detail_base_secs, 15);
    assert_eq!(config.backoff.bare_base_secs, 60);
    assert_eq!(config.backoff.max_secs, 600);
}

#[test]
fn partial_sections_keep_other_defaults() {
    let toml_str = r#"
[discord]
channel_id = "123456789"

[session]
tick_ms = 100
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.discord.channel_id, "123456789");
    assert_eq!(config.discord.device_name, "pixelbot");
    assert_eq!(config.session.tick_ms, 100);
    assert_eq!(config.session.hello_timeout_secs, 30);
    assert!(!config.logging.json);
}

#[test]
fn default_config_needs_a_channel() {
    let issues = Config::default().validate();
    assert!(issues
        .iter()
        .any(|i| i.field == "discord.channel_id" && i.severity == ConfigSeverity::Error));
}

#[test]
fn unknown_keys_are_ignored() {
    let toml_str = r#"
[discord]
channel_id = "1"
legacy_poll_ms = 2000
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.discord.channel_id, "1");
}
