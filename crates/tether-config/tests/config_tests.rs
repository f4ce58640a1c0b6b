// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the configuration system.

use tether_config::diagnostic::ConfigError;
use tether_config::{
    NoOperatorFallback, ReopenUnowned, load_and_validate_path, load_and_validate_str,
    load_config_from_str,
};

#[test]
fn full_config_deserializes() {
    let toml = r#"
[service]
name = "tether-eu"
log_level = "debug"

[storage]
database_path = "/tmp/tether.db"
wal_mode = false

[gateway]
host = "0.0.0.0"
port = 9000
bearer_token = "operator-secret"
scheduler_token = "cron-secret"
keep_alive_secs = 5

[events]
buffer_capacity = 100
live_capacity = 32

[routing]
no_operator_fallback = "any_member"
reopen_unowned = "team"

[reactivation]
inactivity_hours = 24
message = "Still need help?"

[follow_up]
enabled = false

[channel]
base_url = "https://bridge.example.com"
api_key = "k"
timeout_secs = 10
"#;

    let config = load_and_validate_str(toml).expect("valid config");
    assert_eq!(config.service.name, "tether-eu");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.gateway.port, 9000);
    assert_eq!(config.gateway.effective_scheduler_token(), Some("cron-secret"));
    assert_eq!(config.events.buffer_capacity, 100);
    assert_eq!(config.routing.no_operator_fallback, NoOperatorFallback::AnyMember);
    assert_eq!(config.routing.reopen_unowned, ReopenUnowned::Team);
    assert_eq!(config.reactivation.inactivity_hours, 24);
    assert!(!config.follow_up.enabled);
    assert_eq!(config.channel.timeout_secs, 10);
}

#[test]
fn empty_config_uses_defaults() {
    let config = load_config_from_str("").expect("defaults");
    assert_eq!(config.gateway.keep_alive_secs, 15);
    assert_eq!(config.events.buffer_capacity, 500);
    assert_eq!(config.reactivation.inactivity_hours, 48);
    assert_eq!(config.reactivation.interval_hours, 4);
    assert_eq!(config.follow_up.interval_minutes, 60);
    assert_eq!(config.routing.no_operator_fallback, NoOperatorFallback::KeepWithBot);
    assert_eq!(config.routing.reopen_unowned, ReopenUnowned::Bot);
    assert!(config.gateway.effective_scheduler_token().is_none());
}

#[test]
fn scheduler_token_falls_back_to_bearer() {
    let config = load_config_from_str("[gateway]\nbearer_token = \"shared\"\n").unwrap();
    assert_eq!(config.gateway.effective_scheduler_token(), Some("shared"));
}

#[test]
fn unknown_key_gets_a_suggestion() {
    let errors = load_and_validate_str("[gateway]\nbearer_tokn = \"x\"\n").unwrap_err();
    match &errors[0] {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => {
            assert_eq!(key, "bearer_tokn");
            assert_eq!(suggestion.as_deref(), Some("bearer_token"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn unknown_fallback_policy_is_rejected() {
    let errors = load_and_validate_str("[routing]\nno_operator_fallback = \"random\"\n")
        .unwrap_err();
    assert!(matches!(errors[0], ConfigError::InvalidType { .. }), "{errors:?}");
}

#[test]
fn semantic_errors_are_reported_after_parsing() {
    let errors = load_and_validate_str("[events]\nlive_capacity = 0\n").unwrap_err();
    assert!(errors[0].to_string().contains("events.live_capacity"));
}

#[test]
fn env_overrides_file_values() {
    figment::Jail::expect_with(|jail| {
        jail.create_file(
            "custom.toml",
            "[gateway]\nport = 4000\n[reactivation]\ninactivity_hours = 12\n",
        )?;
        jail.set_env("TETHER_GATEWAY_PORT", "4100");
        jail.set_env("TETHER_ROUTING_NO_OPERATOR_FALLBACK", "any_member");
        jail.set_env("TETHER_GATEWAY_BEARER_TOKEN", "s3cret");

        let config = load_and_validate_path(std::path::Path::new("custom.toml"))
            .map_err(|e| format!("{e:?}"))?;
        assert_eq!(config.gateway.port, 4100);
        assert_eq!(config.reactivation.inactivity_hours, 12);
        assert_eq!(config.routing.no_operator_fallback, NoOperatorFallback::AnyMember);
        assert_eq!(config.gateway.bearer_token.as_deref(), Some("s3cret"));
        Ok(())
    });
}
