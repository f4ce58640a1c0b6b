// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic checks that serde attributes cannot express.

use crate::diagnostic::ConfigError;
use crate::model::TetherConfig;

/// Validates a deserialized configuration, collecting every failure.
pub fn validate_config(config: &TetherConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation("storage.database_path must not be empty"));
    }

    let gateway = &config.gateway;
    if gateway.enabled {
        if gateway.port == 0 {
            errors.push(ConfigError::validation("gateway.port must not be 0"));
        }
        let host = gateway.host.trim();
        let valid_host = host.parse::<std::net::IpAddr>().is_ok()
            || (!host.is_empty()
                && host
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-'));
        if !valid_host {
            errors.push(ConfigError::validation(format!(
                "gateway.host `{host}` is not a valid IP address or hostname"
            )));
        }
        if gateway.keep_alive_secs == 0 {
            errors.push(ConfigError::validation("gateway.keep_alive_secs must be at least 1"));
        }
    }
    for (name, token) in [
        ("gateway.bearer_token", &gateway.bearer_token),
        ("gateway.scheduler_token", &gateway.scheduler_token),
    ] {
        if token.as_deref().is_some_and(|t| t.trim().is_empty()) {
            errors.push(ConfigError::validation(format!(
                "{name} must not be empty when set"
            )));
        }
    }

    if config.events.buffer_capacity == 0 {
        errors.push(ConfigError::validation("events.buffer_capacity must be at least 1"));
    }
    if config.events.live_capacity == 0 {
        errors.push(ConfigError::validation("events.live_capacity must be at least 1"));
    }

    if config.reactivation.inactivity_hours == 0 {
        errors.push(ConfigError::validation(
            "reactivation.inactivity_hours must be at least 1",
        ));
    }
    if config.reactivation.enabled && config.reactivation.message.trim().is_empty() {
        errors.push(ConfigError::validation(
            "reactivation.message must not be empty while reactivation is enabled",
        ));
    }

    if !(config.channel.base_url.starts_with("http://")
        || config.channel.base_url.starts_with("https://"))
    {
        errors.push(ConfigError::validation(format!(
            "channel.base_url `{}` must start with http:// or https://",
            config.channel.base_url
        )));
    }
    if config.channel.timeout_secs == 0 {
        errors.push(ConfigError::validation("channel.timeout_secs must be at least 1"));
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(errors: &[ConfigError]) -> Vec<String> {
        errors.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&TetherConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_error_instead_of_failing_fast() {
        let mut config = TetherConfig::default();
        config.storage.database_path = " ".into();
        config.events.buffer_capacity = 0;
        config.reactivation.inactivity_hours = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3, "{:?}", messages(&errors));
    }

    #[test]
    fn port_zero_is_fine_when_gateway_disabled() {
        let mut config = TetherConfig::default();
        config.gateway.port = 0;
        assert!(validate_config(&config).is_err());
        config.gateway.enabled = false;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn rejects_non_http_channel_url() {
        let mut config = TetherConfig::default();
        config.channel.base_url = "ftp://bridge".into();
        let errors = validate_config(&config).unwrap_err();
        assert!(messages(&errors)[0].contains("channel.base_url"));
    }
}
