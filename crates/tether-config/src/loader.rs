// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! Merge order (later overrides earlier): compiled defaults,
//! `/etc/tether/tether.toml`, `~/.config/tether/tether.toml`, `./tether.toml`,
//! then `TETHER_*` environment variables.

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::TetherConfig;

pub(crate) const SYSTEM_CONFIG: &str = "/etc/tether/tether.toml";
pub(crate) const LOCAL_CONFIG: &str = "tether.toml";

/// Top-level sections, used to split `TETHER_SECTION_KEY` variables.
const SECTIONS: &[&str] = &[
    "service",
    "storage",
    "gateway",
    "events",
    "routing",
    "reactivation",
    "follow_up",
    "channel",
];

pub(crate) fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tether").join("tether.toml"))
}

/// The full figment: file hierarchy plus environment overrides.
pub fn build_figment() -> Figment {
    let mut figment = Figment::new()
        .merge(Serialized::defaults(TetherConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG));
    if let Some(user) = user_config_path() {
        figment = figment.merge(Toml::file(user));
    }
    figment.merge(Toml::file(LOCAL_CONFIG)).merge(env_provider())
}

pub fn load_config() -> Result<TetherConfig, figment::Error> {
    build_figment().extract()
}

/// Defaults plus one explicit file, with environment overrides.
pub fn load_config_from_path(path: &Path) -> Result<TetherConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TetherConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Defaults plus inline TOML. No environment lookup.
pub fn load_config_from_str(toml_content: &str) -> Result<TetherConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TetherConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Maps `TETHER_GATEWAY_BEARER_TOKEN` to `gateway.bearer_token`.
///
/// Splitting on every underscore would break keys such as `bearer_token`, so
/// only the leading section name is split off.
fn env_provider() -> Env {
    Env::prefixed("TETHER_").map(|key| section_key(key.as_str()).into())
}

/// Figment hands the key over as written in the environment, usually upper case.
fn section_key(key: &str) -> String {
    let key = key.to_ascii_lowercase();
    SECTIONS
        .iter()
        .find_map(|section| {
            key.strip_prefix(section)
                .and_then(|rest| rest.strip_prefix('_'))
                .map(|rest| format!("{section}.{rest}"))
        })
        .unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_split_only_the_section() {
        assert_eq!(section_key("gateway_bearer_token"), "gateway.bearer_token");
        assert_eq!(section_key("follow_up_interval_minutes"), "follow_up.interval_minutes");
        assert_eq!(
            section_key("routing_no_operator_fallback"),
            "routing.no_operator_fallback"
        );
        assert_eq!(section_key("unknown"), "unknown");
    }

    #[test]
    fn env_keys_are_matched_regardless_of_case() {
        assert_eq!(section_key("GATEWAY_PORT"), "gateway.port");
        assert_eq!(section_key("GATEWAY_BEARER_TOKEN"), "gateway.bearer_token");
        assert_eq!(section_key("Channel_Api_Key"), "channel.api_key");
    }
}
