// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! Every section uses `#[serde(deny_unknown_fields)]` so typos surface at
//! startup instead of silently falling back to defaults.

use serde::{Deserialize, Serialize};

/// Top-level Tether configuration. All sections are optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TetherConfig {
    #[serde(default)]
    pub service: ServiceConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    /// HTTP surface (operator API, event stream, sweep triggers, webhooks).
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Event fan-out buffers.
    #[serde(default)]
    pub events: EventsConfig,

    #[serde(default)]
    pub routing: RoutingConfig,

    #[serde(default)]
    pub reactivation: ReactivationConfig,

    #[serde(default)]
    pub follow_up: FollowUpConfig,

    /// HTTP bridge to the messaging network.
    #[serde(default)]
    pub channel: ChannelConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "tether".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    #[serde(default = "default_true")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: true,
        }
    }
}

fn default_database_path() -> String {
    dirs::data_local_dir()
        .map(|d| d.join("tether").join("tether.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("tether.db"))
        .display()
        .to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Bearer token for operator routes. `None` rejects every request.
    #[serde(default)]
    pub bearer_token: Option<String>,

    /// Token for the sweep triggers. Falls back to `bearer_token`.
    #[serde(default)]
    pub scheduler_token: Option<String>,

    /// Seconds between SSE keep-alive comments on an idle stream.
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_host(),
            port: default_port(),
            bearer_token: None,
            scheduler_token: None,
            keep_alive_secs: default_keep_alive_secs(),
        }
    }
}

impl GatewayConfig {
    pub fn effective_scheduler_token(&self) -> Option<&str> {
        self.scheduler_token
            .as_deref()
            .or(self.bearer_token.as_deref())
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3080
}

fn default_keep_alive_secs() -> u64 {
    15
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EventsConfig {
    /// Events retained per tenant for replay.
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    /// Per-tenant broadcast channel size. A subscriber further behind skips ahead.
    #[serde(default = "default_live_capacity")]
    pub live_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: default_buffer_capacity(),
            live_capacity: default_live_capacity(),
        }
    }
}

fn default_buffer_capacity() -> usize {
    500
}

fn default_live_capacity() -> usize {
    256
}

/// What happens when a team has no online member to take a transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoOperatorFallback {
    /// Leave the conversation with the bot, queued for the team.
    #[default]
    KeepWithBot,
    /// Pick among all members, offline included.
    AnyMember,
}

/// Reopen target for a closed conversation that had no previous operator.
///
/// Closing through the engine always records the previous operator, so such
/// a conversation only arises from rows mutated outside the engine (imports,
/// manual edits). `team` applies to those rows alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReopenUnowned {
    #[default]
    Bot,
    /// Route to the conversation's team, if it had one and was not bot-owned.
    Team,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RoutingConfig {
    #[serde(default)]
    pub no_operator_fallback: NoOperatorFallback,

    #[serde(default)]
    pub reopen_unowned: ReopenUnowned,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReactivationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Human-owned conversations idle longer than this return to the bot.
    #[serde(default = "default_inactivity_hours")]
    pub inactivity_hours: u32,

    /// Template sent to the contact on reactivation.
    #[serde(default = "default_reactivation_message")]
    pub message: String,

    /// Recommended trigger interval, for external schedulers.
    #[serde(default = "default_reactivation_interval")]
    pub interval_hours: u32,
}

impl Default for ReactivationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            inactivity_hours: default_inactivity_hours(),
            message: default_reactivation_message(),
            interval_hours: default_reactivation_interval(),
        }
    }
}

fn default_inactivity_hours() -> u32 {
    48
}

fn default_reactivation_message() -> String {
    "Hi {{ contact_name }}, are you still there? Reply anytime and we'll pick up where we left off."
        .to_string()
}

fn default_reactivation_interval() -> u32 {
    4
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FollowUpConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Recommended trigger interval, for external schedulers.
    #[serde(default = "default_follow_up_interval")]
    pub interval_minutes: u32,
}

impl Default for FollowUpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_minutes: default_follow_up_interval(),
        }
    }
}

fn default_follow_up_interval() -> u32 {
    60
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChannelConfig {
    #[serde(default = "default_channel_url")]
    pub base_url: String,

    /// API key for the bridge, usually set through `TETHER_CHANNEL_API_KEY`. `None` sends no key.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_channel_timeout")]
    pub timeout_secs: u64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            base_url: default_channel_url(),
            api_key: None,
            timeout_secs: default_channel_timeout(),
        }
    }
}

fn default_channel_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_channel_timeout() -> u64 {
    30
}
