// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire types for the channel bridge HTTP API.

use serde::{Deserialize, Serialize};
use tether_core::{ConnectionState, DeliveryStatus};

#[derive(Debug, Clone, Serialize)]
pub struct SendRequest<'a> {
    pub address: &'a str,
    pub content: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendResponse {
    #[serde(default)]
    pub external_id: Option<String>,
    /// Bridges that only acknowledge acceptance omit the status.
    #[serde(default = "default_status")]
    pub status: DeliveryStatus,
}

fn default_status() -> DeliveryStatus {
    DeliveryStatus::Sent
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateInstanceRequest<'a> {
    pub instance_id: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstanceState {
    pub state: ConnectionState,
}

/// Error body returned by the bridge on non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeError {
    pub error: String,
    #[serde(default)]
    pub message: Option<String>,
}
