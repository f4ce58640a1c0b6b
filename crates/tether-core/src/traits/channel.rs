// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel capability: the transport that reaches contacts.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TetherError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ConnectionState, DeliveryStatus};

/// Result of handing a message to the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReceipt {
    pub external_id: Option<String>,
    pub status: DeliveryStatus,
}

/// Adapter for the messaging network bridge.
///
/// `channel_id` is the messaging instance a conversation runs on.
#[async_trait]
pub trait ChannelAdapter: PluginAdapter {
    /// Sends `content` to `address` through the given instance.
    async fn send_message(
        &self,
        channel_id: &str,
        address: &str,
        content: &str,
    ) -> Result<SendReceipt, TetherError>;

    /// Provisions a messaging instance and returns its initial state.
    async fn create_channel(&self, channel_id: &str) -> Result<ConnectionState, TetherError>;

    async fn channel_status(&self, channel_id: &str) -> Result<ConnectionState, TetherError>;
}
