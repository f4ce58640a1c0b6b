// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock channel adapter for deterministic testing.
//!
//! `MockChannel` captures every send for assertions, reports a configurable
//! connection state per instance (connected unless told otherwise), and can
//! be switched into a failing mode to exercise error paths.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use tether_core::{
    AdapterType, ChannelAdapter, ConnectionState, DeliveryStatus, HealthStatus, PluginAdapter,
    SendReceipt, TetherError,
};

/// A message handed to the mock transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub channel_id: String,
    pub address: String,
    pub content: String,
    pub external_id: String,
}

pub struct MockChannel {
    sent: Arc<Mutex<Vec<SentMessage>>>,
    states: Arc<Mutex<HashMap<String, ConnectionState>>>,
    failing: Arc<Mutex<bool>>,
}

impl MockChannel {
    pub fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            states: Arc::new(Mutex::new(HashMap::new())),
            failing: Arc::new(Mutex::new(false)),
        }
    }

    /// Every message passed to `send_message`, in order.
    pub async fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }

    /// Messages sent to one contact address.
    pub async fn sent_to(&self, address: &str) -> Vec<SentMessage> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|m| m.address == address)
            .cloned()
            .collect()
    }

    pub async fn clear_sent(&self) {
        self.sent.lock().await.clear();
    }

    pub async fn set_state(&self, channel_id: &str, state: ConnectionState) {
        self.states
            .lock()
            .await
            .insert(channel_id.to_string(), state);
    }

    /// While enabled, sends fail with a transport error.
    pub async fn fail_sends(&self, failing: bool) {
        *self.failing.lock().await = failing;
    }
}

impl Default for MockChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockChannel {
    fn name(&self) -> &str {
        "mock-channel"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, TetherError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), TetherError> {
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for MockChannel {
    async fn send_message(
        &self,
        channel_id: &str,
        address: &str,
        content: &str,
    ) -> Result<SendReceipt, TetherError> {
        if *self.failing.lock().await {
            return Err(TetherError::Channel {
                message: format!("mock send to {address} failed"),
                source: None,
            });
        }
        let external_id = format!("mock-msg-{}", uuid::Uuid::new_v4());
        self.sent.lock().await.push(SentMessage {
            channel_id: channel_id.to_string(),
            address: address.to_string(),
            content: content.to_string(),
            external_id: external_id.clone(),
        });
        Ok(SendReceipt {
            external_id: Some(external_id),
            status: DeliveryStatus::Sent,
        })
    }

    async fn create_channel(&self, channel_id: &str) -> Result<ConnectionState, TetherError> {
        let mut states = self.states.lock().await;
        Ok(*states
            .entry(channel_id.to_string())
            .or_insert(ConnectionState::Connecting))
    }

    async fn channel_status(&self, channel_id: &str) -> Result<ConnectionState, TetherError> {
        Ok(self
            .states
            .lock()
            .await
            .get(channel_id)
            .copied()
            .unwrap_or(ConnectionState::Open))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_captures_outbound_messages() {
        let channel = MockChannel::new();
        let receipt = channel.send_message("inst-1", "+1", "hello").await.unwrap();
        assert_eq!(receipt.status, DeliveryStatus::Sent);

        let sent = channel.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].content, "hello");
        assert_eq!(receipt.external_id.as_deref(), Some(sent[0].external_id.as_str()));
    }

    #[tokio::test]
    async fn unknown_instances_are_connected() {
        let channel = MockChannel::new();
        assert_eq!(
            channel.channel_status("anything").await.unwrap(),
            ConnectionState::Open
        );
        channel.set_state("inst-1", ConnectionState::Closed).await;
        assert_eq!(
            channel.channel_status("inst-1").await.unwrap(),
            ConnectionState::Closed
        );
    }

    #[tokio::test]
    async fn failing_mode_rejects_and_records_nothing() {
        let channel = MockChannel::new();
        channel.fail_sends(true).await;
        assert!(channel.send_message("inst-1", "+1", "x").await.is_err());
        assert!(channel.sent().await.is_empty());
    }
}
