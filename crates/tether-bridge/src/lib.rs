// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP channel bridge for Tether.
//!
//! [`HttpChannel`] implements the channel capability on top of a messaging
//! bridge exposing three endpoints per instance:
//!
//! - `POST {base}/instances/{id}/messages` sends a text message
//! - `POST {base}/instances` provisions an instance
//! - `GET {base}/instances/{id}/status` reports the connection state
//!
//! Status reads retry once on transient errors. Sends never retry, since a
//! duplicate would reach the contact.

pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Response, StatusCode};
use tracing::{debug, warn};

use tether_config::model::ChannelConfig;
use tether_core::{
    AdapterType, ChannelAdapter, ConnectionState, HealthStatus, PluginAdapter, SendReceipt,
    TetherError,
};

use crate::types::{BridgeError, CreateInstanceRequest, InstanceState, SendRequest, SendResponse};

#[derive(Debug, Clone)]
pub struct HttpChannel {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    max_retries: u32,
}

impl HttpChannel {
    pub fn new(config: &ChannelConfig) -> Result<Self, TetherError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = config.api_key.as_deref() {
            headers.insert(
                "x-api-key",
                HeaderValue::from_str(key).map_err(|e| {
                    TetherError::Config(format!("invalid channel API key header value: {e}"))
                })?,
            );
        }

        let timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| TetherError::Channel {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout,
            max_retries: 1,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn transport_error(&self, e: reqwest::Error) -> TetherError {
        if e.is_timeout() {
            return TetherError::Timeout {
                duration: self.timeout,
            };
        }
        TetherError::Channel {
            message: format!("HTTP request failed: {e}"),
            source: Some(Box::new(e)),
        }
    }

    async fn fetch_status(&self, channel_id: &str) -> Result<ConnectionState, TetherError> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(channel_id, attempt, "retrying status request after transient error");
                tokio::time::sleep(Duration::from_millis(500)).await;
            }

            let response = self
                .client
                .get(self.url(&format!("/instances/{channel_id}/status")))
                .send()
                .await
                .map_err(|e| self.transport_error(e))?;
            let status = response.status();
            debug!(channel_id, status = %status, attempt, "status response received");

            if status == StatusCode::NOT_FOUND {
                return Err(TetherError::NotFound {
                    entity: "channel instance",
                    id: channel_id.to_string(),
                });
            }
            if is_transient_error(status) && attempt < self.max_retries {
                last_error = Some(error_from_response(response).await);
                continue;
            }
            let state: InstanceState = parse_success(response).await?;
            return Ok(state.state);
        }

        Err(last_error.unwrap_or_else(|| TetherError::Channel {
            message: "status request failed after retries".into(),
            source: None,
        }))
    }
}

#[async_trait]
impl PluginAdapter for HttpChannel {
    fn name(&self) -> &str {
        "http-channel"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, TetherError> {
        match self.client.get(self.url("/health")).send().await {
            Ok(response) if response.status().is_success() => Ok(HealthStatus::Healthy),
            Ok(response) => Ok(HealthStatus::Degraded(format!(
                "bridge returned {}",
                response.status()
            ))),
            Err(e) => Ok(HealthStatus::Unhealthy(format!("bridge unreachable: {e}"))),
        }
    }

    async fn shutdown(&self) -> Result<(), TetherError> {
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for HttpChannel {
    async fn send_message(
        &self,
        channel_id: &str,
        address: &str,
        content: &str,
    ) -> Result<SendReceipt, TetherError> {
        let response = self
            .client
            .post(self.url(&format!("/instances/{channel_id}/messages")))
            .json(&SendRequest { address, content })
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        debug!(channel_id, status = %response.status(), "send response received");

        if response.status() == StatusCode::CONFLICT {
            // The bridge reports a disconnected instance as 409.
            let state = self
                .fetch_status(channel_id)
                .await
                .unwrap_or(ConnectionState::Closed);
            return Err(TetherError::ChannelUnavailable {
                channel_id: channel_id.to_string(),
                state: state.to_string(),
            });
        }
        let sent: SendResponse = parse_success(response).await?;
        Ok(SendReceipt {
            external_id: sent.external_id,
            status: sent.status,
        })
    }

    async fn create_channel(&self, channel_id: &str) -> Result<ConnectionState, TetherError> {
        let response = self
            .client
            .post(self.url("/instances"))
            .json(&CreateInstanceRequest {
                instance_id: channel_id,
            })
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        if response.status() == StatusCode::CONFLICT {
            return Err(TetherError::Conflict(format!(
                "channel instance {channel_id} already exists"
            )));
        }
        let state: InstanceState = parse_success(response).await?;
        Ok(state.state)
    }

    async fn channel_status(&self, channel_id: &str) -> Result<ConnectionState, TetherError> {
        self.fetch_status(channel_id).await
    }
}

async fn parse_success<T: serde::de::DeserializeOwned>(
    response: Response,
) -> Result<T, TetherError> {
    if !response.status().is_success() {
        return Err(error_from_response(response).await);
    }
    let body = response.text().await.map_err(|e| TetherError::Channel {
        message: format!("failed to read bridge response: {e}"),
        source: Some(Box::new(e)),
    })?;
    serde_json::from_str(&body).map_err(|e| TetherError::Channel {
        message: format!("failed to parse bridge response: {e}"),
        source: Some(Box::new(e)),
    })
}

async fn error_from_response(response: Response) -> TetherError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<BridgeError>(&body) {
        Ok(err) => match err.message {
            Some(detail) => format!("bridge error ({}): {detail}", err.error),
            None => format!("bridge error ({})", err.error),
        },
        Err(_) => format!("bridge returned {status}: {body}"),
    };
    TetherError::Channel {
        message,
        source: None,
    }
}

fn is_transient_error(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503)
}
