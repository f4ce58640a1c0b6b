// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Health, sweep triggers, and channel webhooks.

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

use tether_bus::BusStats;
use tether_core::HealthStatus;
use tether_core::model::{Conversation, Message};
use tether_engine::{
    ConnectionUpdate, FollowUpSummary, HandoffFailure, InboundMessage, StatusUpdate, SweepSummary,
    TypingUpdate,
};

use crate::conversations::TransferView;
use crate::error::ApiError;
use crate::server::GatewayState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub channel: String,
    pub events: BusStats,
}

/// GET /health
///
/// The gateway is up even when the channel bridge is not; the bridge state
/// is reported alongside.
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    let channel = match state.engine.channel().health_check().await {
        Ok(HealthStatus::Healthy) => "healthy".to_string(),
        Ok(HealthStatus::Degraded(reason)) => format!("degraded: {reason}"),
        Ok(HealthStatus::Unhealthy(reason)) => format!("unhealthy: {reason}"),
        Err(e) => format!("unhealthy: {e}"),
    };
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        channel,
        events: state.engine.bus().stats().await,
    })
}

/// POST /v1/sweeps/reactivation
pub async fn run_reactivation(
    State(state): State<GatewayState>,
) -> Result<Json<SweepSummary>, ApiError> {
    Ok(Json(state.reactivator.run().await?))
}

/// POST /v1/sweeps/follow-ups
pub async fn run_follow_ups(
    State(state): State<GatewayState>,
) -> Result<Json<FollowUpSummary>, ApiError> {
    Ok(Json(state.follow_ups.run().await?))
}

#[derive(Debug, Serialize)]
pub struct InboundResponse {
    pub conversation: Conversation,
    pub message: Message,
    pub created: bool,
    pub reopened: bool,
    pub transfer: Option<TransferView>,
    /// Present when the message was stored but the handoff did not complete.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handoff_error: Option<HandoffErrorView>,
}

#[derive(Debug, Serialize)]
pub struct HandoffErrorView {
    pub error: String,
    pub message: String,
}

impl From<HandoffFailure> for HandoffErrorView {
    fn from(failure: HandoffFailure) -> Self {
        Self {
            error: failure.kind.to_string(),
            message: failure.message,
        }
    }
}

/// POST /v1/channel/inbound
///
/// Once the message is stored the webhook answers 200, even if the handoff
/// failed; the failure is reported in `handoff_error`.
pub async fn channel_inbound(
    State(state): State<GatewayState>,
    Json(body): Json<InboundMessage>,
) -> Result<Json<InboundResponse>, ApiError> {
    let outcome = state.engine.handle_inbound(body).await?;
    Ok(Json(InboundResponse {
        conversation: outcome.conversation,
        message: outcome.message,
        created: outcome.created,
        reopened: outcome.reopened,
        transfer: outcome.transfer.map(TransferView::from),
        handoff_error: outcome.handoff_error.map(HandoffErrorView::from),
    }))
}

/// POST /v1/channel/status
pub async fn channel_status(
    State(state): State<GatewayState>,
    Json(body): Json<StatusUpdate>,
) -> Result<StatusCode, ApiError> {
    state.engine.handle_status(body).await?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /v1/channel/connection
pub async fn channel_connection(
    State(state): State<GatewayState>,
    Json(body): Json<ConnectionUpdate>,
) -> Result<StatusCode, ApiError> {
    state.engine.handle_connection(body).await?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /v1/channel/typing
pub async fn channel_typing(
    State(state): State<GatewayState>,
    Json(body): Json<TypingUpdate>,
) -> Result<StatusCode, ApiError> {
    state.engine.handle_typing(body).await?;
    Ok(StatusCode::ACCEPTED)
}
