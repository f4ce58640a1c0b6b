// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation routes: listing, operator actions, and outreach.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};

use tether_core::ConversationStatus;
use tether_core::model::{Conversation, ConversationFilter, Message};
use tether_engine::{Outreach, TransferOutcome};

use crate::auth::{Operator, Tenant};
use crate::error::ApiError;
use crate::server::GatewayState;

/// How a routing request ended, as returned to consoles.
#[derive(Debug, Serialize)]
pub struct TransferView {
    /// `assigned`, `queued`, or `unrouted`.
    pub outcome: &'static str,
    pub conversation: Conversation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operator_id: Option<String>,
    pub fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<TransferOutcome> for TransferView {
    fn from(outcome: TransferOutcome) -> Self {
        match outcome {
            TransferOutcome::Assigned {
                conversation,
                decision,
            } => TransferView {
                outcome: "assigned",
                conversation,
                operator_id: Some(decision.operator_id),
                fallback: decision.fallback,
                reason: Some(decision.reason),
            },
            TransferOutcome::Queued {
                conversation,
                reason,
            } => TransferView {
                outcome: "queued",
                conversation,
                operator_id: None,
                fallback: false,
                reason: Some(reason),
            },
            TransferOutcome::Unrouted { conversation } => TransferView {
                outcome: "unrouted",
                conversation,
                operator_id: None,
                fallback: false,
                reason: None,
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Comma-separated statuses, e.g. `open,pending`.
    pub status: Option<String>,
    pub is_bot: Option<bool>,
    pub archived: Option<bool>,
    pub team_id: Option<String>,
    pub assigned_operator_id: Option<String>,
    pub limit: Option<usize>,
}

impl ListQuery {
    fn into_filter(self, tenant_id: &str) -> Result<ConversationFilter, ApiError> {
        let mut filter = ConversationFilter::for_tenant(tenant_id);
        if let Some(raw) = self.status.as_deref() {
            filter.statuses = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.to_ascii_uppercase()
                        .parse::<ConversationStatus>()
                        .map_err(|_| ApiError::bad_request(format!("unknown status: {s}")))
                })
                .collect::<Result<_, _>>()?;
        }
        filter.is_bot = self.is_bot;
        filter.archived = self.archived;
        filter.team_id = self.team_id;
        filter.assigned_operator_id = self.assigned_operator_id;
        filter.limit = self.limit;
        Ok(filter)
    }
}

/// GET /v1/conversations
pub async fn list(
    State(state): State<GatewayState>,
    Tenant(tenant_id): Tenant,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Conversation>>, ApiError> {
    let filter = query.into_filter(&tenant_id)?;
    Ok(Json(state.engine.list_conversations(&filter).await?))
}

/// GET /v1/conversations/{id}
pub async fn get(
    State(state): State<GatewayState>,
    Tenant(tenant_id): Tenant,
    Path(id): Path<String>,
) -> Result<Json<Conversation>, ApiError> {
    Ok(Json(state.engine.get_conversation(&tenant_id, &id).await?))
}

#[derive(Debug, Deserialize)]
pub struct OutreachRequest {
    pub instance_id: String,
    pub contact_address: String,
    #[serde(default)]
    pub contact_display_name: Option<String>,
    #[serde(default)]
    pub team_id: Option<String>,
    #[serde(default)]
    pub first_message: Option<String>,
}

/// POST /v1/conversations
pub async fn start_outreach(
    State(state): State<GatewayState>,
    Tenant(tenant_id): Tenant,
    operator: Operator,
    Json(body): Json<OutreachRequest>,
) -> Result<(StatusCode, Json<Conversation>), ApiError> {
    let operator_id = operator.require()?.to_string();
    let conversation = state
        .engine
        .start_outreach(Outreach {
            tenant_id,
            instance_id: body.instance_id,
            contact_address: body.contact_address,
            contact_display_name: body.contact_display_name,
            operator_id,
            team_id: body.team_id,
            first_message: body.first_message,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(conversation)))
}

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub operator_id: String,
    #[serde(default)]
    pub team_id: Option<String>,
    /// Version the console was showing; a newer version fails with 409.
    #[serde(default)]
    pub expected_version: Option<u64>,
}

/// POST /v1/conversations/{id}/assign
pub async fn assign(
    State(state): State<GatewayState>,
    Tenant(tenant_id): Tenant,
    operator: Operator,
    Path(id): Path<String>,
    Json(body): Json<AssignRequest>,
) -> Result<Json<Conversation>, ApiError> {
    let conversation = state
        .engine
        .assign(
            &tenant_id,
            &id,
            &body.operator_id,
            body.team_id.as_deref(),
            body.expected_version,
            operator.actor(),
        )
        .await?;
    Ok(Json(conversation))
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub team_id: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// POST /v1/conversations/{id}/transfer
pub async fn transfer(
    State(state): State<GatewayState>,
    Tenant(tenant_id): Tenant,
    operator: Operator,
    Path(id): Path<String>,
    Json(body): Json<TransferRequest>,
) -> Result<Json<TransferView>, ApiError> {
    let reason = body.reason.as_deref().unwrap_or("manual transfer");
    let outcome = state
        .engine
        .transfer_to_team(&tenant_id, &id, &body.team_id, operator.actor(), reason)
        .await?;
    Ok(Json(outcome.into()))
}

/// POST /v1/conversations/{id}/bot/enable
pub async fn enable_bot(
    State(state): State<GatewayState>,
    Tenant(tenant_id): Tenant,
    operator: Operator,
    Path(id): Path<String>,
) -> Result<Json<Conversation>, ApiError> {
    Ok(Json(
        state
            .engine
            .enable_bot(&tenant_id, &id, operator.actor())
            .await?,
    ))
}

/// POST /v1/conversations/{id}/bot/disable
pub async fn disable_bot(
    State(state): State<GatewayState>,
    Tenant(tenant_id): Tenant,
    operator: Operator,
    Path(id): Path<String>,
) -> Result<Json<Conversation>, ApiError> {
    let operator_id = operator.require()?;
    Ok(Json(
        state
            .engine
            .disable_bot(&tenant_id, &id, operator_id)
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct ContentRequest {
    pub content: String,
}

/// POST /v1/conversations/{id}/bot/reply
pub async fn bot_reply(
    State(state): State<GatewayState>,
    Tenant(tenant_id): Tenant,
    Path(id): Path<String>,
    Json(body): Json<ContentRequest>,
) -> Result<Json<Conversation>, ApiError> {
    Ok(Json(
        state
            .engine
            .record_bot_reply(&tenant_id, &id, &body.content)
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct QualificationRequest {
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct QualificationResponse {
    pub conversation: Conversation,
    pub transfer: Option<TransferView>,
}

/// POST /v1/conversations/{id}/qualification
pub async fn set_qualification(
    State(state): State<GatewayState>,
    Tenant(tenant_id): Tenant,
    Path(id): Path<String>,
    Json(body): Json<QualificationRequest>,
) -> Result<Json<QualificationResponse>, ApiError> {
    let (conversation, transfer) = state
        .engine
        .set_qualification(&tenant_id, &id, body.score, body.data)
        .await?;
    Ok(Json(QualificationResponse {
        conversation,
        transfer: transfer.map(TransferView::from),
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct CloseQuery {
    #[serde(default)]
    pub send_closing: bool,
}

/// POST /v1/conversations/{id}/close
pub async fn close(
    State(state): State<GatewayState>,
    Tenant(tenant_id): Tenant,
    operator: Operator,
    Path(id): Path<String>,
    Query(query): Query<CloseQuery>,
) -> Result<Json<Conversation>, ApiError> {
    Ok(Json(
        state
            .engine
            .close(&tenant_id, &id, operator.0.as_deref(), query.send_closing)
            .await?,
    ))
}

#[derive(Debug, Default, Deserialize)]
pub struct MessagesQuery {
    pub limit: Option<usize>,
}

/// GET /v1/conversations/{id}/messages
pub async fn list_messages(
    State(state): State<GatewayState>,
    Tenant(tenant_id): Tenant,
    Path(id): Path<String>,
    Query(query): Query<MessagesQuery>,
) -> Result<Json<Vec<Message>>, ApiError> {
    Ok(Json(
        state
            .engine
            .list_messages(&tenant_id, &id, query.limit)
            .await?,
    ))
}

/// POST /v1/conversations/{id}/messages
pub async fn send_message(
    State(state): State<GatewayState>,
    Tenant(tenant_id): Tenant,
    operator: Operator,
    Path(id): Path<String>,
    Json(body): Json<ContentRequest>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    let operator_id = operator.require()?;
    let message = state
        .engine
        .send_operator_message(&tenant_id, &id, operator_id, &body.content)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

#[derive(Debug, Deserialize)]
pub struct ArchiveRequest {
    pub archived: bool,
    #[serde(default)]
    pub expected_version: Option<u64>,
}

/// POST /v1/conversations/{id}/archive
pub async fn archive(
    State(state): State<GatewayState>,
    Tenant(tenant_id): Tenant,
    Path(id): Path<String>,
    Json(body): Json<ArchiveRequest>,
) -> Result<Json<Conversation>, ApiError> {
    Ok(Json(
        state
            .engine
            .set_archived(&tenant_id, &id, body.expected_version, body.archived)
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct TagRequest {
    pub tag: String,
    #[serde(default)]
    pub expected_version: Option<u64>,
}

/// POST /v1/conversations/{id}/tags
pub async fn add_tag(
    State(state): State<GatewayState>,
    Tenant(tenant_id): Tenant,
    Path(id): Path<String>,
    Json(body): Json<TagRequest>,
) -> Result<Json<Conversation>, ApiError> {
    Ok(Json(
        state
            .engine
            .add_tag(&tenant_id, &id, body.expected_version, &body.tag)
            .await?,
    ))
}

/// DELETE /v1/conversations/{id}/tags/{tag}
pub async fn remove_tag(
    State(state): State<GatewayState>,
    Tenant(tenant_id): Tenant,
    Path((id, tag)): Path<(String, String)>,
) -> Result<Json<Conversation>, ApiError> {
    Ok(Json(
        state
            .engine
            .remove_tag(&tenant_id, &id, None, &tag)
            .await?,
    ))
}

/// POST /v1/conversations/{id}/read
pub async fn mark_read(
    State(state): State<GatewayState>,
    Tenant(tenant_id): Tenant,
    Path(id): Path<String>,
) -> Result<Json<Conversation>, ApiError> {
    Ok(Json(state.engine.mark_read(&tenant_id, &id).await?))
}
