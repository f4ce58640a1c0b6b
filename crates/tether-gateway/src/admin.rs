// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Administration routes: teams, members, follow-up rules, bot configuration.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;

use tether_core::model::{
    BotConfig, FollowUpRule, NewFollowUpRule, NewMember, NewTeam, Team, TeamMember, TeamPatch,
};

use crate::auth::Tenant;
use crate::error::ApiError;
use crate::server::GatewayState;

pub async fn list_teams(
    State(state): State<GatewayState>,
    Tenant(tenant_id): Tenant,
) -> Result<Json<Vec<Team>>, ApiError> {
    Ok(Json(state.engine.list_teams(&tenant_id).await?))
}

pub async fn create_team(
    State(state): State<GatewayState>,
    Tenant(tenant_id): Tenant,
    Json(body): Json<NewTeam>,
) -> Result<(StatusCode, Json<Team>), ApiError> {
    let team = state.engine.create_team(&tenant_id, body).await?;
    Ok((StatusCode::CREATED, Json(team)))
}

pub async fn get_team(
    State(state): State<GatewayState>,
    Tenant(tenant_id): Tenant,
    Path(team_id): Path<String>,
) -> Result<Json<Team>, ApiError> {
    Ok(Json(state.engine.get_team(&tenant_id, &team_id).await?))
}

pub async fn update_team(
    State(state): State<GatewayState>,
    Tenant(tenant_id): Tenant,
    Path(team_id): Path<String>,
    Json(patch): Json<TeamPatch>,
) -> Result<Json<Team>, ApiError> {
    Ok(Json(
        state
            .engine
            .update_team(&tenant_id, &team_id, patch)
            .await?,
    ))
}

/// DELETE /v1/teams/{team_id}
///
/// Fails with 409 while any member still holds conversations.
pub async fn delete_team(
    State(state): State<GatewayState>,
    Tenant(tenant_id): Tenant,
    Path(team_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.engine.delete_team(&tenant_id, &team_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_members(
    State(state): State<GatewayState>,
    Tenant(tenant_id): Tenant,
    Path(team_id): Path<String>,
) -> Result<Json<Vec<TeamMember>>, ApiError> {
    Ok(Json(state.engine.list_members(&tenant_id, &team_id).await?))
}

pub async fn add_member(
    State(state): State<GatewayState>,
    Tenant(tenant_id): Tenant,
    Path(team_id): Path<String>,
    Json(body): Json<NewMember>,
) -> Result<(StatusCode, Json<TeamMember>), ApiError> {
    let member = state.engine.add_member(&tenant_id, &team_id, body).await?;
    Ok((StatusCode::CREATED, Json(member)))
}

pub async fn remove_member(
    State(state): State<GatewayState>,
    Tenant(tenant_id): Tenant,
    Path((team_id, operator_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    state
        .engine
        .remove_member(&tenant_id, &team_id, &operator_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct PresenceRequest {
    pub is_online: bool,
}

pub async fn set_presence(
    State(state): State<GatewayState>,
    Tenant(tenant_id): Tenant,
    Path((team_id, operator_id)): Path<(String, String)>,
    Json(body): Json<PresenceRequest>,
) -> Result<Json<TeamMember>, ApiError> {
    Ok(Json(
        state
            .engine
            .set_presence(&tenant_id, &team_id, &operator_id, body.is_online)
            .await?,
    ))
}

pub async fn list_rules(
    State(state): State<GatewayState>,
    Tenant(tenant_id): Tenant,
) -> Result<Json<Vec<FollowUpRule>>, ApiError> {
    Ok(Json(state.engine.list_follow_up_rules(&tenant_id).await?))
}

/// POST /v1/follow-up-rules
///
/// Invalid triggers and templates that fail to compile are rejected with 422.
pub async fn create_rule(
    State(state): State<GatewayState>,
    Tenant(tenant_id): Tenant,
    Json(body): Json<NewFollowUpRule>,
) -> Result<(StatusCode, Json<FollowUpRule>), ApiError> {
    let rule = state.engine.create_follow_up_rule(&tenant_id, body).await?;
    Ok((StatusCode::CREATED, Json(rule)))
}

#[derive(Debug, Deserialize)]
pub struct RuleToggle {
    pub enabled: bool,
}

pub async fn set_rule_enabled(
    State(state): State<GatewayState>,
    Tenant(tenant_id): Tenant,
    Path(rule_id): Path<String>,
    Json(body): Json<RuleToggle>,
) -> Result<Json<FollowUpRule>, ApiError> {
    Ok(Json(
        state
            .engine
            .set_follow_up_rule_enabled(&tenant_id, &rule_id, body.enabled)
            .await?,
    ))
}

pub async fn delete_rule(
    State(state): State<GatewayState>,
    Tenant(tenant_id): Tenant,
    Path(rule_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .engine
        .delete_follow_up_rule(&tenant_id, &rule_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_bot_config(
    State(state): State<GatewayState>,
    Tenant(tenant_id): Tenant,
    Path(instance_id): Path<String>,
) -> Result<Json<BotConfig>, ApiError> {
    Ok(Json(
        state
            .engine
            .get_bot_config(&tenant_id, &instance_id)
            .await?,
    ))
}

/// PUT /v1/instances/{instance_id}/bot
///
/// Tenant and instance come from the header and path, whatever the body says.
pub async fn put_bot_config(
    State(state): State<GatewayState>,
    Tenant(tenant_id): Tenant,
    Path(instance_id): Path<String>,
    Json(mut body): Json<BotConfig>,
) -> Result<Json<BotConfig>, ApiError> {
    body.tenant_id = tenant_id;
    body.instance_id = instance_id;
    Ok(Json(state.engine.put_bot_config(body).await?))
}
