// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Administration: teams and members, follow-up rules, bot configuration.

use tracing::info;

use tether_core::TetherError;
use tether_core::model::{
    BotConfig, FollowUpRule, NewFollowUpRule, NewMember, NewTeam, Team, TeamMember, TeamPatch,
};

use crate::engine::ConversationEngine;

impl ConversationEngine {
    pub async fn create_team(&self, tenant_id: &str, new: NewTeam) -> Result<Team, TetherError> {
        new.validate()?;
        let team = self
            .store
            .create_team(new.into_team(tenant_id, self.clock.now()))
            .await?;
        info!(tenant_id, team_id = %team.id, name = %team.name, mode = %team.assignment_mode, "team created");
        Ok(team)
    }

    pub async fn get_team(&self, tenant_id: &str, team_id: &str) -> Result<Team, TetherError> {
        self.store.get_team(tenant_id, team_id).await
    }

    pub async fn list_teams(&self, tenant_id: &str) -> Result<Vec<Team>, TetherError> {
        self.store.list_teams(tenant_id).await
    }

    pub async fn update_team(
        &self,
        tenant_id: &str,
        team_id: &str,
        patch: TeamPatch,
    ) -> Result<Team, TetherError> {
        self.store.update_team(tenant_id, team_id, patch).await
    }

    pub async fn delete_team(&self, tenant_id: &str, team_id: &str) -> Result<(), TetherError> {
        self.store.delete_team(tenant_id, team_id).await?;
        info!(tenant_id, team_id, "team deleted");
        Ok(())
    }

    pub async fn add_member(
        &self,
        tenant_id: &str,
        team_id: &str,
        new: NewMember,
    ) -> Result<TeamMember, TetherError> {
        let operator_id = new.operator_id.trim();
        if operator_id.is_empty() {
            return Err(TetherError::Validation("operator_id must not be empty".into()));
        }
        let mut member = TeamMember::new(team_id, operator_id, new.role, self.clock.now());
        member.is_online = new.is_online;
        self.store.add_member(tenant_id, member).await
    }

    pub async fn remove_member(
        &self,
        tenant_id: &str,
        team_id: &str,
        operator_id: &str,
    ) -> Result<(), TetherError> {
        self.store
            .remove_member(tenant_id, team_id, operator_id)
            .await
    }

    pub async fn list_members(
        &self,
        tenant_id: &str,
        team_id: &str,
    ) -> Result<Vec<TeamMember>, TetherError> {
        self.store.list_members(tenant_id, team_id).await
    }

    pub async fn set_presence(
        &self,
        tenant_id: &str,
        team_id: &str,
        operator_id: &str,
        online: bool,
    ) -> Result<TeamMember, TetherError> {
        let member = self
            .store
            .set_member_online(tenant_id, team_id, operator_id, online)
            .await?;
        info!(tenant_id, team_id, operator_id, online, "operator presence changed");
        Ok(member)
    }

    /// Creates a rule after checking its structure and its template.
    pub async fn create_follow_up_rule(
        &self,
        tenant_id: &str,
        new: NewFollowUpRule,
    ) -> Result<FollowUpRule, TetherError> {
        new.validate()?;
        self.templates.validate(new.action.template())?;
        let rule = self
            .store
            .create_follow_up_rule(new.into_rule(tenant_id, self.clock.now()))
            .await?;
        info!(tenant_id, rule_id = %rule.id, name = %rule.name, "follow-up rule created");
        Ok(rule)
    }

    pub async fn list_follow_up_rules(
        &self,
        tenant_id: &str,
    ) -> Result<Vec<FollowUpRule>, TetherError> {
        self.store
            .list_follow_up_rules(Some(tenant_id), false)
            .await
    }

    pub async fn set_follow_up_rule_enabled(
        &self,
        tenant_id: &str,
        rule_id: &str,
        enabled: bool,
    ) -> Result<FollowUpRule, TetherError> {
        self.store
            .set_follow_up_rule_enabled(tenant_id, rule_id, enabled)
            .await
    }

    pub async fn delete_follow_up_rule(
        &self,
        tenant_id: &str,
        rule_id: &str,
    ) -> Result<(), TetherError> {
        self.store.delete_follow_up_rule(tenant_id, rule_id).await?;
        info!(tenant_id, rule_id, "follow-up rule deleted");
        Ok(())
    }

    /// The stored bot settings for an instance, or the disabled defaults.
    pub async fn get_bot_config(
        &self,
        tenant_id: &str,
        instance_id: &str,
    ) -> Result<BotConfig, TetherError> {
        self.bot_config(tenant_id, instance_id).await
    }

    /// Validates keywords, threshold, hours, every template, and that the
    /// transfer team exists.
    pub async fn put_bot_config(&self, config: BotConfig) -> Result<BotConfig, TetherError> {
        config.validate()?;
        let templates = &config.templates;
        for template in [
            &templates.welcome,
            &templates.away,
            &templates.transfer,
            &templates.closing,
        ]
        .into_iter()
        .flatten()
        {
            self.templates.validate(template)?;
        }
        if let Some(team_id) = config.transfer_team_id.as_deref() {
            self.store.get_team(&config.tenant_id, team_id).await?;
        }
        let stored = self.store.put_bot_config(config).await?;
        info!(
            tenant_id = %stored.tenant_id,
            instance_id = %stored.instance_id,
            enabled = stored.enabled,
            "bot configuration saved"
        );
        Ok(stored)
    }
}
