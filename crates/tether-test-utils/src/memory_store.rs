// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory `ConversationStore`.
//!
//! Every operation runs under one lock, so a transition, its audit message,
//! and its member-load changes land together exactly as they do in SQLite.
//! `fail_writes` makes every mutating call fail with a storage error;
//! `fail_message_writes` does the same for message writes alone.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use tether_core::model::{
    BotConfig, Conversation, ConversationFilter, ConversationUpdate, FollowUpRule, LoadChange,
    Message, NewConversation, Team, TeamMember, TeamPatch, TransitionCommit, TransitionOutcome,
};
use tether_core::{
    AdapterType, ConversationStore, HealthStatus, PluginAdapter, StorageAdapter, TetherError,
};

#[derive(Default)]
struct State {
    conversations: Vec<Conversation>,
    messages: Vec<Message>,
    teams: Vec<Team>,
    /// (tenant_id, member) in insertion order.
    members: Vec<(String, TeamMember)>,
    rules: Vec<FollowUpRule>,
    attempts: HashMap<(String, String), u32>,
    bot_configs: HashMap<(String, String), BotConfig>,
    failing: bool,
    failing_messages: bool,
}

impl State {
    fn check_writable(&self) -> Result<(), TetherError> {
        if self.failing {
            return Err(TetherError::Storage {
                source: "injected storage failure".into(),
            });
        }
        Ok(())
    }

    fn check_message_writable(&self) -> Result<(), TetherError> {
        self.check_writable()?;
        if self.failing_messages {
            return Err(TetherError::Storage {
                source: "injected message write failure".into(),
            });
        }
        Ok(())
    }

    fn conversation(&self, tenant_id: &str, id: &str) -> Result<&Conversation, TetherError> {
        self.conversations
            .iter()
            .find(|c| c.id == id && c.tenant_id == tenant_id)
            .ok_or_else(|| TetherError::not_found("conversation", id))
    }

    fn conversation_mut(
        &mut self,
        tenant_id: &str,
        id: &str,
    ) -> Result<&mut Conversation, TetherError> {
        self.conversations
            .iter_mut()
            .find(|c| c.id == id && c.tenant_id == tenant_id)
            .ok_or_else(|| TetherError::not_found("conversation", id))
    }

    fn team(&self, tenant_id: &str, team_id: &str) -> Result<&Team, TetherError> {
        self.teams
            .iter()
            .find(|t| t.id == team_id && t.tenant_id == tenant_id)
            .ok_or_else(|| TetherError::not_found("team", team_id))
    }

    fn name_taken(&self, tenant_id: &str, name: &str, except_id: &str) -> bool {
        self.teams
            .iter()
            .any(|t| t.tenant_id == tenant_id && t.name == name && t.id != except_id)
    }

    fn member_mut(
        &mut self,
        tenant_id: &str,
        team_id: &str,
        operator_id: &str,
    ) -> Result<&mut TeamMember, TetherError> {
        self.members
            .iter_mut()
            .find(|(t, m)| t == tenant_id && m.team_id == team_id && m.operator_id == operator_id)
            .map(|(_, m)| m)
            .ok_or_else(|| TetherError::not_found("team member", operator_id))
    }

    /// Load changes for operators outside the team are ignored.
    fn apply_loads(&mut self, tenant_id: &str, loads: &[LoadChange]) {
        for load in loads {
            if let Ok(member) = self.member_mut(tenant_id, &load.team_id, &load.operator_id) {
                member.apply_load(load);
            }
        }
    }

    fn rule(&self, tenant_id: &str, rule_id: &str) -> Result<&FollowUpRule, TetherError> {
        self.rules
            .iter()
            .find(|r| r.id == rule_id && r.tenant_id == tenant_id)
            .ok_or_else(|| TetherError::not_found("follow-up rule", rule_id))
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a conversation as-is, bypassing creation rules.
    pub async fn insert_conversation(&self, conversation: Conversation) {
        self.state.lock().await.conversations.push(conversation);
    }

    pub async fn fail_writes(&self, failing: bool) {
        self.state.lock().await.failing = failing;
    }

    /// Fails only message writes, leaving every other mutation working.
    pub async fn fail_message_writes(&self, failing: bool) {
        self.state.lock().await.failing_messages = failing;
    }

    /// Every message of every conversation, in insertion order.
    pub async fn all_messages(&self) -> Vec<Message> {
        self.state.lock().await.messages.clone()
    }
}

#[async_trait]
impl PluginAdapter for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, TetherError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), TetherError> {
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for MemoryStore {
    async fn initialize(&self) -> Result<(), TetherError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), TetherError> {
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn create_conversation(&self, new: NewConversation) -> Result<Conversation, TetherError> {
        let mut state = self.state.lock().await;
        state.check_writable()?;
        let (conversation, loads) = new.into_conversation();
        state.apply_loads(&conversation.tenant_id, &loads);
        state.conversations.push(conversation.clone());
        Ok(conversation)
    }

    async fn get_conversation(
        &self,
        tenant_id: &str,
        conversation_id: &str,
    ) -> Result<Conversation, TetherError> {
        let state = self.state.lock().await;
        state.conversation(tenant_id, conversation_id).cloned()
    }

    async fn find_conversation_by_contact(
        &self,
        tenant_id: &str,
        instance_id: &str,
        contact_address: &str,
    ) -> Result<Option<Conversation>, TetherError> {
        let state = self.state.lock().await;
        Ok(state
            .conversations
            .iter()
            .filter(|c| {
                c.tenant_id == tenant_id
                    && c.instance_id == instance_id
                    && c.contact_address == contact_address
            })
            .max_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)))
            .cloned())
    }

    async fn find_conversations(
        &self,
        filter: &ConversationFilter,
    ) -> Result<Vec<Conversation>, TetherError> {
        let state = self.state.lock().await;
        let mut found: Vec<Conversation> = state
            .conversations
            .iter()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect();
        found.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        if let Some(limit) = filter.limit {
            found.truncate(limit);
        }
        Ok(found)
    }

    async fn update_conversation(
        &self,
        tenant_id: &str,
        conversation_id: &str,
        expected_version: Option<u64>,
        update: ConversationUpdate,
    ) -> Result<Conversation, TetherError> {
        let mut state = self.state.lock().await;
        state.check_writable()?;
        let stored = state.conversation_mut(tenant_id, conversation_id)?;
        if let Some(expected) = expected_version.filter(|v| *v != stored.version) {
            return Err(TetherError::invalid_transition(
                &stored.id,
                format!(
                    "conversation changed concurrently (expected version {expected}, found {})",
                    stored.version
                ),
            ));
        }
        let mut updated = stored.clone();
        updated.apply_update(&update)?;
        *stored = updated.clone();
        Ok(updated)
    }

    async fn apply_transition(
        &self,
        commit: TransitionCommit,
    ) -> Result<TransitionOutcome, TetherError> {
        let mut state = self.state.lock().await;
        state.check_writable()?;
        let stored = state.conversation_mut(&commit.tenant_id, &commit.conversation_id)?;
        commit.check_version(stored)?;
        let mut conversation = stored.clone();
        let load_changes = conversation.apply_change(&commit.change, commit.at)?;
        *stored = conversation.clone();

        let audit_message = commit.audit_message();
        state.messages.push(audit_message.clone());
        state.apply_loads(&commit.tenant_id, &load_changes);
        Ok(TransitionOutcome {
            conversation,
            audit_message,
            load_changes,
        })
    }

    async fn create_message(&self, message: Message) -> Result<Conversation, TetherError> {
        let mut state = self.state.lock().await;
        state.check_message_writable()?;
        let stored = state.conversation_mut(&message.tenant_id, &message.conversation_id)?;
        stored.record_message(&message);
        let conversation = stored.clone();
        state.messages.push(message);
        Ok(conversation)
    }

    async fn create_tagged_message(
        &self,
        message: Message,
        tag: &str,
    ) -> Result<Conversation, TetherError> {
        let mut state = self.state.lock().await;
        state.check_message_writable()?;
        let stored = state.conversation_mut(&message.tenant_id, &message.conversation_id)?;
        let mut conversation = stored.clone();
        conversation.apply_update(&ConversationUpdate::AddTag(tag.to_string()))?;
        conversation.record_message(&message);
        *stored = conversation.clone();
        state.messages.push(message);
        Ok(conversation)
    }

    async fn list_messages(
        &self,
        tenant_id: &str,
        conversation_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Message>, TetherError> {
        let state = self.state.lock().await;
        state.conversation(tenant_id, conversation_id)?;
        let messages: Vec<Message> = state
            .messages
            .iter()
            .filter(|m| m.tenant_id == tenant_id && m.conversation_id == conversation_id)
            .cloned()
            .collect();
        let skip = limit.map_or(0, |l| messages.len().saturating_sub(l));
        Ok(messages.into_iter().skip(skip).collect())
    }

    async fn create_team(&self, team: Team) -> Result<Team, TetherError> {
        let mut state = self.state.lock().await;
        state.check_writable()?;
        if state.name_taken(&team.tenant_id, &team.name, &team.id) {
            return Err(TetherError::Conflict(format!(
                "team name `{}` already exists",
                team.name
            )));
        }
        state.teams.push(team.clone());
        Ok(team)
    }

    async fn get_team(&self, tenant_id: &str, team_id: &str) -> Result<Team, TetherError> {
        self.state.lock().await.team(tenant_id, team_id).cloned()
    }

    async fn list_teams(&self, tenant_id: &str) -> Result<Vec<Team>, TetherError> {
        let state = self.state.lock().await;
        let mut teams: Vec<Team> = state
            .teams
            .iter()
            .filter(|t| t.tenant_id == tenant_id)
            .cloned()
            .collect();
        teams.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        Ok(teams)
    }

    async fn update_team(
        &self,
        tenant_id: &str,
        team_id: &str,
        patch: TeamPatch,
    ) -> Result<Team, TetherError> {
        let mut state = self.state.lock().await;
        state.check_writable()?;
        let mut team = state.team(tenant_id, team_id)?.clone();
        patch.apply(&mut team)?;
        if state.name_taken(tenant_id, &team.name, &team.id) {
            return Err(TetherError::Conflict(format!(
                "team name `{}` already exists",
                team.name
            )));
        }
        if let Some(stored) = state.teams.iter_mut().find(|t| t.id == team.id) {
            *stored = team.clone();
        }
        Ok(team)
    }

    async fn delete_team(&self, tenant_id: &str, team_id: &str) -> Result<(), TetherError> {
        let mut state = self.state.lock().await;
        state.check_writable()?;
        state.team(tenant_id, team_id)?;
        let active: u32 = state
            .members
            .iter()
            .filter(|(_, m)| m.team_id == team_id)
            .map(|(_, m)| m.active_conversation_count)
            .sum();
        if active > 0 {
            return Err(TetherError::Conflict(format!(
                "team {team_id} still has {active} active conversations"
            )));
        }
        if let Some(config) = state
            .bot_configs
            .values()
            .filter(|c| c.tenant_id == tenant_id)
            .filter(|c| c.transfer_team_id.as_deref() == Some(team_id))
            .min_by(|a, b| a.instance_id.cmp(&b.instance_id))
        {
            return Err(TetherError::Conflict(format!(
                "team {team_id} is the transfer team of instance {}",
                config.instance_id
            )));
        }
        state.members.retain(|(_, m)| m.team_id != team_id);
        state.teams.retain(|t| t.id != team_id);
        Ok(())
    }

    async fn add_member(
        &self,
        tenant_id: &str,
        member: TeamMember,
    ) -> Result<TeamMember, TetherError> {
        let mut state = self.state.lock().await;
        state.check_writable()?;
        state.team(tenant_id, &member.team_id)?;
        if state
            .member_mut(tenant_id, &member.team_id, &member.operator_id)
            .is_ok()
        {
            return Err(TetherError::Conflict(format!(
                "operator {} is already a member of team {}",
                member.operator_id, member.team_id
            )));
        }
        state.members.push((tenant_id.to_string(), member.clone()));
        Ok(member)
    }

    async fn remove_member(
        &self,
        tenant_id: &str,
        team_id: &str,
        operator_id: &str,
    ) -> Result<(), TetherError> {
        let mut state = self.state.lock().await;
        state.check_writable()?;
        let member = state.member_mut(tenant_id, team_id, operator_id)?;
        if member.active_conversation_count > 0 {
            return Err(TetherError::Conflict(format!(
                "operator {operator_id} still owns {} conversations in team {team_id}",
                member.active_conversation_count
            )));
        }
        state
            .members
            .retain(|(t, m)| !(t == tenant_id && m.team_id == team_id && m.operator_id == operator_id));
        Ok(())
    }

    async fn list_members(
        &self,
        tenant_id: &str,
        team_id: &str,
    ) -> Result<Vec<TeamMember>, TetherError> {
        let state = self.state.lock().await;
        state.team(tenant_id, team_id)?;
        Ok(state
            .members
            .iter()
            .filter(|(t, m)| t == tenant_id && m.team_id == team_id)
            .map(|(_, m)| m.clone())
            .collect())
    }

    async fn get_member(
        &self,
        tenant_id: &str,
        team_id: &str,
        operator_id: &str,
    ) -> Result<TeamMember, TetherError> {
        let mut state = self.state.lock().await;
        state
            .member_mut(tenant_id, team_id, operator_id)
            .map(|m| m.clone())
    }

    async fn set_member_online(
        &self,
        tenant_id: &str,
        team_id: &str,
        operator_id: &str,
        online: bool,
    ) -> Result<TeamMember, TetherError> {
        let mut state = self.state.lock().await;
        state.check_writable()?;
        let member = state.member_mut(tenant_id, team_id, operator_id)?;
        member.is_online = online;
        Ok(member.clone())
    }

    async fn increment_member_load(
        &self,
        tenant_id: &str,
        team_id: &str,
        operator_id: &str,
        delta: i32,
    ) -> Result<TeamMember, TetherError> {
        let mut state = self.state.lock().await;
        state.check_writable()?;
        let member = state.member_mut(tenant_id, team_id, operator_id)?;
        member.apply_load(&LoadChange {
            team_id: team_id.to_string(),
            operator_id: operator_id.to_string(),
            delta,
            assigned_at: None,
        });
        Ok(member.clone())
    }

    async fn create_follow_up_rule(&self, rule: FollowUpRule) -> Result<FollowUpRule, TetherError> {
        let mut state = self.state.lock().await;
        state.check_writable()?;
        state.rules.push(rule.clone());
        Ok(rule)
    }

    async fn list_follow_up_rules(
        &self,
        tenant_id: Option<&str>,
        enabled_only: bool,
    ) -> Result<Vec<FollowUpRule>, TetherError> {
        let state = self.state.lock().await;
        let mut rules: Vec<FollowUpRule> = state
            .rules
            .iter()
            .filter(|r| tenant_id.is_none_or(|t| r.tenant_id == t))
            .filter(|r| !enabled_only || r.enabled)
            .cloned()
            .collect();
        rules.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        Ok(rules)
    }

    async fn delete_follow_up_rule(&self, tenant_id: &str, rule_id: &str) -> Result<(), TetherError> {
        let mut state = self.state.lock().await;
        state.check_writable()?;
        state.rule(tenant_id, rule_id)?;
        state.rules.retain(|r| r.id != rule_id);
        state.attempts.retain(|(rule, _), _| rule != rule_id);
        Ok(())
    }

    async fn set_follow_up_rule_enabled(
        &self,
        tenant_id: &str,
        rule_id: &str,
        enabled: bool,
    ) -> Result<FollowUpRule, TetherError> {
        let mut state = self.state.lock().await;
        state.check_writable()?;
        state.rule(tenant_id, rule_id)?;
        let rule = state
            .rules
            .iter_mut()
            .find(|r| r.id == rule_id)
            .ok_or_else(|| TetherError::not_found("follow-up rule", rule_id))?;
        rule.enabled = enabled;
        Ok(rule.clone())
    }

    async fn follow_up_attempts(
        &self,
        _tenant_id: &str,
        rule_id: &str,
        conversation_id: &str,
    ) -> Result<u32, TetherError> {
        let state = self.state.lock().await;
        Ok(state
            .attempts
            .get(&(rule_id.to_string(), conversation_id.to_string()))
            .copied()
            .unwrap_or(0))
    }

    async fn record_follow_up_attempt(
        &self,
        _tenant_id: &str,
        rule_id: &str,
        conversation_id: &str,
        max_attempts: u32,
    ) -> Result<u32, TetherError> {
        let mut state = self.state.lock().await;
        state.check_writable()?;
        let used = state
            .attempts
            .entry((rule_id.to_string(), conversation_id.to_string()))
            .or_insert(0);
        if *used >= max_attempts {
            return Err(TetherError::AttemptLimitReached {
                rule_id: rule_id.to_string(),
                conversation_id: conversation_id.to_string(),
            });
        }
        *used += 1;
        Ok(*used)
    }

    async fn release_follow_up_attempt(
        &self,
        _tenant_id: &str,
        rule_id: &str,
        conversation_id: &str,
    ) -> Result<(), TetherError> {
        let mut state = self.state.lock().await;
        state.check_writable()?;
        if let Some(used) = state
            .attempts
            .get_mut(&(rule_id.to_string(), conversation_id.to_string()))
        {
            *used = used.saturating_sub(1);
        }
        Ok(())
    }

    async fn get_bot_config(
        &self,
        tenant_id: &str,
        instance_id: &str,
    ) -> Result<Option<BotConfig>, TetherError> {
        let state = self.state.lock().await;
        Ok(state
            .bot_configs
            .get(&(tenant_id.to_string(), instance_id.to_string()))
            .cloned())
    }

    async fn put_bot_config(&self, config: BotConfig) -> Result<BotConfig, TetherError> {
        let mut state = self.state.lock().await;
        state.check_writable()?;
        state.bot_configs.insert(
            (config.tenant_id.clone(), config.instance_id.clone()),
            config.clone(),
        );
        Ok(config)
    }
}
