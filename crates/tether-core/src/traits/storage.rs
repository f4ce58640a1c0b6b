// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage traits: backend lifecycle and the conversation repository.

use async_trait::async_trait;

use crate::error::TetherError;
use crate::model::{
    BotConfig, Conversation, ConversationFilter, ConversationUpdate, FollowUpRule, Message,
    NewConversation, Team, TeamMember, TeamPatch, TransitionCommit, TransitionOutcome,
};
use crate::traits::adapter::PluginAdapter;

/// Adapter for storage and persistence backends.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, connections).
    async fn initialize(&self) -> Result<(), TetherError>;

    /// Closes the storage backend, flushing pending writes and releasing connections.
    async fn close(&self) -> Result<(), TetherError>;
}

/// Tenant-scoped repository for conversations, messages, teams, follow-up
/// rules, and bot configuration.
///
/// Every lookup takes the tenant id; an entity owned by another tenant is
/// reported as [`TetherError::NotFound`]. Writes that touch ownership and
/// member load happen in one atomic unit.
#[async_trait]
pub trait ConversationStore: StorageAdapter {
    // --- conversations ---

    /// Inserts a conversation, incrementing the initial owner's member load.
    async fn create_conversation(&self, new: NewConversation)
    -> Result<Conversation, TetherError>;

    async fn get_conversation(
        &self,
        tenant_id: &str,
        conversation_id: &str,
    ) -> Result<Conversation, TetherError>;

    /// Latest conversation (by creation time) for a contact on an instance.
    async fn find_conversation_by_contact(
        &self,
        tenant_id: &str,
        instance_id: &str,
        contact_address: &str,
    ) -> Result<Option<Conversation>, TetherError>;

    /// Conversations matching `filter`, ordered by (created_at, id).
    async fn find_conversations(
        &self,
        filter: &ConversationFilter,
    ) -> Result<Vec<Conversation>, TetherError>;

    /// Applies a non-ownership update. With `expected_version` set, a concurrent
    /// write in between fails with `InvalidTransition`.
    async fn update_conversation(
        &self,
        tenant_id: &str,
        conversation_id: &str,
        expected_version: Option<u64>,
        update: ConversationUpdate,
    ) -> Result<Conversation, TetherError>;

    /// Applies an ownership transition, its audit message, and the member-load
    /// changes it implies as one atomic unit.
    async fn apply_transition(
        &self,
        commit: TransitionCommit,
    ) -> Result<TransitionOutcome, TetherError>;

    /// Inserts a message and updates the conversation's derived fields in the
    /// same write. Returns the updated conversation.
    async fn create_message(&self, message: Message) -> Result<Conversation, TetherError>;

    /// [`create_message`](Self::create_message) that also adds `tag` to the
    /// conversation in the same write. Nothing is stored if the tag is invalid.
    async fn create_tagged_message(
        &self,
        message: Message,
        tag: &str,
    ) -> Result<Conversation, TetherError>;

    /// Messages in insertion order, optionally only the newest `limit`.
    async fn list_messages(
        &self,
        tenant_id: &str,
        conversation_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Message>, TetherError>;

    // --- teams ---

    /// Fails with `Conflict` when the name is taken within the tenant.
    async fn create_team(&self, team: Team) -> Result<Team, TetherError>;

    async fn get_team(&self, tenant_id: &str, team_id: &str) -> Result<Team, TetherError>;

    async fn list_teams(&self, tenant_id: &str) -> Result<Vec<Team>, TetherError>;

    async fn update_team(
        &self,
        tenant_id: &str,
        team_id: &str,
        patch: TeamPatch,
    ) -> Result<Team, TetherError>;

    /// Fails with `Conflict` while any member still has active conversations.
    async fn delete_team(&self, tenant_id: &str, team_id: &str) -> Result<(), TetherError>;

    async fn add_member(
        &self,
        tenant_id: &str,
        member: TeamMember,
    ) -> Result<TeamMember, TetherError>;

    /// Fails with `Conflict` while the member has active conversations.
    async fn remove_member(
        &self,
        tenant_id: &str,
        team_id: &str,
        operator_id: &str,
    ) -> Result<(), TetherError>;

    /// Members in insertion order.
    async fn list_members(
        &self,
        tenant_id: &str,
        team_id: &str,
    ) -> Result<Vec<TeamMember>, TetherError>;

    async fn get_member(
        &self,
        tenant_id: &str,
        team_id: &str,
        operator_id: &str,
    ) -> Result<TeamMember, TetherError>;

    async fn set_member_online(
        &self,
        tenant_id: &str,
        team_id: &str,
        operator_id: &str,
        online: bool,
    ) -> Result<TeamMember, TetherError>;

    /// Adjusts a member's active conversation count, clamped at zero.
    async fn increment_member_load(
        &self,
        tenant_id: &str,
        team_id: &str,
        operator_id: &str,
        delta: i32,
    ) -> Result<TeamMember, TetherError>;

    // --- follow-up rules ---

    async fn create_follow_up_rule(&self, rule: FollowUpRule)
    -> Result<FollowUpRule, TetherError>;

    /// Rules ordered by (created_at, id). `tenant_id = None` lists every tenant.
    async fn list_follow_up_rules(
        &self,
        tenant_id: Option<&str>,
        enabled_only: bool,
    ) -> Result<Vec<FollowUpRule>, TetherError>;

    async fn delete_follow_up_rule(&self, tenant_id: &str, rule_id: &str)
    -> Result<(), TetherError>;

    async fn set_follow_up_rule_enabled(
        &self,
        tenant_id: &str,
        rule_id: &str,
        enabled: bool,
    ) -> Result<FollowUpRule, TetherError>;

    async fn follow_up_attempts(
        &self,
        tenant_id: &str,
        rule_id: &str,
        conversation_id: &str,
    ) -> Result<u32, TetherError>;

    /// Atomically consumes one attempt and returns its 1-based number, or fails
    /// with `AttemptLimitReached` when `max_attempts` are already used.
    async fn record_follow_up_attempt(
        &self,
        tenant_id: &str,
        rule_id: &str,
        conversation_id: &str,
        max_attempts: u32,
    ) -> Result<u32, TetherError>;

    /// Gives back an attempt whose send failed.
    async fn release_follow_up_attempt(
        &self,
        tenant_id: &str,
        rule_id: &str,
        conversation_id: &str,
    ) -> Result<(), TetherError>;

    // --- bot configuration ---

    async fn get_bot_config(
        &self,
        tenant_id: &str,
        instance_id: &str,
    ) -> Result<Option<BotConfig>, TetherError>;

    async fn put_bot_config(&self, config: BotConfig) -> Result<BotConfig, TetherError>;
}
