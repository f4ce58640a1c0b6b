// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the storage traits.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use tether_config::model::StorageConfig;
use tether_core::model::{
    BotConfig, Conversation, ConversationFilter, ConversationUpdate, FollowUpRule, Message,
    NewConversation, Team, TeamMember, TeamPatch, TransitionCommit, TransitionOutcome,
};
use tether_core::{
    AdapterType, ConversationStore, HealthStatus, PluginAdapter, StorageAdapter, TetherError,
};

use crate::database::{Database, map_tr_err};
use crate::queries;

/// SQLite-backed conversation store.
///
/// The database is opened by [`StorageAdapter::initialize`]; every other
/// operation fails until then.
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// The connection is not opened until [`StorageAdapter::initialize`] is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Wraps an already opened database, e.g. an in-memory one.
    pub fn from_database(config: StorageConfig, db: Database) -> Self {
        Self {
            config,
            db: OnceCell::new_with(Some(db)),
        }
    }

    fn db(&self) -> Result<&Database, TetherError> {
        self.db.get().ok_or_else(|| {
            TetherError::Internal("storage not initialized -- call initialize() first".into())
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, TetherError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.query_row("SELECT 1", [], |_| Ok(()))
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), TetherError> {
        if let Some(db) = self.db.get() {
            db.checkpoint().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), TetherError> {
        let db = Database::open(&self.config.database_path, self.config.wal_mode).await?;
        self.db
            .set(db)
            .map_err(|_| TetherError::Internal("storage already initialized".into()))?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), TetherError> {
        self.db()?.checkpoint().await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for SqliteStorage {
    // --- conversations ---

    async fn create_conversation(
        &self,
        new: NewConversation,
    ) -> Result<Conversation, TetherError> {
        queries::conversations::create_conversation(self.db()?, new).await
    }

    async fn get_conversation(
        &self,
        tenant_id: &str,
        conversation_id: &str,
    ) -> Result<Conversation, TetherError> {
        queries::conversations::get_conversation(self.db()?, tenant_id, conversation_id).await
    }

    async fn find_conversation_by_contact(
        &self,
        tenant_id: &str,
        instance_id: &str,
        contact_address: &str,
    ) -> Result<Option<Conversation>, TetherError> {
        queries::conversations::find_by_contact(self.db()?, tenant_id, instance_id, contact_address)
            .await
    }

    async fn find_conversations(
        &self,
        filter: &ConversationFilter,
    ) -> Result<Vec<Conversation>, TetherError> {
        queries::conversations::find_conversations(self.db()?, filter).await
    }

    async fn update_conversation(
        &self,
        tenant_id: &str,
        conversation_id: &str,
        expected_version: Option<u64>,
        update: ConversationUpdate,
    ) -> Result<Conversation, TetherError> {
        queries::conversations::update_conversation(
            self.db()?,
            tenant_id,
            conversation_id,
            expected_version,
            update,
        )
        .await
    }

    async fn apply_transition(
        &self,
        commit: TransitionCommit,
    ) -> Result<TransitionOutcome, TetherError> {
        queries::conversations::apply_transition(self.db()?, commit).await
    }

    async fn create_message(&self, message: Message) -> Result<Conversation, TetherError> {
        queries::messages::create_message(self.db()?, message).await
    }

    async fn create_tagged_message(
        &self,
        message: Message,
        tag: &str,
    ) -> Result<Conversation, TetherError> {
        queries::messages::create_tagged_message(self.db()?, message, tag).await
    }

    async fn list_messages(
        &self,
        tenant_id: &str,
        conversation_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Message>, TetherError> {
        queries::messages::list_messages(self.db()?, tenant_id, conversation_id, limit).await
    }

    // --- teams ---

    async fn create_team(&self, team: Team) -> Result<Team, TetherError> {
        queries::teams::create_team(self.db()?, team).await
    }

    async fn get_team(&self, tenant_id: &str, team_id: &str) -> Result<Team, TetherError> {
        queries::teams::get_team(self.db()?, tenant_id, team_id).await
    }

    async fn list_teams(&self, tenant_id: &str) -> Result<Vec<Team>, TetherError> {
        queries::teams::list_teams(self.db()?, tenant_id).await
    }

    async fn update_team(
        &self,
        tenant_id: &str,
        team_id: &str,
        patch: TeamPatch,
    ) -> Result<Team, TetherError> {
        queries::teams::update_team(self.db()?, tenant_id, team_id, patch).await
    }

    async fn delete_team(&self, tenant_id: &str, team_id: &str) -> Result<(), TetherError> {
        queries::teams::delete_team(self.db()?, tenant_id, team_id).await
    }

    async fn add_member(
        &self,
        tenant_id: &str,
        member: TeamMember,
    ) -> Result<TeamMember, TetherError> {
        queries::teams::add_member(self.db()?, tenant_id, member).await
    }

    async fn remove_member(
        &self,
        tenant_id: &str,
        team_id: &str,
        operator_id: &str,
    ) -> Result<(), TetherError> {
        queries::teams::remove_member(self.db()?, tenant_id, team_id, operator_id).await
    }

    async fn list_members(
        &self,
        tenant_id: &str,
        team_id: &str,
    ) -> Result<Vec<TeamMember>, TetherError> {
        queries::teams::list_members(self.db()?, tenant_id, team_id).await
    }

    async fn get_member(
        &self,
        tenant_id: &str,
        team_id: &str,
        operator_id: &str,
    ) -> Result<TeamMember, TetherError> {
        queries::teams::get_member(self.db()?, tenant_id, team_id, operator_id).await
    }

    async fn set_member_online(
        &self,
        tenant_id: &str,
        team_id: &str,
        operator_id: &str,
        online: bool,
    ) -> Result<TeamMember, TetherError> {
        queries::teams::set_member_online(self.db()?, tenant_id, team_id, operator_id, online).await
    }

    async fn increment_member_load(
        &self,
        tenant_id: &str,
        team_id: &str,
        operator_id: &str,
        delta: i32,
    ) -> Result<TeamMember, TetherError> {
        queries::teams::increment_member_load(self.db()?, tenant_id, team_id, operator_id, delta)
            .await
    }

    // --- follow-up rules ---

    async fn create_follow_up_rule(
        &self,
        rule: FollowUpRule,
    ) -> Result<FollowUpRule, TetherError> {
        queries::follow_ups::create_rule(self.db()?, rule).await
    }

    async fn list_follow_up_rules(
        &self,
        tenant_id: Option<&str>,
        enabled_only: bool,
    ) -> Result<Vec<FollowUpRule>, TetherError> {
        queries::follow_ups::list_rules(self.db()?, tenant_id, enabled_only).await
    }

    async fn delete_follow_up_rule(
        &self,
        tenant_id: &str,
        rule_id: &str,
    ) -> Result<(), TetherError> {
        queries::follow_ups::delete_rule(self.db()?, tenant_id, rule_id).await
    }

    async fn set_follow_up_rule_enabled(
        &self,
        tenant_id: &str,
        rule_id: &str,
        enabled: bool,
    ) -> Result<FollowUpRule, TetherError> {
        queries::follow_ups::set_rule_enabled(self.db()?, tenant_id, rule_id, enabled).await
    }

    async fn follow_up_attempts(
        &self,
        tenant_id: &str,
        rule_id: &str,
        conversation_id: &str,
    ) -> Result<u32, TetherError> {
        queries::follow_ups::attempts(self.db()?, tenant_id, rule_id, conversation_id).await
    }

    async fn record_follow_up_attempt(
        &self,
        tenant_id: &str,
        rule_id: &str,
        conversation_id: &str,
        max_attempts: u32,
    ) -> Result<u32, TetherError> {
        queries::follow_ups::record_attempt(
            self.db()?,
            tenant_id,
            rule_id,
            conversation_id,
            max_attempts,
        )
        .await
    }

    async fn release_follow_up_attempt(
        &self,
        tenant_id: &str,
        rule_id: &str,
        conversation_id: &str,
    ) -> Result<(), TetherError> {
        queries::follow_ups::release_attempt(self.db()?, tenant_id, rule_id, conversation_id).await
    }

    // --- bot configuration ---

    async fn get_bot_config(
        &self,
        tenant_id: &str,
        instance_id: &str,
    ) -> Result<Option<BotConfig>, TetherError> {
        queries::bot_configs::get_bot_config(self.db()?, tenant_id, instance_id).await
    }

    async fn put_bot_config(&self, config: BotConfig) -> Result<BotConfig, TetherError> {
        queries::bot_configs::put_bot_config(self.db()?, config).await
    }
}
