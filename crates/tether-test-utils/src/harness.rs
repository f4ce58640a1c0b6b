// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end engine tests.
//!
//! `TestHarness` wires the conversation engine to a store (in-memory by
//! default, or a temp SQLite database), a [`MockChannel`], a [`ManualClock`],
//! and an event bus, plus shortcuts for the setup most scenarios need.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use tether_bus::EventBus;
use tether_config::model::{StorageConfig, TetherConfig};
use tether_config::{NoOperatorFallback, ReopenUnowned};
use tether_core::model::{BotConfig, NewMember, NewTeam, Team};
use tether_core::{AssignmentMode, ConversationStore, MemberRole, StorageAdapter, TetherError};
use tether_engine::{
    ConversationEngine, FollowUpEngine, InactivityReactivator, InboundMessage, InboundOutcome,
};
use tether_storage::SqliteStorage;

use crate::clock::ManualClock;
use crate::memory_store::MemoryStore;
use crate::mock_channel::MockChannel;

pub const TENANT: &str = "tenant-a";
pub const INSTANCE: &str = "instance-1";

/// Monday 2026-03-02 10:00 UTC, inside office hours.
pub fn default_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

pub struct TestHarnessBuilder {
    sqlite: bool,
    start: DateTime<Utc>,
    config: TetherConfig,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            sqlite: false,
            start: default_start(),
            config: TetherConfig::default(),
        }
    }

    /// Back the engine with a temp-file SQLite database instead of memory.
    pub fn with_sqlite(mut self) -> Self {
        self.sqlite = true;
        self
    }

    pub fn starting_at(mut self, start: DateTime<Utc>) -> Self {
        self.start = start;
        self
    }

    pub fn with_fallback(mut self, fallback: NoOperatorFallback) -> Self {
        self.config.routing.no_operator_fallback = fallback;
        self
    }

    pub fn with_reopen_unowned(mut self, policy: ReopenUnowned) -> Self {
        self.config.routing.reopen_unowned = policy;
        self
    }

    pub fn with_config(mut self, config: TetherConfig) -> Self {
        self.config = config;
        self
    }

    pub async fn build(self) -> Result<TestHarness, TetherError> {
        let clock = Arc::new(ManualClock::new(self.start));
        let channel = Arc::new(MockChannel::new());

        let (store, memory, temp_dir) = if self.sqlite {
            let temp_dir = tempfile::TempDir::new().map_err(|e| TetherError::Storage {
                source: Box::new(e),
            })?;
            let storage = SqliteStorage::new(StorageConfig {
                database_path: temp_dir.path().join("test.db").to_string_lossy().to_string(),
                wal_mode: true,
            });
            storage.initialize().await?;
            (Arc::new(storage) as Arc<dyn ConversationStore>, None, Some(temp_dir))
        } else {
            let memory = Arc::new(MemoryStore::new());
            (memory.clone() as Arc<dyn ConversationStore>, Some(memory), None)
        };

        let bus = Arc::new(EventBus::new(&self.config.events, clock.clone()));
        let engine = Arc::new(ConversationEngine::new(
            store.clone(),
            channel.clone(),
            bus.clone(),
            self.config.routing.clone(),
            clock.clone(),
        ));

        Ok(TestHarness {
            store,
            memory,
            channel,
            clock,
            bus,
            engine,
            config: self.config,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete engine with mock transport and controllable time.
pub struct TestHarness {
    pub store: Arc<dyn ConversationStore>,
    /// Set when the harness runs on [`MemoryStore`].
    pub memory: Option<Arc<MemoryStore>>,
    pub channel: Arc<MockChannel>,
    pub clock: Arc<ManualClock>,
    pub bus: Arc<EventBus>,
    pub engine: Arc<ConversationEngine>,
    pub config: TetherConfig,
    _temp_dir: Option<tempfile::TempDir>,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// In-memory harness with default configuration.
    pub async fn new() -> Result<Self, TetherError> {
        Self::builder().build().await
    }

    pub fn reactivator(&self) -> InactivityReactivator {
        InactivityReactivator::new(self.engine.clone(), self.config.reactivation.clone())
    }

    pub fn follow_ups(&self) -> FollowUpEngine {
        FollowUpEngine::new(self.engine.clone(), self.config.follow_up.clone())
    }

    /// Creates a team in [`TENANT`] with `(operator_id, online)` members.
    pub async fn team(
        &self,
        name: &str,
        mode: AssignmentMode,
        members: &[(&str, bool)],
    ) -> Result<Team, TetherError> {
        let team = self
            .engine
            .create_team(
                TENANT,
                NewTeam {
                    name: name.to_string(),
                    assignment_mode: mode,
                    auto_assign: true,
                },
            )
            .await?;
        for (operator_id, online) in members {
            self.engine
                .add_member(
                    TENANT,
                    &team.id,
                    NewMember {
                        operator_id: operator_id.to_string(),
                        role: MemberRole::Agent,
                        is_online: *online,
                    },
                )
                .await?;
        }
        Ok(team)
    }

    /// Enables the bot on [`INSTANCE`] with the given keywords and transfer team.
    pub async fn enable_bot(
        &self,
        keywords: &[&str],
        transfer_team_id: Option<&str>,
    ) -> Result<BotConfig, TetherError> {
        let mut config = BotConfig::disabled(TENANT, INSTANCE);
        config.enabled = true;
        config.transfer_keywords = keywords.iter().map(|k| k.to_string()).collect();
        config.transfer_team_id = transfer_team_id.map(str::to_string);
        self.engine.put_bot_config(config).await
    }

    /// Delivers an inbound message from `address` to [`INSTANCE`].
    pub async fn inbound(&self, address: &str, content: &str) -> Result<InboundOutcome, TetherError> {
        self.engine
            .handle_inbound(InboundMessage {
                tenant_id: TENANT.to_string(),
                instance_id: INSTANCE.to_string(),
                contact_address: address.to_string(),
                contact_name: None,
                content: content.to_string(),
                external_id: None,
                handoff_requested: false,
                received_at: None,
            })
            .await
    }

    /// Active conversation count of one member.
    pub async fn load_of(&self, team_id: &str, operator_id: &str) -> Result<u32, TetherError> {
        Ok(self
            .store
            .get_member(TENANT, team_id, operator_id)
            .await?
            .active_conversation_count)
    }
}
