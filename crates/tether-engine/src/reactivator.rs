// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inactivity Reactivator.
//!
//! Hands idle human-owned conversations back to the bot and greets the
//! contact again. The sweep works on a snapshot taken at start; each
//! conversation is processed on its own and failures are only counted.
//!
//! The transition is committed before the message is sent. A conversation
//! that was reactivated is bot-owned afterwards, so a rerun cannot pick it up
//! twice and the message goes out at most once.

use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, info, warn};

use tether_config::model::ReactivationConfig;
use tether_core::model::{Actor, AuditEntry, AuditEvent, Conversation, ConversationFilter, OwnershipChange};
use tether_core::{ConversationStatus, TetherError};

use crate::engine::{ConversationEngine, Delivery};
use crate::summary::SweepSummary;
use crate::templates::TemplateVars;

pub struct InactivityReactivator {
    engine: Arc<ConversationEngine>,
    config: ReactivationConfig,
}

impl InactivityReactivator {
    pub fn new(engine: Arc<ConversationEngine>, config: ReactivationConfig) -> Self {
        Self { engine, config }
    }

    /// Idle, open, human-owned, unarchived conversations across all tenants.
    fn eligible(&self) -> ConversationFilter {
        let cutoff =
            self.engine.clock().now() - Duration::hours(i64::from(self.config.inactivity_hours));
        ConversationFilter {
            statuses: vec![ConversationStatus::Open],
            is_bot: Some(false),
            archived: Some(false),
            last_message_before: Some(cutoff),
            ..ConversationFilter::default()
        }
    }

    pub async fn run(&self) -> Result<SweepSummary, TetherError> {
        if !self.config.enabled {
            debug!("reactivation sweep disabled");
            return Ok(SweepSummary::default());
        }
        let candidates = self.engine.store().find_conversations(&self.eligible()).await?;
        let mut summary = SweepSummary {
            found: candidates.len(),
            ..SweepSummary::default()
        };

        for conversation in candidates {
            match self.reactivate(&conversation).await {
                Ok(()) => summary.processed += 1,
                Err(e) => {
                    summary.errors += 1;
                    warn!(
                        tenant_id = %conversation.tenant_id,
                        conversation_id = %conversation.id,
                        error_kind = %e.kind(),
                        error = %e,
                        "reactivation failed"
                    );
                }
            }
        }

        info!(
            found = summary.found,
            processed = summary.processed,
            errors = summary.errors,
            "reactivation sweep finished"
        );
        Ok(summary)
    }

    async fn reactivate(&self, conversation: &Conversation) -> Result<(), TetherError> {
        let engine = &self.engine;
        engine.ensure_connected(&conversation.instance_id).await?;
        let content = engine.templates().render(
            &self.config.message,
            &TemplateVars::for_conversation(conversation),
        )?;

        let detail = format!(
            "no activity for {}h, returned to bot",
            self.config.inactivity_hours
        );
        let outcome = engine
            .commit(
                conversation,
                OwnershipChange::ReturnToBot,
                AuditEntry::new(AuditEvent::BotReactivated, Actor::System, detail),
            )
            .await?;

        let delivery = Delivery::automated()
            .with_metadata(serde_json::json!({ "template": "reactivation" }));
        engine
            .deliver(&outcome.conversation, &content, delivery)
            .await?;
        Ok(())
    }
}
