// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Follow-up Rule Engine.
//!
//! Each sweep lists the enabled rules, groups them by tenant, and evaluates
//! them in (created_at, id) order against one snapshot of the tenant's open
//! conversations. A send consumes an attempt reserved beforehand in the
//! store; a failed send gives it back, so overlapping sweeps never exceed a
//! rule's `max_attempts`. Once the channel accepts the message the attempt
//! is spent, and the rule's tag is written together with the message.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info, warn};

use tether_config::model::FollowUpConfig;
use tether_core::model::{Conversation, ConversationFilter, FollowUpRule};
use tether_core::{ConversationStatus, SendReceipt, TetherError};

use crate::engine::{ConversationEngine, Delivery};
use crate::summary::FollowUpSummary;
use crate::templates::TemplateVars;

pub struct FollowUpEngine {
    engine: Arc<ConversationEngine>,
    config: FollowUpConfig,
}

enum Fired {
    Sent,
    Exhausted,
}

impl FollowUpEngine {
    pub fn new(engine: Arc<ConversationEngine>, config: FollowUpConfig) -> Self {
        Self { engine, config }
    }

    pub async fn run(&self) -> Result<FollowUpSummary, TetherError> {
        if !self.config.enabled {
            debug!("follow-up sweep disabled");
            return Ok(FollowUpSummary::default());
        }
        let rules = self
            .engine
            .store()
            .list_follow_up_rules(None, true)
            .await?;

        let mut by_tenant: BTreeMap<String, Vec<FollowUpRule>> = BTreeMap::new();
        for rule in rules {
            by_tenant.entry(rule.tenant_id.clone()).or_default().push(rule);
        }

        let mut summary = FollowUpSummary::default();
        for (tenant_id, rules) in by_tenant {
            match self.run_tenant(&tenant_id, &rules).await {
                Ok(tenant) => summary.absorb(tenant),
                Err(e) => {
                    summary.rules += rules.len();
                    summary.errors += 1;
                    warn!(tenant_id = %tenant_id, error = %e, "follow-up sweep failed for tenant");
                }
            }
        }

        info!(
            rules = summary.rules,
            matched = summary.matched,
            processed = summary.processed,
            skipped = summary.skipped,
            errors = summary.errors,
            "follow-up sweep finished"
        );
        Ok(summary)
    }

    async fn run_tenant(
        &self,
        tenant_id: &str,
        rules: &[FollowUpRule],
    ) -> Result<FollowUpSummary, TetherError> {
        let filter = ConversationFilter {
            statuses: vec![ConversationStatus::Pending, ConversationStatus::Open],
            archived: Some(false),
            ..ConversationFilter::for_tenant(tenant_id)
        };
        let snapshot = self.engine.store().find_conversations(&filter).await?;
        let now = self.engine.clock().now();

        let mut summary = FollowUpSummary::default();
        // Conversations an exclusive rule already acted on in this pass.
        let mut claimed: HashSet<&str> = HashSet::new();

        for rule in rules {
            summary.rules += 1;
            for conversation in snapshot.iter().filter(|c| rule.applies_to(c, now)) {
                summary.matched += 1;
                if claimed.contains(conversation.id.as_str()) {
                    summary.skipped += 1;
                    continue;
                }
                match self.fire(rule, conversation).await {
                    Ok(Fired::Sent) => {
                        summary.processed += 1;
                        if rule.action.is_exclusive() {
                            claimed.insert(conversation.id.as_str());
                        }
                    }
                    Ok(Fired::Exhausted) => summary.skipped += 1,
                    Err(e) => {
                        summary.errors += 1;
                        warn!(
                            tenant_id,
                            rule_id = %rule.id,
                            conversation_id = %conversation.id,
                            error_kind = %e.kind(),
                            error = %e,
                            "follow-up failed"
                        );
                    }
                }
            }
        }
        Ok(summary)
    }

    async fn fire(&self, rule: &FollowUpRule, conversation: &Conversation) -> Result<Fired, TetherError> {
        let engine = &self.engine;
        let store = engine.store();
        engine.ensure_connected(&conversation.instance_id).await?;

        let attempt = match store
            .record_follow_up_attempt(
                &rule.tenant_id,
                &rule.id,
                &conversation.id,
                rule.max_attempts,
            )
            .await
        {
            Ok(attempt) => attempt,
            Err(TetherError::AttemptLimitReached { .. }) => {
                debug!(
                    rule_id = %rule.id,
                    conversation_id = %conversation.id,
                    max_attempts = rule.max_attempts,
                    "attempts exhausted"
                );
                return Ok(Fired::Exhausted);
            }
            Err(e) => return Err(e),
        };

        let (content, receipt) = match self.send(rule, conversation, attempt).await {
            Ok(sent) => sent,
            Err(e) => {
                store
                    .release_follow_up_attempt(&rule.tenant_id, &rule.id, &conversation.id)
                    .await?;
                return Err(e);
            }
        };

        // The contact has the message now, so the attempt stays consumed even
        // if recording it fails.
        let mut delivery = Delivery::automated().with_metadata(serde_json::json!({
            "rule_id": rule.id,
            "attempt": attempt,
        }));
        if let Some(tag) = rule.action.tag() {
            delivery = delivery.with_tag(tag);
        }
        engine
            .record_delivery(conversation, &content, delivery, receipt)
            .await
            .inspect_err(|e| {
                warn!(
                    rule_id = %rule.id,
                    conversation_id = %conversation.id,
                    attempt,
                    error = %e,
                    "follow-up sent but not recorded"
                );
            })?;
        Ok(Fired::Sent)
    }

    /// Renders and transmits the follow-up. Nothing reached the contact if
    /// this fails.
    async fn send(
        &self,
        rule: &FollowUpRule,
        conversation: &Conversation,
        attempt: u32,
    ) -> Result<(String, SendReceipt), TetherError> {
        let vars = TemplateVars::for_conversation(conversation).with_rule(
            &rule.name,
            attempt,
            rule.max_attempts,
        );
        let content = self.engine.templates().render(rule.action.template(), &vars)?;
        let receipt = self.engine.transmit(conversation, &content).await?;
        Ok((content, receipt))
    }
}
