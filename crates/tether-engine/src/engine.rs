// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The conversation engine: shared plumbing for every operation.
//!
//! Ownership changes go through [`ConversationEngine::commit`], which hands a
//! versioned [`TransitionCommit`] to the store and publishes the resulting
//! events. Outbound text goes through [`ConversationEngine::deliver`], which
//! checks the instance, sends, records the message, and publishes it.

use std::sync::Arc;

use tracing::{debug, info};

use tether_bus::EventBus;
use tether_config::model::RoutingConfig;
use tether_core::model::{
    AuditEntry, BotConfig, Conversation, EventDraft, Message, OwnershipChange, TransitionCommit,
    TransitionOutcome,
};
use tether_core::{ChannelAdapter, Clock, ConversationStore, SendReceipt, TetherError};
use tether_router::AssignmentRouter;

use crate::templates::{TemplateRenderer, TemplateVars};

/// Coordinates the store, the channel, the router, and the event bus.
pub struct ConversationEngine {
    pub(crate) store: Arc<dyn ConversationStore>,
    pub(crate) channel: Arc<dyn ChannelAdapter>,
    pub(crate) bus: Arc<EventBus>,
    pub(crate) router: AssignmentRouter,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) templates: TemplateRenderer,
}

/// How an outbound message is attributed.
#[derive(Debug, Clone, Default)]
pub(crate) struct Delivery {
    pub operator_id: Option<String>,
    pub automated: bool,
    pub metadata: Option<serde_json::Value>,
    /// Added to the conversation in the same write as the message.
    pub tag: Option<String>,
}

impl Delivery {
    pub fn automated() -> Self {
        Self {
            automated: true,
            ..Self::default()
        }
    }

    pub fn operator(operator_id: &str) -> Self {
        Self {
            operator_id: Some(operator_id.to_string()),
            ..Self::default()
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tag = Some(tag.to_string());
        self
    }
}

impl ConversationEngine {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        channel: Arc<dyn ChannelAdapter>,
        bus: Arc<EventBus>,
        routing: RoutingConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            channel,
            bus,
            router: AssignmentRouter::new(routing),
            clock,
            templates: TemplateRenderer::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    pub fn channel(&self) -> &Arc<dyn ChannelAdapter> {
        &self.channel
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn templates(&self) -> &TemplateRenderer {
        &self.templates
    }

    pub(crate) fn routing(&self) -> &RoutingConfig {
        self.router.config()
    }

    /// Applies an ownership change against the version the caller read.
    ///
    /// Publishes `conversation_update`, plus `new_assignment` when the change
    /// hands the conversation to an operator.
    pub(crate) async fn commit(
        &self,
        conversation: &Conversation,
        change: OwnershipChange,
        audit: AuditEntry,
    ) -> Result<TransitionOutcome, TetherError> {
        let from = conversation.handoff_state();
        let assigns = matches!(
            change,
            OwnershipChange::AssignOperator { .. } | OwnershipChange::ReopenToOperator { .. }
        );
        let commit = TransitionCommit::new(conversation, change, audit, self.clock.now());
        let event = commit.audit.event;
        let actor = commit.audit.actor.to_string();

        let outcome = self.store.apply_transition(commit).await?;
        let updated = &outcome.conversation;
        info!(
            tenant_id = %updated.tenant_id,
            conversation_id = %updated.id,
            %event,
            %actor,
            %from,
            to = %updated.handoff_state(),
            operator_id = ?updated.assigned_operator_id,
            "conversation transition"
        );

        self.bus.publish(EventDraft::conversation_update(updated)).await;
        if assigns {
            self.bus.publish(EventDraft::new_assignment(updated)).await;
        }
        Ok(outcome)
    }

    /// Sends `content` to the contact, records the outbound message, and
    /// publishes `new_message`.
    ///
    /// Fails with `ChannelUnavailable` before sending when the instance is
    /// not connected.
    pub(crate) async fn deliver(
        &self,
        conversation: &Conversation,
        content: &str,
        delivery: Delivery,
    ) -> Result<(Conversation, Message), TetherError> {
        let receipt = self.transmit(conversation, content).await?;
        self.record_delivery(conversation, content, delivery, receipt)
            .await
    }

    /// Hands `content` to the channel without recording anything.
    pub(crate) async fn transmit(
        &self,
        conversation: &Conversation,
        content: &str,
    ) -> Result<SendReceipt, TetherError> {
        self.ensure_connected(&conversation.instance_id).await?;
        self.channel
            .send_message(
                &conversation.instance_id,
                &conversation.contact_address,
                content,
            )
            .await
    }

    /// Records a message the channel already accepted and publishes
    /// `new_message`.
    pub(crate) async fn record_delivery(
        &self,
        conversation: &Conversation,
        content: &str,
        delivery: Delivery,
        receipt: SendReceipt,
    ) -> Result<(Conversation, Message), TetherError> {
        let mut message = Message::outbound(
            &conversation.tenant_id,
            &conversation.id,
            content,
            delivery.operator_id,
            self.clock.now(),
        )
        .with_receipt(receipt.external_id, receipt.status);
        if delivery.automated {
            message = message.automated();
        }
        if let Some(metadata) = delivery.metadata {
            message = message.with_metadata(metadata);
        }

        let updated = match delivery.tag.as_deref() {
            Some(tag) => {
                self.store
                    .create_tagged_message(message.clone(), tag)
                    .await?
            }
            None => self.store.create_message(message.clone()).await?,
        };
        debug!(
            tenant_id = %updated.tenant_id,
            conversation_id = %updated.id,
            message_id = %message.id,
            automated = message.automated,
            "outbound message recorded"
        );
        self.bus
            .publish(EventDraft::new_message(&updated, &message))
            .await;
        Ok((updated, message))
    }

    pub(crate) async fn ensure_connected(&self, instance_id: &str) -> Result<(), TetherError> {
        let state = self.channel.channel_status(instance_id).await?;
        if !state.is_connected() {
            return Err(TetherError::ChannelUnavailable {
                channel_id: instance_id.to_string(),
                state: state.to_string(),
            });
        }
        Ok(())
    }

    /// The instance's bot settings, or the disabled defaults.
    pub(crate) async fn bot_config(
        &self,
        tenant_id: &str,
        instance_id: &str,
    ) -> Result<BotConfig, TetherError> {
        Ok(self
            .store
            .get_bot_config(tenant_id, instance_id)
            .await?
            .unwrap_or_else(|| BotConfig::disabled(tenant_id, instance_id)))
    }

    /// Renders and sends an optional bot template. Failures are logged and
    /// swallowed: template messages never undo the transition that caused them.
    pub(crate) async fn send_template(
        &self,
        conversation: &Conversation,
        template: Option<&str>,
        purpose: &'static str,
    ) -> Option<Conversation> {
        let template = template.filter(|t| !t.trim().is_empty())?;
        let vars = TemplateVars::for_conversation(conversation);
        let result = match self.templates.render(template, &vars) {
            Ok(content) => {
                let delivery = Delivery::automated()
                    .with_metadata(serde_json::json!({ "template": purpose }));
                self.deliver(conversation, &content, delivery).await
            }
            Err(e) => Err(e),
        };
        match result {
            Ok((updated, _)) => Some(updated),
            Err(e) => {
                tracing::warn!(
                    tenant_id = %conversation.tenant_id,
                    conversation_id = %conversation.id,
                    template = purpose,
                    error = %e,
                    "template message not sent"
                );
                None
            }
        }
    }
}
