// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel-originated traffic: inbound messages, delivery receipts,
//! connectivity changes, and typing indicators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use tether_core::model::{
    Conversation, ConversationOwner, ConversationUpdate, EventDraft, EventKind, Message,
    NewConversation,
};
use tether_core::{ConnectionState, DeliveryStatus, ErrorKind, HandoffState, TetherError};

use crate::engine::ConversationEngine;
use crate::handoff::TransferOutcome;
use crate::transfer::inbound_trigger;

/// A message received from a contact through the channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub tenant_id: String,
    pub instance_id: String,
    pub contact_address: String,
    #[serde(default)]
    pub contact_name: Option<String>,
    pub content: String,
    #[serde(default)]
    pub external_id: Option<String>,
    /// Explicit request for a human, set by the channel or the bot.
    #[serde(default)]
    pub handoff_requested: bool,
    #[serde(default)]
    pub received_at: Option<DateTime<Utc>>,
}

/// What handling an inbound message did.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundOutcome {
    pub conversation: Conversation,
    pub message: Message,
    pub created: bool,
    pub reopened: bool,
    pub transfer: Option<TransferOutcome>,
    /// Set when the message was stored but reopening or the handoff failed.
    pub handoff_error: Option<HandoffFailure>,
}

/// A handoff step that failed after the inbound message was stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&TetherError> for HandoffFailure {
    fn from(err: &TetherError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Delivery receipt for an outbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub tenant_id: String,
    pub instance_id: String,
    pub external_id: String,
    pub status: DeliveryStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionUpdate {
    pub tenant_id: String,
    pub instance_id: String,
    pub state: ConnectionState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingUpdate {
    pub tenant_id: String,
    pub instance_id: String,
    pub contact_address: String,
    pub typing: bool,
}

impl ConversationEngine {
    /// Records an inbound message and runs the handoff rules.
    ///
    /// The latest conversation for the contact is reused, reopened if it was
    /// closed; a contact without one gets a new bot-owned conversation.
    pub async fn handle_inbound(&self, inbound: InboundMessage) -> Result<InboundOutcome, TetherError> {
        if inbound.content.trim().is_empty() {
            return Err(TetherError::Validation("inbound message has no content".into()));
        }
        let received_at = inbound.received_at.unwrap_or_else(|| self.clock.now());
        let tenant_id = inbound.tenant_id.as_str();

        let existing = self
            .store
            .find_conversation_by_contact(tenant_id, &inbound.instance_id, &inbound.contact_address)
            .await?;
        let (mut conversation, created) = match existing {
            Some(conversation) => (conversation, false),
            None => {
                let conversation = self
                    .store
                    .create_conversation(NewConversation {
                        tenant_id: tenant_id.to_string(),
                        instance_id: inbound.instance_id.clone(),
                        contact_address: inbound.contact_address.clone(),
                        contact_display_name: inbound.contact_name.clone(),
                        owner: ConversationOwner::Bot,
                        created_at: received_at,
                    })
                    .await?;
                info!(
                    tenant_id,
                    conversation_id = %conversation.id,
                    instance_id = %conversation.instance_id,
                    "conversation created from inbound contact"
                );
                (conversation, true)
            }
        };

        if conversation.archived {
            conversation = self
                .apply_update(tenant_id, &conversation.id, None, ConversationUpdate::SetArchived(false))
                .await?;
        }
        if let Some(name) = inbound
            .contact_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .filter(|n| conversation.contact_display_name.as_deref() != Some(n.trim()))
        {
            conversation = self
                .apply_update(
                    tenant_id,
                    &conversation.id,
                    None,
                    ConversationUpdate::SetDisplayName(name.trim().to_string()),
                )
                .await?;
        }

        let message = Message::inbound(
            tenant_id,
            &conversation.id,
            &inbound.content,
            inbound.external_id.clone(),
            received_at,
        );
        conversation = self.store.create_message(message.clone()).await?;
        self.bus
            .publish(EventDraft::new_message(&conversation, &message))
            .await;

        let mut outcome = InboundOutcome {
            conversation,
            message,
            created,
            reopened: false,
            transfer: None,
            handoff_error: None,
        };
        // The message is stored; a retry from the channel would store it again.
        if let Err(e) = self.run_handoff(&mut outcome, &inbound).await {
            warn!(
                tenant_id,
                conversation_id = %outcome.conversation.id,
                error_kind = %e.kind(),
                error = %e,
                "inbound handoff failed"
            );
            outcome.handoff_error = Some(HandoffFailure::from(&e));
        }
        Ok(outcome)
    }

    /// Reopens a closed conversation, then applies the bot's transfer rules.
    async fn run_handoff(
        &self,
        outcome: &mut InboundOutcome,
        inbound: &InboundMessage,
    ) -> Result<(), TetherError> {
        let tenant_id = inbound.tenant_id.as_str();
        if outcome.conversation.handoff_state() == HandoffState::Closed {
            outcome.conversation = self.reopen(outcome.conversation.clone()).await?;
            outcome.reopened = true;
        }
        if !outcome.conversation.is_bot {
            return Ok(());
        }

        let bot = self
            .bot_config(tenant_id, &outcome.conversation.instance_id)
            .await?;
        match inbound_trigger(&bot, &inbound.content, inbound.handoff_requested)? {
            Some(trigger) => {
                debug!(
                    tenant_id,
                    conversation_id = %outcome.conversation.id,
                    %trigger,
                    "inbound triggers transfer"
                );
                let transfer = self
                    .transfer_from_bot(outcome.conversation.clone(), &trigger)
                    .await?;
                outcome.conversation = transfer.conversation().clone();
                outcome.transfer = Some(transfer);
            }
            None if outcome.created => {
                if let Some(updated) = self
                    .send_template(&outcome.conversation, bot.templates.welcome.as_deref(), "welcome")
                    .await
                {
                    outcome.conversation = updated;
                }
            }
            None => {}
        }
        Ok(())
    }

    /// Publishes a delivery receipt. Stored messages are immutable, so the
    /// receipt only reaches consoles.
    pub async fn handle_status(&self, update: StatusUpdate) -> Result<(), TetherError> {
        self.bus
            .publish(EventDraft::new(
                EventKind::MessageStatus,
                &update.tenant_id,
                serde_json::json!({
                    "instance_id": update.instance_id,
                    "external_id": update.external_id,
                    "status": update.status,
                }),
            ))
            .await;
        Ok(())
    }

    pub async fn handle_connection(&self, update: ConnectionUpdate) -> Result<(), TetherError> {
        info!(
            tenant_id = %update.tenant_id,
            instance_id = %update.instance_id,
            state = %update.state,
            "channel connection changed"
        );
        self.bus
            .publish(EventDraft::new(
                EventKind::ConnectionStatus,
                &update.tenant_id,
                serde_json::json!({
                    "instance_id": update.instance_id,
                    "state": update.state,
                }),
            ))
            .await;
        Ok(())
    }

    pub async fn handle_typing(&self, update: TypingUpdate) -> Result<(), TetherError> {
        let conversation = self
            .store
            .find_conversation_by_contact(
                &update.tenant_id,
                &update.instance_id,
                &update.contact_address,
            )
            .await?;
        self.bus
            .publish(EventDraft::new(
                EventKind::Typing,
                &update.tenant_id,
                serde_json::json!({
                    "conversation_id": conversation.map(|c| c.id),
                    "contact_address": update.contact_address,
                    "typing": update.typing,
                }),
            ))
            .await;
        Ok(())
    }
}
