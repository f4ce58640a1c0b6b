// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation reads, outbound messages, and non-ownership updates.

use tracing::debug;

use tether_core::model::{
    Conversation, ConversationFilter, ConversationUpdate, EventDraft, Message,
};
use tether_core::{HandoffState, TetherError};

use crate::engine::{ConversationEngine, Delivery};
use crate::handoff::TransferOutcome;
use crate::transfer::qualification_trigger;

impl ConversationEngine {
    pub async fn list_conversations(
        &self,
        filter: &ConversationFilter,
    ) -> Result<Vec<Conversation>, TetherError> {
        if filter.tenant_id.is_none() {
            return Err(TetherError::Validation("conversation listing needs a tenant".into()));
        }
        self.store.find_conversations(filter).await
    }

    pub async fn list_messages(
        &self,
        tenant_id: &str,
        conversation_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Message>, TetherError> {
        self.store
            .list_messages(tenant_id, conversation_id, limit)
            .await
    }

    /// An operator writes to the contact. Closed conversations are read-only.
    pub async fn send_operator_message(
        &self,
        tenant_id: &str,
        conversation_id: &str,
        operator_id: &str,
        content: &str,
    ) -> Result<Message, TetherError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(TetherError::Validation("message must not be empty".into()));
        }
        let conversation = self.get_conversation(tenant_id, conversation_id).await?;
        if conversation.handoff_state() == HandoffState::Closed {
            return Err(TetherError::invalid_transition(
                &conversation.id,
                "cannot send to a closed conversation",
            ));
        }
        let (_, message) = self
            .deliver(&conversation, content, Delivery::operator(operator_id))
            .await?;
        Ok(message)
    }

    /// Sends a bot reply and marks the bot as engaged (BOT_PENDING -> BOT_ACTIVE).
    pub async fn record_bot_reply(
        &self,
        tenant_id: &str,
        conversation_id: &str,
        content: &str,
    ) -> Result<Conversation, TetherError> {
        let conversation = self.get_conversation(tenant_id, conversation_id).await?;
        if !matches!(
            conversation.handoff_state(),
            HandoffState::BotPending | HandoffState::BotActive
        ) {
            return Err(TetherError::invalid_transition(
                &conversation.id,
                "bot is not the owner",
            ));
        }
        let (updated, _) = self
            .deliver(&conversation, content, Delivery::default())
            .await?;
        if updated.handoff_state() == HandoffState::BotActive {
            return Ok(updated);
        }
        self.apply_update(tenant_id, conversation_id, None, ConversationUpdate::MarkBotEngaged)
            .await
    }

    /// Stores the bot's qualification result and hands off once the score
    /// reaches the instance's threshold.
    pub async fn set_qualification(
        &self,
        tenant_id: &str,
        conversation_id: &str,
        score: Option<f64>,
        data: Option<serde_json::Value>,
    ) -> Result<(Conversation, Option<TransferOutcome>), TetherError> {
        if score.is_some_and(|s| !(0.0..=1.0).contains(&s)) {
            return Err(TetherError::Validation(
                "qualification score must be within 0.0..=1.0".into(),
            ));
        }
        let updated = self
            .apply_update(
                tenant_id,
                conversation_id,
                None,
                ConversationUpdate::SetQualification { score, data },
            )
            .await?;
        if !updated.is_bot || updated.handoff_state() == HandoffState::Closed {
            return Ok((updated, None));
        }
        let bot = self.bot_config(tenant_id, &updated.instance_id).await?;
        match qualification_trigger(&bot, score) {
            Some(trigger) => {
                let outcome = self.transfer_from_bot(updated, &trigger).await?;
                Ok((outcome.conversation().clone(), Some(outcome)))
            }
            None => Ok((updated, None)),
        }
    }

    pub async fn set_archived(
        &self,
        tenant_id: &str,
        conversation_id: &str,
        expected_version: Option<u64>,
        archived: bool,
    ) -> Result<Conversation, TetherError> {
        self.apply_update(
            tenant_id,
            conversation_id,
            expected_version,
            ConversationUpdate::SetArchived(archived),
        )
        .await
    }

    pub async fn add_tag(
        &self,
        tenant_id: &str,
        conversation_id: &str,
        expected_version: Option<u64>,
        tag: &str,
    ) -> Result<Conversation, TetherError> {
        self.apply_update(
            tenant_id,
            conversation_id,
            expected_version,
            ConversationUpdate::AddTag(tag.to_string()),
        )
        .await
    }

    pub async fn remove_tag(
        &self,
        tenant_id: &str,
        conversation_id: &str,
        expected_version: Option<u64>,
        tag: &str,
    ) -> Result<Conversation, TetherError> {
        self.apply_update(
            tenant_id,
            conversation_id,
            expected_version,
            ConversationUpdate::RemoveTag(tag.to_string()),
        )
        .await
    }

    pub async fn mark_read(
        &self,
        tenant_id: &str,
        conversation_id: &str,
    ) -> Result<Conversation, TetherError> {
        self.apply_update(tenant_id, conversation_id, None, ConversationUpdate::MarkRead)
            .await
    }

    /// Writes a non-ownership update and publishes `conversation_update`.
    pub(crate) async fn apply_update(
        &self,
        tenant_id: &str,
        conversation_id: &str,
        expected_version: Option<u64>,
        update: ConversationUpdate,
    ) -> Result<Conversation, TetherError> {
        let updated = self
            .store
            .update_conversation(tenant_id, conversation_id, expected_version, update)
            .await?;
        debug!(
            tenant_id,
            conversation_id,
            version = updated.version,
            "conversation updated"
        );
        self.bus
            .publish(EventDraft::conversation_update(&updated))
            .await;
        Ok(updated)
    }
}
