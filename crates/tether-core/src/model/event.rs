// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Events pushed to operator consoles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::model::conversation::Conversation;
use crate::model::message::Message;

/// Event type names as they appear on the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    NewMessage,
    MessageStatus,
    ConversationUpdate,
    ConnectionStatus,
    Typing,
    NewAssignment,
    BotTransfer,
}

/// An event that has not been sequenced yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDraft {
    pub kind: EventKind,
    pub tenant_id: String,
    pub data: serde_json::Value,
}

impl EventDraft {
    pub fn new(kind: EventKind, tenant_id: &str, data: serde_json::Value) -> Self {
        Self {
            kind,
            tenant_id: tenant_id.to_string(),
            data,
        }
    }

    pub fn new_message(conversation: &Conversation, message: &Message) -> Self {
        Self::new(
            EventKind::NewMessage,
            &conversation.tenant_id,
            serde_json::json!({
                "conversation_id": conversation.id,
                "message": message,
                "unread_count": conversation.unread_count,
            }),
        )
    }

    pub fn conversation_update(conversation: &Conversation) -> Self {
        Self::new(
            EventKind::ConversationUpdate,
            &conversation.tenant_id,
            serde_json::json!({ "conversation": conversation }),
        )
    }

    pub fn new_assignment(conversation: &Conversation) -> Self {
        Self::new(
            EventKind::NewAssignment,
            &conversation.tenant_id,
            serde_json::json!({
                "conversation_id": conversation.id,
                "operator_id": conversation.assigned_operator_id,
                "team_id": conversation.team_id,
            }),
        )
    }

    /// `queued` is true when the conversation waits for a team without an operator.
    pub fn bot_transfer(conversation: &Conversation, reason: &str, queued: bool) -> Self {
        Self::new(
            EventKind::BotTransfer,
            &conversation.tenant_id,
            serde_json::json!({
                "conversation_id": conversation.id,
                "operator_id": conversation.assigned_operator_id,
                "team_id": conversation.team_id,
                "reason": reason,
                "queued": queued,
            }),
        )
    }
}

/// A sequenced event. `id` is a strictly increasing millisecond timestamp per
/// process and doubles as the replay cursor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub tenant_id: String,
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}
