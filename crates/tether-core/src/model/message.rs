// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Messages and the audit vocabulary used for system messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::types::{DeliveryStatus, Direction, MessageKind};

/// An append-only message in a conversation.
///
/// Messages are never mutated after insertion. The conversation's derived
/// fields (`last_message_at`, preview, `unread_count`) are updated in the same
/// write that inserts the message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub tenant_id: String,
    pub conversation_id: String,
    pub direction: Direction,
    pub kind: MessageKind,
    pub content: String,
    /// Identifier assigned by the channel transport, if any.
    pub external_id: Option<String>,
    pub status: DeliveryStatus,
    pub sent_at: DateTime<Utc>,
    /// `None` for bot, system, and contact messages.
    pub sent_by_operator_id: Option<String>,
    /// Set for messages produced by sweeps (follow-ups, reactivation).
    pub automated: bool,
    pub metadata: Option<serde_json::Value>,
}

impl Message {
    /// A message received from the contact.
    pub fn inbound(
        tenant_id: &str,
        conversation_id: &str,
        content: &str,
        external_id: Option<String>,
        sent_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            conversation_id: conversation_id.to_string(),
            direction: Direction::Inbound,
            kind: MessageKind::Text,
            content: content.to_string(),
            external_id,
            status: DeliveryStatus::Delivered,
            sent_at,
            sent_by_operator_id: None,
            automated: false,
            metadata: None,
        }
    }

    /// A message sent to the contact by an operator (`Some`) or the bot/system (`None`).
    pub fn outbound(
        tenant_id: &str,
        conversation_id: &str,
        content: &str,
        sent_by_operator_id: Option<String>,
        sent_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            conversation_id: conversation_id.to_string(),
            direction: Direction::Outbound,
            kind: MessageKind::Text,
            content: content.to_string(),
            external_id: None,
            status: DeliveryStatus::Queued,
            sent_at,
            sent_by_operator_id,
            automated: false,
            metadata: None,
        }
    }

    /// An audit trail entry. System messages never reach the contact.
    pub fn system(
        tenant_id: &str,
        conversation_id: &str,
        audit: &AuditEntry,
        sent_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            conversation_id: conversation_id.to_string(),
            direction: Direction::Outbound,
            kind: MessageKind::System,
            content: format!("{}: {}", audit.event, audit.detail),
            external_id: None,
            status: DeliveryStatus::Delivered,
            sent_at,
            sent_by_operator_id: audit.actor.operator_id().map(str::to_string),
            automated: !matches!(audit.actor, Actor::Operator(_)),
            metadata: Some(serde_json::json!({
                "event": audit.event.to_string(),
                "actor": audit.actor.to_string(),
            })),
        }
    }

    pub fn with_receipt(mut self, external_id: Option<String>, status: DeliveryStatus) -> Self {
        self.external_id = external_id;
        self.status = status;
        self
    }

    pub fn automated(mut self) -> Self {
        self.automated = true;
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// The audit event code of a system message.
    pub fn audit_event(&self) -> Option<&str> {
        if self.kind != MessageKind::System {
            return None;
        }
        self.metadata.as_ref()?.get("event")?.as_str()
    }
}

/// Who caused a state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Actor {
    Operator(String),
    Bot,
    /// Scheduled sweeps and engine policies.
    System,
}

impl Actor {
    pub fn operator_id(&self) -> Option<&str> {
        match self {
            Actor::Operator(id) => Some(id),
            _ => None,
        }
    }
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Actor::Operator(id) => write!(f, "operator:{id}"),
            Actor::Bot => write!(f, "bot"),
            Actor::System => write!(f, "system"),
        }
    }
}

/// Audit codes written as system messages for every handoff transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AuditEvent {
    BotDisabled,
    BotEnabled,
    BotReactivated,
    AgentAssigned,
    TransferQueued,
    ConversationClosed,
    ConversationReopened,
}

/// The audit record accompanying a transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub event: AuditEvent,
    pub actor: Actor,
    pub detail: String,
}

impl AuditEntry {
    pub fn new(event: AuditEvent, actor: Actor, detail: impl Into<String>) -> Self {
        Self {
            event,
            actor,
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_message_carries_event_code_and_actor() {
        let audit = AuditEntry::new(
            AuditEvent::AgentAssigned,
            Actor::Operator("op-1".into()),
            "assigned to op-2",
        );
        let msg = Message::system("t1", "c1", &audit, Utc::now());
        assert_eq!(msg.kind, MessageKind::System);
        assert!(msg.content.starts_with("agent_assigned"));
        assert_eq!(msg.audit_event(), Some("agent_assigned"));
        assert_eq!(msg.sent_by_operator_id.as_deref(), Some("op-1"));
        assert!(!msg.automated);
    }

    #[test]
    fn system_actor_messages_are_automated() {
        let audit = AuditEntry::new(AuditEvent::BotReactivated, Actor::System, "inactive");
        let msg = Message::system("t1", "c1", &audit, Utc::now());
        assert!(msg.automated);
        assert!(msg.sent_by_operator_id.is_none());
    }

    #[test]
    fn audit_event_is_none_for_contact_messages() {
        let msg = Message::inbound("t1", "c1", "hello", None, Utc::now());
        assert!(msg.audit_event().is_none());
    }
}
