// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Follow-up rules: closed trigger and action variants.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TetherError;
use crate::model::conversation::Conversation;
use crate::types::{ConversationStatus, Direction};

/// Upper bound on trigger windows (90 days).
const MAX_TRIGGER_HOURS: u32 = 24 * 90;

/// Condition under which a rule fires for a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FollowUpTrigger {
    /// Last message was outbound and the contact has been silent for `hours`.
    NoContactReply { hours: u32 },
    /// Last message was inbound and nobody answered for `hours`.
    NoOperatorReply { hours: u32 },
    /// No message in either direction for `hours`.
    Inactivity { hours: u32 },
    /// Conversation carries `tag` and has been inactive for `hours`.
    TaggedInactivity { tag: String, hours: u32 },
}

impl FollowUpTrigger {
    pub fn hours(&self) -> u32 {
        match self {
            FollowUpTrigger::NoContactReply { hours }
            | FollowUpTrigger::NoOperatorReply { hours }
            | FollowUpTrigger::Inactivity { hours }
            | FollowUpTrigger::TaggedInactivity { hours, .. } => *hours,
        }
    }

    /// Conversations whose last message is older than this are candidates.
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::hours(i64::from(self.hours()))
    }

    pub fn matches(&self, conversation: &Conversation, now: DateTime<Utc>) -> bool {
        if conversation.last_message_at >= self.cutoff(now) {
            return false;
        }
        match self {
            FollowUpTrigger::NoContactReply { .. } => {
                conversation.last_message_direction == Some(Direction::Outbound)
            }
            FollowUpTrigger::NoOperatorReply { .. } => {
                conversation.last_message_direction == Some(Direction::Inbound)
            }
            FollowUpTrigger::Inactivity { .. } => true,
            FollowUpTrigger::TaggedInactivity { tag, .. } => conversation.tags.contains(tag),
        }
    }

    fn validate(&self) -> Result<(), TetherError> {
        let hours = self.hours();
        if hours == 0 || hours > MAX_TRIGGER_HOURS {
            return Err(TetherError::Validation(format!(
                "trigger hours must be between 1 and {MAX_TRIGGER_HOURS}, got {hours}"
            )));
        }
        if matches!(self, FollowUpTrigger::TaggedInactivity { tag, .. } if tag.trim().is_empty()) {
            return Err(TetherError::Validation("trigger tag must not be empty".into()));
        }
        Ok(())
    }
}

/// What a rule does when it fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FollowUpAction {
    SendMessage {
        template: String,
        #[serde(default)]
        exclusive: bool,
    },
    SendMessageAndTag {
        template: String,
        tag: String,
        #[serde(default)]
        exclusive: bool,
    },
}

impl FollowUpAction {
    pub fn template(&self) -> &str {
        match self {
            FollowUpAction::SendMessage { template, .. }
            | FollowUpAction::SendMessageAndTag { template, .. } => template,
        }
    }

    /// Exclusive actions stop later rules from firing on the same conversation
    /// within one sweep pass.
    pub fn is_exclusive(&self) -> bool {
        match self {
            FollowUpAction::SendMessage { exclusive, .. }
            | FollowUpAction::SendMessageAndTag { exclusive, .. } => *exclusive,
        }
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            FollowUpAction::SendMessageAndTag { tag, .. } => Some(tag),
            FollowUpAction::SendMessage { .. } => None,
        }
    }

    fn validate(&self) -> Result<(), TetherError> {
        if self.template().trim().is_empty() {
            return Err(TetherError::Validation("action template must not be empty".into()));
        }
        if self.tag().is_some_and(|tag| tag.trim().is_empty()) {
            return Err(TetherError::Validation("action tag must not be empty".into()));
        }
        Ok(())
    }
}

/// Which owner a rule applies to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleScope {
    #[default]
    Any,
    Bot,
    Human,
}

impl RuleScope {
    pub fn admits(self, conversation: &Conversation) -> bool {
        match self {
            RuleScope::Any => true,
            RuleScope::Bot => conversation.is_bot,
            RuleScope::Human => !conversation.is_bot,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowUpRule {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub enabled: bool,
    pub trigger: FollowUpTrigger,
    pub action: FollowUpAction,
    pub max_attempts: u32,
    pub scope: RuleScope,
    /// Rules are evaluated in (created_at, id) order.
    pub created_at: DateTime<Utc>,
}

impl FollowUpRule {
    /// Whether the rule's trigger fires for a sweep-eligible conversation.
    pub fn applies_to(&self, conversation: &Conversation, now: DateTime<Utc>) -> bool {
        conversation.tenant_id == self.tenant_id
            && !conversation.archived
            && conversation.status != ConversationStatus::Closed
            && self.scope.admits(conversation)
            && self.trigger.matches(conversation, now)
    }
}

/// Request to create a follow-up rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFollowUpRule {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub trigger: FollowUpTrigger,
    pub action: FollowUpAction,
    pub max_attempts: u32,
    #[serde(default)]
    pub scope: RuleScope,
}

fn default_enabled() -> bool {
    true
}

impl NewFollowUpRule {
    /// Structural validation. Template syntax is checked by the engine.
    pub fn validate(&self) -> Result<(), TetherError> {
        if self.name.trim().is_empty() {
            return Err(TetherError::Validation("rule name must not be empty".into()));
        }
        if self.max_attempts == 0 {
            return Err(TetherError::Validation("max_attempts must be at least 1".into()));
        }
        self.trigger.validate()?;
        self.action.validate()
    }

    pub fn into_rule(self, tenant_id: &str, created_at: DateTime<Utc>) -> FollowUpRule {
        FollowUpRule {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            name: self.name.trim().to_string(),
            enabled: self.enabled,
            trigger: self.trigger,
            action: self.action,
            max_attempts: self.max_attempts,
            scope: self.scope,
            created_at,
        }
    }
}
