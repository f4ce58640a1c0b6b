// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation entity and the typed changes that may be applied to it.
//!
//! Both store implementations apply writes through [`Conversation::apply_change`]
//! and [`Conversation::apply_update`], so the ownership invariants and the
//! member-load bookkeeping live in exactly one place:
//!
//! - a non-closed conversation is owned by the bot (`is_bot`) or by exactly
//!   one operator (`assigned_operator_id`), never both and never neither;
//! - a closed conversation has no active assignment;
//! - every assignment to a team member produces a `+1` [`LoadChange`] and
//!   every release produces a `-1`, within the same write.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TetherError;
use crate::model::message::{AuditEntry, Message};
use crate::types::{ConversationStatus, Direction, HandoffState, MessageKind};

/// Maximum number of characters kept in `last_message_preview`.
const PREVIEW_CHARS: usize = 120;

/// One dialogue with a contact on a messaging instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    /// Every read and write is scoped to this tenant.
    pub tenant_id: String,
    /// Messaging instance (channel) the conversation runs on.
    pub instance_id: String,
    /// Contact identifier on the channel, e.g. a phone number.
    pub contact_address: String,
    pub contact_display_name: Option<String>,
    pub status: ConversationStatus,
    /// The bot owns the conversation. Never true while an operator is assigned.
    pub is_bot: bool,
    pub assigned_operator_id: Option<String>,
    /// Set with `assigned_operator_id` and cleared with it.
    pub assigned_at: Option<DateTime<Utc>>,
    /// Team whose queue the conversation sits in, with or without an operator.
    pub team_id: Option<String>,
    /// Hidden from default listings and skipped by sweeps.
    pub archived: bool,
    pub tags: BTreeSet<String>,
    /// Inbound messages since an operator last marked the conversation read.
    pub unread_count: u32,
    /// Sent time of the newest non-system message; drives inactivity sweeps.
    pub last_message_at: DateTime<Utc>,
    /// First characters of the newest non-system message.
    pub last_message_preview: Option<String>,
    pub last_message_direction: Option<Direction>,
    /// Lead score in `0.0..=1.0` reported by the bot.
    pub qualification_score: Option<f64>,
    pub qualification_data: Option<serde_json::Value>,
    /// Set only while the status is closed.
    pub closed_at: Option<DateTime<Utc>>,
    pub closed_by_operator_id: Option<String>,
    /// Operator that owned the conversation when it was closed.
    pub previous_operator_id: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Incremented by every transition and update; used for compare-and-set.
    pub version: u64,
}

impl Conversation {
    pub fn handoff_state(&self) -> HandoffState {
        match (self.status, self.is_bot) {
            (ConversationStatus::Closed, _) => HandoffState::Closed,
            (_, false) => HandoffState::HumanOpen,
            (ConversationStatus::Open, true) => HandoffState::BotActive,
            (ConversationStatus::Pending, true) => HandoffState::BotPending,
        }
    }

    /// Checks the mutually exclusive ownership invariant.
    pub fn ownership_is_consistent(&self) -> bool {
        match self.status {
            ConversationStatus::Closed => self.assigned_operator_id.is_none(),
            _ => self.is_bot != self.assigned_operator_id.is_some(),
        }
    }

    /// The (team, operator) pair whose load counter this conversation occupies.
    pub fn occupied_slot(&self) -> Option<(&str, &str)> {
        if self.status == ConversationStatus::Closed {
            return None;
        }
        match (&self.team_id, &self.assigned_operator_id) {
            (Some(team), Some(op)) => Some((team.as_str(), op.as_str())),
            _ => None,
        }
    }

    fn release_slot(&self) -> Option<LoadChange> {
        self.occupied_slot()
            .map(|(team, op)| LoadChange::release(team, op))
    }

    /// Applies an ownership transition, returning the member-load changes it implies.
    ///
    /// Rejected transitions leave `self` untouched.
    pub fn apply_change(
        &mut self,
        change: &OwnershipChange,
        now: DateTime<Utc>,
    ) -> Result<Vec<LoadChange>, TetherError> {
        let state = self.handoff_state();
        let mut loads = Vec::new();

        match change {
            OwnershipChange::AssignOperator {
                operator_id,
                team_id,
            } => {
                if state == HandoffState::Closed {
                    return Err(self.reject("conversation is closed"));
                }
                if self.assigned_operator_id.as_deref() == Some(operator_id.as_str())
                    && self.team_id == *team_id
                {
                    return Err(self.reject(format!("already assigned to {operator_id}")));
                }
                loads.extend(self.release_slot());
                self.take_operator(operator_id, team_id.as_deref(), now, &mut loads);
            }
            OwnershipChange::ReturnToBot => {
                if state == HandoffState::Closed {
                    return Err(self.reject("conversation is closed"));
                }
                if self.is_bot {
                    return Err(self.reject("conversation is already owned by the bot"));
                }
                loads.extend(self.release_slot());
                self.is_bot = true;
                self.status = ConversationStatus::Pending;
                self.assigned_operator_id = None;
                self.assigned_at = None;
                self.team_id = None;
                self.qualification_score = None;
                self.qualification_data = None;
            }
            OwnershipChange::QueueForTeam { team_id } => {
                if !matches!(state, HandoffState::BotPending | HandoffState::BotActive) {
                    return Err(self.reject("only bot-owned conversations can be queued"));
                }
                self.team_id = Some(team_id.clone());
            }
            OwnershipChange::Close { closed_by } => {
                if state == HandoffState::Closed {
                    return Err(self.reject("conversation is already closed"));
                }
                loads.extend(self.release_slot());
                self.previous_operator_id = self.assigned_operator_id.take();
                self.assigned_at = None;
                self.status = ConversationStatus::Closed;
                self.closed_at = Some(now);
                self.closed_by_operator_id = closed_by.clone();
            }
            OwnershipChange::ReopenToBot => {
                if state != HandoffState::Closed {
                    return Err(self.reject("only closed conversations can be reopened"));
                }
                self.clear_closure();
                self.is_bot = true;
                self.status = ConversationStatus::Pending;
                self.team_id = None;
            }
            OwnershipChange::ReopenToOperator {
                operator_id,
                team_id,
            } => {
                if state != HandoffState::Closed {
                    return Err(self.reject("only closed conversations can be reopened"));
                }
                self.clear_closure();
                self.take_operator(operator_id, team_id.as_deref(), now, &mut loads);
            }
        }

        self.version += 1;
        Ok(loads)
    }

    fn take_operator(
        &mut self,
        operator_id: &str,
        team_id: Option<&str>,
        now: DateTime<Utc>,
        loads: &mut Vec<LoadChange>,
    ) {
        self.is_bot = false;
        self.status = ConversationStatus::Open;
        self.assigned_operator_id = Some(operator_id.to_string());
        self.assigned_at = Some(now);
        self.team_id = team_id.map(str::to_string);
        if let Some(team) = team_id {
            loads.push(LoadChange::assign(team, operator_id, now));
        }
    }

    fn clear_closure(&mut self) {
        self.closed_at = None;
        self.closed_by_operator_id = None;
        self.previous_operator_id = None;
    }

    /// Applies a non-ownership update.
    pub fn apply_update(&mut self, update: &ConversationUpdate) -> Result<(), TetherError> {
        match update {
            ConversationUpdate::SetArchived(archived) => self.archived = *archived,
            ConversationUpdate::AddTag(tag) => {
                let tag = tag.trim();
                if tag.is_empty() {
                    return Err(TetherError::Validation("tag must not be empty".into()));
                }
                self.tags.insert(tag.to_string());
            }
            ConversationUpdate::RemoveTag(tag) => {
                self.tags.remove(tag.trim());
            }
            ConversationUpdate::MarkRead => self.unread_count = 0,
            ConversationUpdate::SetQualification { score, data } => {
                self.qualification_score = *score;
                self.qualification_data = data.clone();
            }
            ConversationUpdate::SetDisplayName(name) => {
                self.contact_display_name = Some(name.clone());
            }
            ConversationUpdate::MarkBotEngaged => match self.handoff_state() {
                HandoffState::BotPending => self.status = ConversationStatus::Open,
                HandoffState::BotActive => {}
                _ => return Err(self.reject("bot is not the owner")),
            },
        }
        self.version += 1;
        Ok(())
    }

    /// Updates the derived last-message fields for a freshly stored message.
    ///
    /// System messages are audit entries and leave the dialogue fields alone.
    pub fn record_message(&mut self, message: &Message) {
        if message.kind == MessageKind::System {
            return;
        }
        self.last_message_at = message.sent_at;
        self.last_message_direction = Some(message.direction);
        self.last_message_preview = Some(message.content.chars().take(PREVIEW_CHARS).collect());
        if message.direction == Direction::Inbound {
            self.unread_count = self.unread_count.saturating_add(1);
        }
    }

    fn reject(&self, reason: impl Into<String>) -> TetherError {
        TetherError::invalid_transition(&self.id, reason)
    }
}

/// Who owns a conversation at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConversationOwner {
    /// First inbound contact: the bot takes it, status PENDING.
    Bot,
    /// Operator-initiated outreach: status OPEN, assigned to the initiator.
    Operator {
        operator_id: String,
        team_id: Option<String>,
    },
}

/// Request to create a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewConversation {
    pub tenant_id: String,
    pub instance_id: String,
    pub contact_address: String,
    pub contact_display_name: Option<String>,
    pub owner: ConversationOwner,
    pub created_at: DateTime<Utc>,
}

impl NewConversation {
    /// Materializes the conversation and the load change its owner implies.
    pub fn into_conversation(self) -> (Conversation, Vec<LoadChange>) {
        let created_at = self.created_at;
        let mut conversation = Conversation {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: self.tenant_id,
            instance_id: self.instance_id,
            contact_address: self.contact_address,
            contact_display_name: self.contact_display_name,
            status: ConversationStatus::Pending,
            is_bot: true,
            assigned_operator_id: None,
            assigned_at: None,
            team_id: None,
            archived: false,
            tags: BTreeSet::new(),
            unread_count: 0,
            last_message_at: created_at,
            last_message_preview: None,
            last_message_direction: None,
            qualification_score: None,
            qualification_data: None,
            closed_at: None,
            closed_by_operator_id: None,
            previous_operator_id: None,
            created_at,
            version: 0,
        };
        let mut loads = Vec::new();
        if let ConversationOwner::Operator {
            operator_id,
            team_id,
        } = &self.owner
        {
            conversation.take_operator(operator_id, team_id.as_deref(), created_at, &mut loads);
        }
        (conversation, loads)
    }
}

/// Ownership transitions of the handoff state machine.
///
/// Each variant carries only what that transition may write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OwnershipChange {
    /// Hand to an operator (HUMAN_OPEN). Also used for reassignment.
    AssignOperator {
        operator_id: String,
        team_id: Option<String>,
    },
    /// Back to BOT_PENDING with a fresh qualification cycle.
    ReturnToBot,
    /// Keep bot ownership but record the team waiting to pick it up.
    QueueForTeam { team_id: String },
    Close { closed_by: Option<String> },
    ReopenToBot,
    ReopenToOperator {
        operator_id: String,
        team_id: Option<String>,
    },
}

/// Non-ownership updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ConversationUpdate {
    SetArchived(bool),
    AddTag(String),
    RemoveTag(String),
    MarkRead,
    SetQualification {
        score: Option<f64>,
        data: Option<serde_json::Value>,
    },
    SetDisplayName(String),
    /// BOT_PENDING -> BOT_ACTIVE once the bot replies.
    MarkBotEngaged,
}

/// A delta on a team member's `active_conversation_count`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadChange {
    pub team_id: String,
    pub operator_id: String,
    pub delta: i32,
    /// Set on assignment; becomes the member's `last_assigned_at`.
    pub assigned_at: Option<DateTime<Utc>>,
}

impl LoadChange {
    pub fn assign(team_id: &str, operator_id: &str, at: DateTime<Utc>) -> Self {
        Self {
            team_id: team_id.to_string(),
            operator_id: operator_id.to_string(),
            delta: 1,
            assigned_at: Some(at),
        }
    }

    pub fn release(team_id: &str, operator_id: &str) -> Self {
        Self {
            team_id: team_id.to_string(),
            operator_id: operator_id.to_string(),
            delta: -1,
            assigned_at: None,
        }
    }
}

/// An ownership transition plus its audit entry, committed atomically.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionCommit {
    pub tenant_id: String,
    pub conversation_id: String,
    /// The commit fails with `InvalidTransition` if the stored version differs.
    pub expected_version: u64,
    pub change: OwnershipChange,
    pub audit: AuditEntry,
    pub at: DateTime<Utc>,
}

impl TransitionCommit {
    pub fn new(
        conversation: &Conversation,
        change: OwnershipChange,
        audit: AuditEntry,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            tenant_id: conversation.tenant_id.clone(),
            conversation_id: conversation.id.clone(),
            expected_version: conversation.version,
            change,
            audit,
            at,
        }
    }

    pub fn audit_message(&self) -> Message {
        Message::system(&self.tenant_id, &self.conversation_id, &self.audit, self.at)
    }

    pub fn check_version(&self, stored: &Conversation) -> Result<(), TetherError> {
        if stored.version != self.expected_version {
            return Err(TetherError::invalid_transition(
                &stored.id,
                format!(
                    "conversation changed concurrently (expected version {}, found {})",
                    self.expected_version, stored.version
                ),
            ));
        }
        Ok(())
    }
}

/// Result of a committed transition.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionOutcome {
    pub conversation: Conversation,
    pub audit_message: Message,
    pub load_changes: Vec<LoadChange>,
}

/// Query filter for conversation lookups. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationFilter {
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub statuses: Vec<ConversationStatus>,
    pub is_bot: Option<bool>,
    pub archived: Option<bool>,
    pub team_id: Option<String>,
    pub assigned_operator_id: Option<String>,
    pub last_message_before: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl ConversationFilter {
    pub fn for_tenant(tenant_id: &str) -> Self {
        Self {
            tenant_id: Some(tenant_id.to_string()),
            ..Self::default()
        }
    }

    pub fn matches(&self, conversation: &Conversation) -> bool {
        self.tenant_id
            .as_deref()
            .is_none_or(|t| t == conversation.tenant_id)
            && (self.statuses.is_empty() || self.statuses.contains(&conversation.status))
            && self.is_bot.is_none_or(|b| b == conversation.is_bot)
            && self.archived.is_none_or(|a| a == conversation.archived)
            && self
                .team_id
                .as_deref()
                .is_none_or(|t| conversation.team_id.as_deref() == Some(t))
            && self
                .assigned_operator_id
                .as_deref()
                .is_none_or(|op| conversation.assigned_operator_id.as_deref() == Some(op))
            && self
                .last_message_before
                .is_none_or(|before| conversation.last_message_at < before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::message::{Actor, AuditEvent};

    fn bot_conversation() -> Conversation {
        NewConversation {
            tenant_id: "t1".into(),
            instance_id: "inst-1".into(),
            contact_address: "+5511999990000".into(),
            contact_display_name: Some("Ana".into()),
            owner: ConversationOwner::Bot,
            created_at: Utc::now(),
        }
        .into_conversation()
        .0
    }

    fn assign(op: &str, team: Option<&str>) -> OwnershipChange {
        OwnershipChange::AssignOperator {
            operator_id: op.into(),
            team_id: team.map(Into::into),
        }
    }

    #[test]
    fn new_bot_conversation_is_pending_and_unassigned() {
        let c = bot_conversation();
        assert_eq!(c.handoff_state(), HandoffState::BotPending);
        assert!(c.ownership_is_consistent());
        assert_eq!(c.version, 0);
    }

    #[test]
    fn operator_outreach_starts_open_and_loads_the_team_member() {
        let (c, loads) = NewConversation {
            tenant_id: "t1".into(),
            instance_id: "inst-1".into(),
            contact_address: "+1".into(),
            contact_display_name: None,
            owner: ConversationOwner::Operator {
                operator_id: "op-1".into(),
                team_id: Some("team-a".into()),
            },
            created_at: Utc::now(),
        }
        .into_conversation();
        assert_eq!(c.handoff_state(), HandoffState::HumanOpen);
        assert_eq!(c.assigned_operator_id.as_deref(), Some("op-1"));
        assert_eq!(loads.len(), 1);
        assert_eq!(loads[0].delta, 1);
    }

    #[test]
    fn assignment_then_reassignment_moves_load_symmetrically() {
        let mut c = bot_conversation();
        let now = Utc::now();
        let loads = c.apply_change(&assign("op-1", Some("team-a")), now).unwrap();
        assert_eq!(loads, vec![LoadChange::assign("team-a", "op-1", now)]);
        assert_eq!(c.handoff_state(), HandoffState::HumanOpen);

        let loads = c.apply_change(&assign("op-2", Some("team-a")), now).unwrap();
        assert_eq!(loads.len(), 2);
        assert_eq!(loads[0], LoadChange::release("team-a", "op-1"));
        assert_eq!(loads[1].operator_id, "op-2");
        assert_eq!(c.version, 2);
        assert!(c.ownership_is_consistent());
    }

    #[test]
    fn assigning_the_same_operator_twice_is_rejected() {
        let mut c = bot_conversation();
        c.apply_change(&assign("op-1", None), Utc::now()).unwrap();
        let before = c.clone();
        let err = c.apply_change(&assign("op-1", None), Utc::now()).unwrap_err();
        assert!(matches!(err, TetherError::InvalidTransition { .. }));
        assert_eq!(c, before);
    }

    #[test]
    fn return_to_bot_resets_qualification_and_frees_the_operator() {
        let mut c = bot_conversation();
        c.qualification_score = Some(0.9);
        c.qualification_data = Some(serde_json::json!({"budget": 100}));
        c.apply_change(&assign("op-1", Some("team-a")), Utc::now())
            .unwrap();
        assert_eq!(c.qualification_score, Some(0.9), "handoff keeps qualification");

        let loads = c.apply_change(&OwnershipChange::ReturnToBot, Utc::now()).unwrap();
        assert_eq!(loads, vec![LoadChange::release("team-a", "op-1")]);
        assert_eq!(c.handoff_state(), HandoffState::BotPending);
        assert!(c.qualification_score.is_none());
        assert!(c.qualification_data.is_none());
        assert!(c.assigned_operator_id.is_none());
    }

    #[test]
    fn return_to_bot_on_a_bot_conversation_is_rejected() {
        let mut c = bot_conversation();
        assert!(c.apply_change(&OwnershipChange::ReturnToBot, Utc::now()).is_err());
    }

    #[test]
    fn closing_records_previous_owner_and_releases_load() {
        let mut c = bot_conversation();
        c.apply_change(&assign("op-1", Some("team-a")), Utc::now())
            .unwrap();
        let loads = c
            .apply_change(
                &OwnershipChange::Close {
                    closed_by: Some("op-1".into()),
                },
                Utc::now(),
            )
            .unwrap();
        assert_eq!(loads, vec![LoadChange::release("team-a", "op-1")]);
        assert_eq!(c.handoff_state(), HandoffState::Closed);
        assert!(c.assigned_operator_id.is_none());
        assert_eq!(c.previous_operator_id.as_deref(), Some("op-1"));
        assert_eq!(c.closed_by_operator_id.as_deref(), Some("op-1"));
        assert!(c.occupied_slot().is_none());
        assert!(c.ownership_is_consistent());
    }

    #[test]
    fn closing_twice_is_rejected() {
        let mut c = bot_conversation();
        let close = OwnershipChange::Close { closed_by: None };
        c.apply_change(&close, Utc::now()).unwrap();
        let err = c.apply_change(&close, Utc::now()).unwrap_err();
        assert!(err.to_string().contains("already closed"));
    }

    #[test]
    fn reopen_to_operator_restores_assignment() {
        let mut c = bot_conversation();
        c.apply_change(&assign("op-1", Some("team-a")), Utc::now())
            .unwrap();
        c.apply_change(&OwnershipChange::Close { closed_by: None }, Utc::now())
            .unwrap();
        let loads = c
            .apply_change(
                &OwnershipChange::ReopenToOperator {
                    operator_id: "op-1".into(),
                    team_id: Some("team-a".into()),
                },
                Utc::now(),
            )
            .unwrap();
        assert_eq!(loads.len(), 1);
        assert_eq!(c.handoff_state(), HandoffState::HumanOpen);
        assert!(c.closed_at.is_none());
    }

    #[test]
    fn queue_for_team_keeps_bot_ownership() {
        let mut c = bot_conversation();
        let loads = c
            .apply_change(
                &OwnershipChange::QueueForTeam {
                    team_id: "team-a".into(),
                },
                Utc::now(),
            )
            .unwrap();
        assert!(loads.is_empty());
        assert!(c.is_bot);
        assert_eq!(c.team_id.as_deref(), Some("team-a"));
        assert!(c.occupied_slot().is_none());
    }

    #[test]
    fn inbound_messages_update_unread_but_system_messages_do_not() {
        let mut c = bot_conversation();
        let later = c.created_at + chrono::Duration::minutes(5);
        c.record_message(&Message::inbound("t1", &c.id.clone(), "hi", None, later));
        assert_eq!(c.unread_count, 1);
        assert_eq!(c.last_message_at, later);
        assert_eq!(c.last_message_direction, Some(Direction::Inbound));

        let audit = AuditEntry::new(AuditEvent::BotDisabled, Actor::System, "x");
        let much_later = later + chrono::Duration::hours(1);
        c.record_message(&Message::system("t1", &c.id.clone(), &audit, much_later));
        assert_eq!(c.last_message_at, later);
        assert_eq!(c.unread_count, 1);
    }

    #[test]
    fn bot_engaged_moves_pending_to_active_only() {
        let mut c = bot_conversation();
        c.apply_update(&ConversationUpdate::MarkBotEngaged).unwrap();
        assert_eq!(c.handoff_state(), HandoffState::BotActive);
        c.apply_change(&assign("op-1", None), Utc::now()).unwrap();
        assert!(c.apply_update(&ConversationUpdate::MarkBotEngaged).is_err());
    }

    #[test]
    fn version_check_rejects_stale_commits() {
        let mut c = bot_conversation();
        let commit = TransitionCommit::new(
            &c,
            OwnershipChange::ReturnToBot,
            AuditEntry::new(AuditEvent::BotEnabled, Actor::System, ""),
            Utc::now(),
        );
        c.version += 1;
        assert!(commit.check_version(&c).is_err());
    }

    #[test]
    fn filter_matches_reactivation_candidates() {
        let mut c = bot_conversation();
        c.apply_change(&assign("op-1", None), Utc::now()).unwrap();
        c.last_message_at = Utc::now() - chrono::Duration::hours(50);
        let filter = ConversationFilter {
            statuses: vec![ConversationStatus::Open],
            is_bot: Some(false),
            archived: Some(false),
            last_message_before: Some(Utc::now() - chrono::Duration::hours(48)),
            ..ConversationFilter::default()
        };
        assert!(filter.matches(&c));
        c.archived = true;
        assert!(!filter.matches(&c));
    }
}
