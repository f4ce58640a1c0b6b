// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain model of the conversation engine.

pub mod bot;
pub mod conversation;
pub mod event;
pub mod follow_up;
pub mod message;
pub mod team;

pub use bot::{BotConfig, BotTemplates, BusinessHours, ModelParams};
pub use conversation::{
    Conversation, ConversationFilter, ConversationOwner, ConversationUpdate, LoadChange,
    NewConversation, OwnershipChange, TransitionCommit, TransitionOutcome,
};
pub use event::{Event, EventDraft, EventKind};
pub use follow_up::{FollowUpAction, FollowUpRule, FollowUpTrigger, NewFollowUpRule, RuleScope};
pub use message::{Actor, AuditEntry, AuditEvent, Message};
pub use team::{NewMember, NewTeam, Team, TeamMember, TeamPatch};
