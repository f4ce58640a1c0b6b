// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation engine for Tether.
//!
//! Owns the handoff state machine between the bot and human operators,
//! orchestrates team routing, detects bot transfers, and runs the two
//! scheduled sweeps (inactivity reactivation and follow-up rules).

pub mod admin;
pub mod conversations;
pub mod engine;
pub mod follow_up;
pub mod handoff;
pub mod inbound;
pub mod reactivator;
pub mod summary;
pub mod templates;
pub mod transfer;

pub use engine::ConversationEngine;
pub use follow_up::FollowUpEngine;
pub use handoff::{Outreach, TransferOutcome};
pub use inbound::{
    ConnectionUpdate, HandoffFailure, InboundMessage, InboundOutcome, StatusUpdate, TypingUpdate,
};
pub use reactivator::InactivityReactivator;
pub use summary::{FollowUpSummary, SweepSummary};
pub use templates::{TemplateRenderer, TemplateVars};
pub use transfer::{KeywordMatcher, TransferTrigger};
