// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Operator selection for conversations that need a human.
//!
//! This crate provides:
//! - [`policy`]: pure round-robin and least-busy member selection
//! - [`AssignmentRouter`]: team-mode dispatch with the configured
//!   no-operator fallback
//!
//! Selection is pure; applying the decision (load counters, conversation
//! ownership) happens in the engine's atomic transition.

pub mod policy;
pub mod router;

pub use router::{AssignmentRouter, RoutingDecision};
