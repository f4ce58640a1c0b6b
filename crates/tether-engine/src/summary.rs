// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Aggregate results returned by the scheduled sweeps.

use serde::{Deserialize, Serialize};

/// Inactivity sweep result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepSummary {
    /// Conversations in the snapshot taken at sweep start.
    pub found: usize,
    pub processed: usize,
    pub errors: usize,
}

/// Follow-up sweep result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowUpSummary {
    /// Enabled rules evaluated.
    pub rules: usize,
    /// (rule, conversation) pairs whose trigger fired.
    pub matched: usize,
    /// Messages sent.
    pub processed: usize,
    /// Pairs passed over: attempts exhausted, or claimed by an exclusive rule.
    pub skipped: usize,
    pub errors: usize,
}

impl FollowUpSummary {
    pub(crate) fn absorb(&mut self, other: FollowUpSummary) {
        self.rules += other.rules;
        self.matched += other.matched;
        self.processed += other.processed;
        self.skipped += other.skipped;
        self.errors += other.errors;
    }
}
