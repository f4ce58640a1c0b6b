// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Teams and team membership.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TetherError;
use crate::model::conversation::LoadChange;
use crate::types::{AssignmentMode, MemberRole};

/// A routing group of operators sharing an assignment policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub tenant_id: String,
    /// Unique per tenant.
    pub name: String,
    /// How new conversations pick an operator.
    pub assignment_mode: AssignmentMode,
    /// When false the team never routes automatically, whatever the mode.
    pub auto_assign: bool,
    pub created_at: DateTime<Utc>,
}

impl Team {
    /// The effective mode once `auto_assign` is taken into account.
    pub fn effective_mode(&self) -> AssignmentMode {
        if self.auto_assign {
            self.assignment_mode
        } else {
            AssignmentMode::Manual
        }
    }
}

/// Request to create a team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTeam {
    pub name: String,
    pub assignment_mode: AssignmentMode,
    #[serde(default = "default_auto_assign")]
    pub auto_assign: bool,
}

fn default_auto_assign() -> bool {
    true
}

impl NewTeam {
    pub fn validate(&self) -> Result<(), TetherError> {
        if self.name.trim().is_empty() {
            return Err(TetherError::Validation("team name must not be empty".into()));
        }
        Ok(())
    }

    pub fn into_team(self, tenant_id: &str, created_at: DateTime<Utc>) -> Team {
        Team {
            id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            name: self.name.trim().to_string(),
            assignment_mode: self.assignment_mode,
            auto_assign: self.auto_assign,
            created_at,
        }
    }
}

/// Partial team update. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamPatch {
    pub name: Option<String>,
    pub assignment_mode: Option<AssignmentMode>,
    pub auto_assign: Option<bool>,
}

impl TeamPatch {
    pub fn apply(&self, team: &mut Team) -> Result<(), TetherError> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(TetherError::Validation("team name must not be empty".into()));
            }
            team.name = name.trim().to_string();
        }
        if let Some(mode) = self.assignment_mode {
            team.assignment_mode = mode;
        }
        if let Some(auto) = self.auto_assign {
            team.auto_assign = auto;
        }
        Ok(())
    }
}

/// An operator's membership in a team, with routing state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub team_id: String,
    pub operator_id: String,
    pub role: MemberRole,
    /// Only online members receive automatic assignments.
    pub is_online: bool,
    /// Non-closed conversations of this team assigned to this operator.
    pub active_conversation_count: u32,
    /// Round-robin picks the member with the oldest value, `None` first.
    pub last_assigned_at: Option<DateTime<Utc>>,
    /// Insertion order tie-breaker for routing.
    pub joined_at: DateTime<Utc>,
}

impl TeamMember {
    pub fn new(team_id: &str, operator_id: &str, role: MemberRole, joined_at: DateTime<Utc>) -> Self {
        Self {
            team_id: team_id.to_string(),
            operator_id: operator_id.to_string(),
            role,
            is_online: false,
            active_conversation_count: 0,
            last_assigned_at: None,
            joined_at,
        }
    }

    /// Applies a load delta, clamping the counter at zero.
    pub fn apply_load(&mut self, change: &LoadChange) {
        self.active_conversation_count = apply_delta(self.active_conversation_count, change.delta);
        if let Some(at) = change.assigned_at {
            self.last_assigned_at = Some(at);
        }
    }
}

/// Saturating signed add on an unsigned counter.
pub fn apply_delta(count: u32, delta: i32) -> u32 {
    if delta >= 0 {
        count.saturating_add(delta.unsigned_abs())
    } else {
        count.saturating_sub(delta.unsigned_abs())
    }
}

/// Request to add an operator to a team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMember {
    pub operator_id: String,
    #[serde(default = "default_role")]
    pub role: MemberRole,
    #[serde(default)]
    pub is_online: bool,
}

fn default_role() -> MemberRole {
    MemberRole::Agent
}
