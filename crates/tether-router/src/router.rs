// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Team-level routing with an explicit no-operator fallback.
//!
//! Orchestrates selection: manual mode > online members > configured fallback.

use tether_config::model::{NoOperatorFallback, RoutingConfig};
use tether_core::model::{Team, TeamMember};
use tether_core::{AssignmentMode, TetherError};
use tracing::{debug, info};

use crate::policy;

/// Outcome of routing a conversation to a team.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingDecision {
    pub team_id: String,
    pub operator_id: String,
    pub mode: AssignmentMode,
    /// True when nobody was online and the fallback picked an offline member.
    pub fallback: bool,
    /// Human-readable reason, recorded in the audit message.
    pub reason: String,
}

/// Picks the operator for a team according to its assignment mode.
pub struct AssignmentRouter {
    config: RoutingConfig,
}

impl AssignmentRouter {
    pub fn new(config: RoutingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    /// Routes within `team`. `members` must be the team's members in insertion
    /// order.
    ///
    /// Fails with `ManualAssignmentRequired` for manual (or non-auto-assign)
    /// teams, and with `NoAvailableOperator` when nobody is online and the
    /// fallback is `keep_with_bot`.
    pub fn route(&self, team: &Team, members: &[TeamMember]) -> Result<RoutingDecision, TetherError> {
        let mode = team.effective_mode();
        if mode == AssignmentMode::Manual {
            return Err(TetherError::ManualAssignmentRequired {
                team_id: team.id.clone(),
            });
        }

        let online: Vec<TeamMember> = members.iter().filter(|m| m.is_online).cloned().collect();
        if let Some(chosen) = policy::select(mode, &online) {
            debug!(team_id = %team.id, operator_id = %chosen.operator_id, %mode, "operator selected");
            return Ok(RoutingDecision {
                team_id: team.id.clone(),
                operator_id: chosen.operator_id.clone(),
                mode,
                fallback: false,
                reason: format!("{mode} selection among {} online", online.len()),
            });
        }

        match self.config.no_operator_fallback {
            NoOperatorFallback::AnyMember => {
                let Some(chosen) = policy::select(mode, members) else {
                    return Err(TetherError::NoAvailableOperator {
                        team_id: team.id.clone(),
                    });
                };
                info!(
                    team_id = %team.id,
                    operator_id = %chosen.operator_id,
                    "no operator online, assigning offline member"
                );
                Ok(RoutingDecision {
                    team_id: team.id.clone(),
                    operator_id: chosen.operator_id.clone(),
                    mode,
                    fallback: true,
                    reason: format!("{mode} fallback, no member online"),
                })
            }
            NoOperatorFallback::KeepWithBot => Err(TetherError::NoAvailableOperator {
                team_id: team.id.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tether_core::model::NewTeam;
    use tether_core::{ErrorKind, MemberRole};

    fn team(mode: AssignmentMode, auto_assign: bool) -> Team {
        NewTeam {
            name: "Support".into(),
            assignment_mode: mode,
            auto_assign,
        }
        .into_team("t1", Utc::now())
    }

    fn members(team: &Team, online: &[bool]) -> Vec<TeamMember> {
        online
            .iter()
            .enumerate()
            .map(|(i, &on)| {
                let mut m = TeamMember::new(&team.id, &format!("op-{i}"), MemberRole::Agent, Utc::now());
                m.is_online = on;
                m
            })
            .collect()
    }

    fn router(fallback: NoOperatorFallback) -> AssignmentRouter {
        AssignmentRouter::new(RoutingConfig {
            no_operator_fallback: fallback,
            ..RoutingConfig::default()
        })
    }

    #[test]
    fn skips_offline_members() {
        let t = team(AssignmentMode::RoundRobin, true);
        let decision = router(NoOperatorFallback::KeepWithBot)
            .route(&t, &members(&t, &[false, true, true]))
            .unwrap();
        assert_eq!(decision.operator_id, "op-1");
        assert!(!decision.fallback);
    }

    #[test]
    fn manual_or_disabled_auto_assign_requires_a_human_pick() {
        let r = router(NoOperatorFallback::AnyMember);
        for t in [team(AssignmentMode::Manual, true), team(AssignmentMode::LeastBusy, false)] {
            let err = r.route(&t, &members(&t, &[true])).unwrap_err();
            assert!(matches!(err, TetherError::ManualAssignmentRequired { .. }));
        }
    }

    #[test]
    fn keep_with_bot_reports_no_available_operator() {
        let t = team(AssignmentMode::LeastBusy, true);
        let err = router(NoOperatorFallback::KeepWithBot)
            .route(&t, &members(&t, &[false, false]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoAvailableOperator);
    }

    #[test]
    fn any_member_fallback_picks_offline_member() {
        let t = team(AssignmentMode::LeastBusy, true);
        let mut ms = members(&t, &[false, false]);
        ms[0].active_conversation_count = 3;
        let decision = router(NoOperatorFallback::AnyMember).route(&t, &ms).unwrap();
        assert_eq!(decision.operator_id, "op-1");
        assert!(decision.fallback);
    }

    #[test]
    fn any_member_fallback_on_empty_team_still_fails() {
        let t = team(AssignmentMode::RoundRobin, true);
        let err = router(NoOperatorFallback::AnyMember).route(&t, &[]).unwrap_err();
        assert!(matches!(err, TetherError::NoAvailableOperator { .. }));
    }
}
