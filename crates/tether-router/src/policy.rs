// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Member selection policies.
//!
//! Candidates are passed in insertion order; every tie falls back to it.

use tether_core::AssignmentMode;
use tether_core::model::TeamMember;

/// Oldest `last_assigned_at` first, never-assigned members before anyone.
pub fn round_robin(candidates: &[TeamMember]) -> Option<&TeamMember> {
    candidates.iter().min_by_key(|m| m.last_assigned_at)
}

/// Smallest `active_conversation_count`, then oldest `last_assigned_at`.
pub fn least_busy(candidates: &[TeamMember]) -> Option<&TeamMember> {
    candidates
        .iter()
        .min_by_key(|m| (m.active_conversation_count, m.last_assigned_at))
}

/// Applies the policy for `mode`. Manual mode never selects.
pub fn select(mode: AssignmentMode, candidates: &[TeamMember]) -> Option<&TeamMember> {
    match mode {
        AssignmentMode::RoundRobin => round_robin(candidates),
        AssignmentMode::LeastBusy => least_busy(candidates),
        AssignmentMode::Manual => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use tether_core::MemberRole;

    fn member(op: &str, load: u32, assigned_minutes_ago: Option<i64>) -> TeamMember {
        let base = Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap();
        let mut m = TeamMember::new("team", op, MemberRole::Agent, base);
        m.is_online = true;
        m.active_conversation_count = load;
        m.last_assigned_at = assigned_minutes_ago.map(|mins| base - Duration::minutes(mins));
        m
    }

    #[test]
    fn round_robin_prefers_never_assigned() {
        let members = [member("a", 0, Some(5)), member("b", 0, None), member("c", 0, None)];
        assert_eq!(round_robin(&members).unwrap().operator_id, "b");
    }

    #[test]
    fn round_robin_picks_oldest_assignment() {
        let members = [member("a", 0, Some(5)), member("b", 0, Some(30)), member("c", 9, Some(10))];
        assert_eq!(round_robin(&members).unwrap().operator_id, "b");
    }

    #[test]
    fn least_busy_breaks_ties_by_last_assignment_then_order() {
        let members = [
            member("a", 2, None),
            member("b", 1, Some(5)),
            member("c", 1, Some(50)),
            member("d", 1, Some(50)),
        ];
        assert_eq!(least_busy(&members).unwrap().operator_id, "c");
    }

    #[test]
    fn manual_and_empty_select_nobody() {
        let members = [member("a", 0, None)];
        assert!(select(AssignmentMode::Manual, &members).is_none());
        assert!(select(AssignmentMode::RoundRobin, &[]).is_none());
    }
}
