// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fairness and minimality properties of the routing policies.

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use tether_config::model::RoutingConfig;
use tether_core::model::{LoadChange, NewTeam, TeamMember};
use tether_core::{AssignmentMode, MemberRole};
use tether_router::AssignmentRouter;

fn online_members(team_id: &str, n: usize) -> Vec<TeamMember> {
    let joined = Utc.with_ymd_and_hms(2026, 2, 2, 8, 0, 0).unwrap();
    (0..n)
        .map(|i| {
            let mut m = TeamMember::new(team_id, &format!("op-{i}"), MemberRole::Agent, joined);
            m.is_online = true;
            m
        })
        .collect()
}

proptest! {
    #[test]
    fn round_robin_gives_everyone_their_share(n in 1usize..8, m in 0usize..64) {
        let team = NewTeam {
            name: "rr".into(),
            assignment_mode: AssignmentMode::RoundRobin,
            auto_assign: true,
        }
        .into_team("t1", Utc::now());
        let router = AssignmentRouter::new(RoutingConfig::default());
        let mut members = online_members(&team.id, n);
        let start = Utc.with_ymd_and_hms(2026, 2, 2, 9, 0, 0).unwrap();

        let mut received = vec![0usize; n];
        for i in 0..m {
            let decision = router.route(&team, &members).unwrap();
            let idx = members
                .iter()
                .position(|x| x.operator_id == decision.operator_id)
                .unwrap();
            received[idx] += 1;
            let at = start + Duration::seconds(i as i64);
            members[idx].apply_load(&LoadChange::assign(&team.id, &decision.operator_id, at));
        }
        for count in received {
            prop_assert!(count >= m / n);
        }
    }

    #[test]
    fn least_busy_selects_a_minimal_member(
        loads in prop::collection::vec((0u32..20, any::<bool>()), 1..10)
    ) {
        let team = NewTeam {
            name: "lb".into(),
            assignment_mode: AssignmentMode::LeastBusy,
            auto_assign: true,
        }
        .into_team("t1", Utc::now());
        let router = AssignmentRouter::new(RoutingConfig::default());
        let mut members = online_members(&team.id, loads.len());
        for (member, (load, online)) in members.iter_mut().zip(&loads) {
            member.active_conversation_count = *load;
            member.is_online = *online;
        }
        let min_online = members
            .iter()
            .filter(|m| m.is_online)
            .map(|m| m.active_conversation_count)
            .min();

        match (router.route(&team, &members), min_online) {
            (Ok(decision), Some(min)) => {
                let chosen = members
                    .iter()
                    .find(|m| m.operator_id == decision.operator_id)
                    .unwrap();
                prop_assert!(chosen.is_online);
                prop_assert_eq!(chosen.active_conversation_count, min);
            }
            (Err(_), None) => {}
            (result, min) => prop_assert!(false, "unexpected {result:?} with min {min:?}"),
        }
    }
}
