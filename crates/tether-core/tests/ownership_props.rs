// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Property tests: arbitrary transition sequences keep ownership exclusive and
//! the derived load changes balanced.

use std::collections::HashMap;

use chrono::Utc;
use proptest::prelude::*;
use tether_core::model::{Conversation, ConversationOwner, NewConversation, OwnershipChange};

fn change_strategy() -> impl Strategy<Value = OwnershipChange> {
    let operator = prop::sample::select(vec!["op-1", "op-2", "op-3"]);
    let team = prop::option::of(prop::sample::select(vec!["team-a", "team-b"]));
    prop_oneof![
        (operator.clone(), team.clone()).prop_map(|(op, team)| OwnershipChange::AssignOperator {
            operator_id: op.to_string(),
            team_id: team.map(str::to_string),
        }),
        Just(OwnershipChange::ReturnToBot),
        Just(OwnershipChange::QueueForTeam {
            team_id: "team-a".to_string()
        }),
        Just(OwnershipChange::Close { closed_by: None }),
        Just(OwnershipChange::ReopenToBot),
        (operator, team).prop_map(|(op, team)| OwnershipChange::ReopenToOperator {
            operator_id: op.to_string(),
            team_id: team.map(str::to_string),
        }),
    ]
}

fn fresh() -> Conversation {
    NewConversation {
        tenant_id: "t1".into(),
        instance_id: "inst".into(),
        contact_address: "+1".into(),
        contact_display_name: None,
        owner: ConversationOwner::Bot,
        created_at: Utc::now(),
    }
    .into_conversation()
    .0
}

proptest! {
    #[test]
    fn ownership_stays_exclusive_and_load_balances(changes in prop::collection::vec(change_strategy(), 0..40)) {
        let mut conversation = fresh();
        let mut load: HashMap<(String, String), i64> = HashMap::new();

        for change in &changes {
            let before = conversation.clone();
            match conversation.apply_change(change, Utc::now()) {
                Ok(deltas) => {
                    prop_assert_eq!(conversation.version, before.version + 1);
                    for d in deltas {
                        *load.entry((d.team_id, d.operator_id)).or_default() += i64::from(d.delta);
                    }
                }
                Err(_) => prop_assert_eq!(&conversation, &before),
            }
            prop_assert!(conversation.ownership_is_consistent());

            // The counters must describe exactly the slot the conversation occupies.
            let occupied = conversation
                .occupied_slot()
                .map(|(t, o)| (t.to_string(), o.to_string()));
            for (slot, count) in &load {
                let expected = i64::from(occupied.as_ref() == Some(slot));
                prop_assert_eq!(*count, expected, "slot {:?}", slot);
            }
        }
    }
}
