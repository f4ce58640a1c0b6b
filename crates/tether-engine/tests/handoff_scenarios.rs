// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end handoff flows through the engine, store, bus, and mock channel.

use tether_config::{NoOperatorFallback, ReopenUnowned};
use tether_core::model::{Actor, ConversationFilter, ConversationOwner, EventKind, NewConversation};
use tether_core::{
    AssignmentMode, Clock, ConversationStatus, Direction, ErrorKind,
    HandoffState,
};
use tether_engine::{Outreach, TransferOutcome};
use tether_test_utils::{INSTANCE, TENANT, TestHarness};

async fn audit_events(h: &TestHarness, conversation_id: &str) -> Vec<String> {
    h.engine
        .list_messages(TENANT, conversation_id, None)
        .await
        .unwrap()
        .iter()
        .filter_map(|m| m.audit_event().map(str::to_string))
        .collect()
}

/// Sum of member loads equals the number of open conversations occupying a slot.
async fn assert_load_matches(h: &TestHarness) {
    let conversations = h
        .engine
        .list_conversations(&ConversationFilter::for_tenant(TENANT))
        .await
        .unwrap();
    for team in h.engine.list_teams(TENANT).await.unwrap() {
        for member in h.engine.list_members(TENANT, &team.id).await.unwrap() {
            let occupied = conversations
                .iter()
                .filter(|c| c.occupied_slot() == Some((team.id.as_str(), member.operator_id.as_str())))
                .count() as u32;
            assert_eq!(
                member.active_conversation_count, occupied,
                "load of {} in {}",
                member.operator_id, team.name
            );
        }
    }
    assert!(conversations.iter().all(|c| c.ownership_is_consistent()));
}

#[tokio::test]
async fn keyword_transfers_to_online_operator() {
    let h = TestHarness::new().await.unwrap();
    let team = h
        .team("support", AssignmentMode::RoundRobin, &[("op-1", true)])
        .await
        .unwrap();
    h.enable_bot(&["human"], Some(&team.id)).await.unwrap();

    let first = h.inbound("+5511999", "hello").await.unwrap();
    assert!(first.created);
    assert!(first.transfer.is_none());
    assert_eq!(first.conversation.handoff_state(), HandoffState::BotPending);

    let second = h.inbound("+5511999", "I want a HUMAN now").await.unwrap();
    assert!(!second.created);
    let Some(TransferOutcome::Assigned { conversation, decision }) = second.transfer else {
        panic!("expected an assignment");
    };
    assert_eq!(decision.operator_id, "op-1");
    assert_eq!(conversation.handoff_state(), HandoffState::HumanOpen);
    assert_eq!(conversation.assigned_operator_id.as_deref(), Some("op-1"));
    assert_eq!(conversation.team_id.as_deref(), Some(team.id.as_str()));

    assert_eq!(h.load_of(&team.id, "op-1").await.unwrap(), 1);
    assert_eq!(audit_events(&h, &conversation.id).await, vec!["agent_assigned"]);

    let kinds: Vec<EventKind> = h
        .bus
        .recent(TENANT, None)
        .await
        .into_iter()
        .map(|e| e.kind)
        .collect();
    assert!(kinds.contains(&EventKind::BotTransfer));
    assert!(kinds.contains(&EventKind::NewAssignment));
    assert_load_matches(&h).await;
}

#[tokio::test]
async fn transfer_without_online_operator_stays_with_bot() {
    let h = TestHarness::new().await.unwrap();
    let team = h
        .team("support", AssignmentMode::RoundRobin, &[("op-1", false)])
        .await
        .unwrap();
    h.enable_bot(&["human"], Some(&team.id)).await.unwrap();

    let outcome = h.inbound("+1", "human please").await.unwrap();
    let Some(TransferOutcome::Queued { conversation, .. }) = outcome.transfer else {
        panic!("expected the transfer to be queued");
    };
    assert!(conversation.is_bot);
    assert_eq!(conversation.team_id.as_deref(), Some(team.id.as_str()));
    assert_eq!(h.load_of(&team.id, "op-1").await.unwrap(), 0);

    // Asking again does not write a second audit entry.
    let again = h.inbound("+1", "human!!").await.unwrap();
    assert!(matches!(again.transfer, Some(TransferOutcome::Queued { .. })));
    assert_eq!(audit_events(&h, &conversation.id).await, vec!["transfer_queued"]);
}

#[tokio::test]
async fn any_member_fallback_assigns_offline_operator() {
    let h = TestHarness::builder()
        .with_fallback(NoOperatorFallback::AnyMember)
        .build()
        .await
        .unwrap();
    let team = h
        .team("support", AssignmentMode::LeastBusy, &[("op-1", false)])
        .await
        .unwrap();
    h.enable_bot(&["human"], Some(&team.id)).await.unwrap();

    let outcome = h.inbound("+1", "human").await.unwrap();
    let Some(TransferOutcome::Assigned { conversation, decision }) = outcome.transfer else {
        panic!("expected an assignment");
    };
    assert!(decision.fallback);
    assert_eq!(conversation.assigned_operator_id.as_deref(), Some("op-1"));
    assert_eq!(h.load_of(&team.id, "op-1").await.unwrap(), 1);
}

#[tokio::test]
async fn manual_team_queues_until_someone_assigns() {
    let h = TestHarness::new().await.unwrap();
    let team = h
        .team("vip", AssignmentMode::Manual, &[("op-1", true)])
        .await
        .unwrap();
    h.enable_bot(&["human"], Some(&team.id)).await.unwrap();

    let outcome = h.inbound("+1", "human").await.unwrap();
    let queued = outcome.transfer.unwrap().conversation().clone();
    assert!(queued.is_bot);

    let assigned = h
        .engine
        .assign(
            TENANT,
            &queued.id,
            "op-1",
            Some(&team.id),
            None,
            Actor::Operator("supervisor".into()),
        )
        .await
        .unwrap();
    assert_eq!(assigned.handoff_state(), HandoffState::HumanOpen);
    assert_eq!(h.load_of(&team.id, "op-1").await.unwrap(), 1);
    assert_load_matches(&h).await;
}

#[tokio::test]
async fn disabled_bot_without_team_only_notifies() {
    let h = TestHarness::new().await.unwrap();

    let outcome = h.inbound("+1", "anyone there?").await.unwrap();
    assert!(matches!(outcome.transfer, Some(TransferOutcome::Unrouted { .. })));
    assert!(outcome.conversation.is_bot);
    let transfers = h
        .bus
        .recent(TENANT, None)
        .await
        .into_iter()
        .filter(|e| e.kind == EventKind::BotTransfer)
        .count();
    assert_eq!(transfers, 1);
}

#[tokio::test]
async fn concurrent_takeover_has_one_winner() {
    let h = TestHarness::new().await.unwrap();
    let team = h
        .team("support", AssignmentMode::Manual, &[("op-1", true), ("op-2", true)])
        .await
        .unwrap();
    h.enable_bot(&["human"], Some(&team.id)).await.unwrap();
    let conversation = h.inbound("+1", "human").await.unwrap().conversation;
    assert_eq!(conversation.team_id.as_deref(), Some(team.id.as_str()));

    let (a, b) = tokio::join!(
        h.engine.disable_bot(TENANT, &conversation.id, "op-1"),
        h.engine.disable_bot(TENANT, &conversation.id, "op-2"),
    );
    let results = [a, b];
    let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(winners.len(), 1);
    let loser = results.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert_eq!(loser.kind(), ErrorKind::InvalidTransition);

    let winner = winners[0].assigned_operator_id.clone().unwrap();
    let loads = h.load_of(&team.id, "op-1").await.unwrap() + h.load_of(&team.id, "op-2").await.unwrap();
    assert_eq!(loads, 1);
    assert_eq!(h.load_of(&team.id, &winner).await.unwrap(), 1);
}

#[tokio::test]
async fn stale_assignment_is_rejected() {
    let h = TestHarness::new().await.unwrap();
    let team = h
        .team("support", AssignmentMode::Manual, &[("op-1", true), ("op-2", true)])
        .await
        .unwrap();
    h.enable_bot(&[], Some(&team.id)).await.unwrap();
    let seen = h.inbound("+1", "hi").await.unwrap().conversation;

    let (a, b) = tokio::join!(
        h.engine.assign(TENANT, &seen.id, "op-1", Some(&team.id), Some(seen.version), Actor::System),
        h.engine.assign(TENANT, &seen.id, "op-2", Some(&team.id), Some(seen.version), Actor::System),
    );
    assert!(a.is_ok() ^ b.is_ok());
    let err = a.err().or(b.err()).unwrap();
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);
    assert_load_matches(&h).await;
}

#[tokio::test]
async fn enable_bot_releases_operator_and_resets_qualification() {
    let h = TestHarness::new().await.unwrap();
    let team = h
        .team("support", AssignmentMode::Manual, &[("op-1", true)])
        .await
        .unwrap();
    h.enable_bot(&["human"], Some(&team.id)).await.unwrap();
    let conversation = h.inbound("+1", "human").await.unwrap().conversation;
    h.engine
        .set_qualification(TENANT, &conversation.id, Some(0.4), None)
        .await
        .unwrap();
    h.engine.disable_bot(TENANT, &conversation.id, "op-1").await.unwrap();
    assert_eq!(h.load_of(&team.id, "op-1").await.unwrap(), 1);

    let back = h
        .engine
        .enable_bot(TENANT, &conversation.id, Actor::Operator("op-1".into()))
        .await
        .unwrap();
    assert_eq!(back.handoff_state(), HandoffState::BotPending);
    assert!(back.qualification_score.is_none());
    assert!(back.assigned_operator_id.is_none());
    assert_eq!(h.load_of(&team.id, "op-1").await.unwrap(), 0);

    let err = h
        .engine
        .enable_bot(TENANT, &conversation.id, Actor::System)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);
}

#[tokio::test]
async fn qualification_over_threshold_transfers() {
    let h = TestHarness::new().await.unwrap();
    let team = h
        .team("sales", AssignmentMode::RoundRobin, &[("op-1", true)])
        .await
        .unwrap();
    let mut bot = h.enable_bot(&[], Some(&team.id)).await.unwrap();
    bot.qualification_threshold = Some(0.7);
    h.engine.put_bot_config(bot).await.unwrap();
    let conversation = h.inbound("+1", "hi").await.unwrap().conversation;

    let (_, transfer) = h
        .engine
        .set_qualification(TENANT, &conversation.id, Some(0.5), None)
        .await
        .unwrap();
    assert!(transfer.is_none());

    let (updated, transfer) = h
        .engine
        .set_qualification(TENANT, &conversation.id, Some(0.9), Some(serde_json::json!({"budget": "high"})))
        .await
        .unwrap();
    assert!(matches!(transfer, Some(TransferOutcome::Assigned { .. })));
    assert_eq!(updated.handoff_state(), HandoffState::HumanOpen);

    let err = h
        .engine
        .set_qualification(TENANT, &conversation.id, Some(1.5), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn closed_conversation_reopens_to_previous_operator() {
    let h = TestHarness::new().await.unwrap();
    let team = h
        .team("support", AssignmentMode::RoundRobin, &[("op-1", true)])
        .await
        .unwrap();
    h.enable_bot(&["human"], Some(&team.id)).await.unwrap();
    let conversation = h.inbound("+1", "human").await.unwrap().conversation;

    let closed = h
        .engine
        .close(TENANT, &conversation.id, Some("op-1"), false)
        .await
        .unwrap();
    assert_eq!(closed.status, ConversationStatus::Closed);
    assert_eq!(closed.previous_operator_id.as_deref(), Some("op-1"));
    assert_eq!(h.load_of(&team.id, "op-1").await.unwrap(), 0);

    let outcome = h.inbound("+1", "one more thing").await.unwrap();
    assert!(outcome.reopened);
    assert_eq!(outcome.conversation.id, conversation.id);
    assert_eq!(outcome.conversation.handoff_state(), HandoffState::HumanOpen);
    assert_eq!(outcome.conversation.assigned_operator_id.as_deref(), Some("op-1"));
    assert_eq!(h.load_of(&team.id, "op-1").await.unwrap(), 1);
    assert_eq!(
        audit_events(&h, &conversation.id).await,
        vec!["agent_assigned", "conversation_closed", "conversation_reopened"]
    );
    assert_load_matches(&h).await;
}

#[tokio::test]
async fn closed_bot_conversation_reopens_to_bot() {
    let h = TestHarness::new().await.unwrap();
    h.enable_bot(&[], None).await.unwrap();
    let conversation = h.inbound("+1", "hi").await.unwrap().conversation;
    h.engine.close(TENANT, &conversation.id, None, false).await.unwrap();

    let outcome = h.inbound("+1", "hello again").await.unwrap();
    assert!(outcome.reopened);
    assert_eq!(outcome.conversation.handoff_state(), HandoffState::BotPending);
}

async fn insert_unowned_closed(h: &TestHarness, team_id: &str) -> String {
    let (mut conversation, _) = NewConversation {
        tenant_id: TENANT.into(),
        instance_id: INSTANCE.into(),
        contact_address: "+9".into(),
        contact_display_name: None,
        owner: ConversationOwner::Bot,
        created_at: h.clock.now(),
    }
    .into_conversation();
    conversation.is_bot = false;
    conversation.status = ConversationStatus::Closed;
    conversation.team_id = Some(team_id.to_string());
    let id = conversation.id.clone();
    h.memory
        .as_ref()
        .unwrap()
        .insert_conversation(conversation)
        .await;
    id
}

#[tokio::test]
async fn unowned_reopen_defaults_to_bot() {
    let h = TestHarness::new().await.unwrap();
    let team = h
        .team("support", AssignmentMode::RoundRobin, &[("op-1", true)])
        .await
        .unwrap();
    h.enable_bot(&[], Some(&team.id)).await.unwrap();
    let id = insert_unowned_closed(&h, &team.id).await;

    let outcome = h.inbound("+9", "back").await.unwrap();
    assert_eq!(outcome.conversation.id, id);
    assert_eq!(outcome.conversation.handoff_state(), HandoffState::BotPending);
    assert_eq!(h.load_of(&team.id, "op-1").await.unwrap(), 0);
}

#[tokio::test]
async fn unowned_reopen_routes_to_last_team_when_configured() {
    let h = TestHarness::builder()
        .with_reopen_unowned(ReopenUnowned::Team)
        .build()
        .await
        .unwrap();
    let team = h
        .team("support", AssignmentMode::RoundRobin, &[("op-1", true)])
        .await
        .unwrap();
    h.enable_bot(&[], Some(&team.id)).await.unwrap();
    insert_unowned_closed(&h, &team.id).await;

    let outcome = h.inbound("+9", "back").await.unwrap();
    assert_eq!(outcome.conversation.handoff_state(), HandoffState::HumanOpen);
    assert_eq!(outcome.conversation.assigned_operator_id.as_deref(), Some("op-1"));
    assert_eq!(h.load_of(&team.id, "op-1").await.unwrap(), 1);
}

#[tokio::test]
async fn transfer_between_teams_moves_load() {
    let h = TestHarness::new().await.unwrap();
    let support = h
        .team("support", AssignmentMode::RoundRobin, &[("op-1", true)])
        .await
        .unwrap();
    let billing = h
        .team("billing", AssignmentMode::RoundRobin, &[("op-2", true)])
        .await
        .unwrap();
    h.enable_bot(&["human"], Some(&support.id)).await.unwrap();
    let conversation = h.inbound("+1", "human").await.unwrap().conversation;
    assert_eq!(h.load_of(&support.id, "op-1").await.unwrap(), 1);

    let outcome = h
        .engine
        .transfer_to_team(
            TENANT,
            &conversation.id,
            &billing.id,
            Actor::Operator("op-1".into()),
            "billing question",
        )
        .await
        .unwrap();
    assert_eq!(
        outcome.conversation().assigned_operator_id.as_deref(),
        Some("op-2")
    );
    assert_eq!(h.load_of(&support.id, "op-1").await.unwrap(), 0);
    assert_eq!(h.load_of(&billing.id, "op-2").await.unwrap(), 1);
    assert_load_matches(&h).await;
}

#[tokio::test]
async fn human_transfer_to_empty_team_is_an_error() {
    let h = TestHarness::new().await.unwrap();
    let support = h
        .team("support", AssignmentMode::RoundRobin, &[("op-1", true)])
        .await
        .unwrap();
    let night = h
        .team("night", AssignmentMode::RoundRobin, &[("op-9", false)])
        .await
        .unwrap();
    h.enable_bot(&["human"], Some(&support.id)).await.unwrap();
    let conversation = h.inbound("+1", "human").await.unwrap().conversation;

    let err = h
        .engine
        .transfer_to_team(TENANT, &conversation.id, &night.id, Actor::System, "after hours")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoAvailableOperator);
    let unchanged = h.engine.get_conversation(TENANT, &conversation.id).await.unwrap();
    assert_eq!(unchanged.assigned_operator_id.as_deref(), Some("op-1"));
    assert_eq!(unchanged.version, conversation.version);
}

#[tokio::test]
async fn outreach_creates_human_conversation_and_sends() {
    let h = TestHarness::new().await.unwrap();
    let team = h
        .team("sales", AssignmentMode::Manual, &[("op-1", true)])
        .await
        .unwrap();

    let conversation = h
        .engine
        .start_outreach(Outreach {
            tenant_id: TENANT.into(),
            instance_id: INSTANCE.into(),
            contact_address: "+7".into(),
            contact_display_name: Some("Bea".into()),
            operator_id: "op-1".into(),
            team_id: Some(team.id.clone()),
            first_message: Some("Hi Bea, following up on your quote".into()),
        })
        .await
        .unwrap();
    assert_eq!(conversation.handoff_state(), HandoffState::HumanOpen);
    assert_eq!(h.load_of(&team.id, "op-1").await.unwrap(), 1);
    let sent = h.channel.sent_to("+7").await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].content, "Hi Bea, following up on your quote");

    let err = h
        .engine
        .start_outreach(Outreach {
            tenant_id: TENANT.into(),
            instance_id: INSTANCE.into(),
            contact_address: "+7".into(),
            contact_display_name: None,
            operator_id: "op-1".into(),
            team_id: None,
            first_message: None,
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn operator_messages_need_an_open_conversation() {
    let h = TestHarness::new().await.unwrap();
    let team = h
        .team("support", AssignmentMode::RoundRobin, &[("op-1", true)])
        .await
        .unwrap();
    h.enable_bot(&["human"], Some(&team.id)).await.unwrap();
    let conversation = h.inbound("+1", "human").await.unwrap().conversation;

    let message = h
        .engine
        .send_operator_message(TENANT, &conversation.id, "op-1", "How can I help?")
        .await
        .unwrap();
    assert_eq!(message.sent_by_operator_id.as_deref(), Some("op-1"));
    assert!(message.external_id.is_some());

    h.engine
        .close(TENANT, &conversation.id, Some("op-1"), false)
        .await
        .unwrap();
    let err = h
        .engine
        .send_operator_message(TENANT, &conversation.id, "op-1", "still there?")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);
}

#[tokio::test]
async fn other_tenants_cannot_see_conversations() {
    let h = TestHarness::new().await.unwrap();
    let conversation = h.inbound("+1", "hi").await.unwrap().conversation;

    let err = h
        .engine
        .get_conversation("tenant-b", &conversation.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    let listed = h
        .store
        .find_conversations(&ConversationFilter::for_tenant("tenant-b"))
        .await
        .unwrap();
    assert!(listed.is_empty());
}

#[tokio::test]
async fn transfer_team_in_use_cannot_be_deleted() {
    let h = TestHarness::new().await.unwrap();
    let team = h
        .team("support", AssignmentMode::RoundRobin, &[("op-1", true)])
        .await
        .unwrap();
    h.enable_bot(&["human"], Some(&team.id)).await.unwrap();

    let err = h.engine.delete_team(TENANT, &team.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let outcome = h.inbound("+1", "I want a human").await.unwrap();
    assert!(outcome.handoff_error.is_none());
    assert!(matches!(outcome.transfer, Some(TransferOutcome::Assigned { .. })));
}

#[tokio::test]
async fn failed_handoff_keeps_the_stored_message_and_reports() {
    let h = TestHarness::new().await.unwrap();
    // Written straight to the store, as an external edit would.
    let mut bot = tether_core::model::BotConfig::disabled(TENANT, INSTANCE);
    bot.enabled = true;
    bot.transfer_keywords = vec!["human".into()];
    bot.transfer_team_id = Some("team-gone".into());
    h.store.put_bot_config(bot).await.unwrap();

    let outcome = h.inbound("+1", "I want a human").await.unwrap();
    let failure = outcome.handoff_error.expect("handoff failure reported");
    assert_eq!(failure.kind, ErrorKind::NotFound);
    assert!(outcome.transfer.is_none());
    assert!(outcome.conversation.is_bot);

    let inbound = h
        .engine
        .list_messages(TENANT, &outcome.conversation.id, None)
        .await
        .unwrap()
        .into_iter()
        .filter(|m| m.direction == Direction::Inbound)
        .count();
    assert_eq!(inbound, 1);
    assert!(h.channel.sent_to("+1").await.is_empty());
}
