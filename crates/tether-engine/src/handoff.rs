// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Handoff operations: bot toggles, assignment, team transfer, close, reopen.
//!
//! Each operation reads the conversation, validates the request, and commits
//! one versioned transition. A concurrent writer in between turns the commit
//! into `InvalidTransition`.

use tracing::{debug, info};

use tether_config::model::ReopenUnowned;
use tether_core::model::{
    Actor, AuditEntry, AuditEvent, Conversation, ConversationOwner, EventDraft, NewConversation,
    OwnershipChange,
};
use tether_core::{HandoffState, TetherError};
use tether_router::RoutingDecision;

use crate::engine::{ConversationEngine, Delivery};
use crate::transfer::TransferTrigger;

/// Result of asking the router to hand a conversation to a team.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferOutcome {
    /// An operator took the conversation.
    Assigned {
        conversation: Conversation,
        decision: RoutingDecision,
    },
    /// Nobody could take it; the bot keeps it, queued for the team.
    Queued {
        conversation: Conversation,
        reason: String,
    },
    /// The bot has no transfer team; consoles were notified only.
    Unrouted { conversation: Conversation },
}

impl TransferOutcome {
    pub fn conversation(&self) -> &Conversation {
        match self {
            TransferOutcome::Assigned { conversation, .. }
            | TransferOutcome::Queued { conversation, .. }
            | TransferOutcome::Unrouted { conversation } => conversation,
        }
    }
}

/// Operator-initiated outreach to a contact.
#[derive(Debug, Clone)]
pub struct Outreach {
    pub tenant_id: String,
    pub instance_id: String,
    pub contact_address: String,
    pub contact_display_name: Option<String>,
    pub operator_id: String,
    pub team_id: Option<String>,
    pub first_message: Option<String>,
}

impl ConversationEngine {
    pub async fn get_conversation(
        &self,
        tenant_id: &str,
        conversation_id: &str,
    ) -> Result<Conversation, TetherError> {
        self.store.get_conversation(tenant_id, conversation_id).await
    }

    /// Operator takes the conversation from the bot (HUMAN_OPEN).
    pub async fn disable_bot(
        &self,
        tenant_id: &str,
        conversation_id: &str,
        operator_id: &str,
    ) -> Result<Conversation, TetherError> {
        let conversation = self.get_conversation(tenant_id, conversation_id).await?;
        if !conversation.is_bot || conversation.handoff_state() == HandoffState::Closed {
            return Err(TetherError::invalid_transition(
                &conversation.id,
                format!("bot is not the owner (state {})", conversation.handoff_state()),
            ));
        }
        let team_id = self
            .team_of_member(tenant_id, conversation.team_id.as_deref(), operator_id)
            .await?;
        let outcome = self
            .commit(
                &conversation,
                OwnershipChange::AssignOperator {
                    operator_id: operator_id.to_string(),
                    team_id,
                },
                AuditEntry::new(
                    AuditEvent::BotDisabled,
                    Actor::Operator(operator_id.to_string()),
                    format!("taken over by {operator_id}"),
                ),
            )
            .await?;
        Ok(outcome.conversation)
    }

    /// Hands the conversation back to the bot with a fresh qualification cycle.
    pub async fn enable_bot(
        &self,
        tenant_id: &str,
        conversation_id: &str,
        actor: Actor,
    ) -> Result<Conversation, TetherError> {
        let conversation = self.get_conversation(tenant_id, conversation_id).await?;
        let detail = match conversation.assigned_operator_id.as_deref() {
            Some(op) => format!("released by {op}"),
            None => "bot re-enabled".to_string(),
        };
        let outcome = self
            .commit(
                &conversation,
                OwnershipChange::ReturnToBot,
                AuditEntry::new(AuditEvent::BotEnabled, actor, detail),
            )
            .await?;
        Ok(outcome.conversation)
    }

    /// Closes the conversation, optionally sending the bot's closing template.
    pub async fn close(
        &self,
        tenant_id: &str,
        conversation_id: &str,
        operator_id: Option<&str>,
        send_closing: bool,
    ) -> Result<Conversation, TetherError> {
        let conversation = self.get_conversation(tenant_id, conversation_id).await?;
        let actor = operator_id.map_or(Actor::System, |op| Actor::Operator(op.to_string()));
        let outcome = self
            .commit(
                &conversation,
                OwnershipChange::Close {
                    closed_by: operator_id.map(str::to_string),
                },
                AuditEntry::new(AuditEvent::ConversationClosed, actor, "closed"),
            )
            .await?;

        let mut closed = outcome.conversation;
        if send_closing {
            let bot = self.bot_config(tenant_id, &closed.instance_id).await?;
            if let Some(updated) = self
                .send_template(&closed, bot.templates.closing.as_deref(), "closing")
                .await
            {
                closed = updated;
            }
        }
        Ok(closed)
    }

    /// Direct assignment that bypasses the router. Load counters move
    /// symmetrically: the previous slot is released, the new one taken.
    ///
    /// With `expected_version`, the assignment only applies to the version
    /// the operator was looking at.
    pub async fn assign(
        &self,
        tenant_id: &str,
        conversation_id: &str,
        operator_id: &str,
        team_id: Option<&str>,
        expected_version: Option<u64>,
        actor: Actor,
    ) -> Result<Conversation, TetherError> {
        let mut conversation = self.get_conversation(tenant_id, conversation_id).await?;
        if let Some(expected) = expected_version {
            conversation.version = expected;
        }
        if let Some(team) = team_id {
            self.store.get_member(tenant_id, team, operator_id).await?;
        }
        let detail = match team_id {
            Some(team) => format!("assigned to {operator_id} in team {team}"),
            None => format!("assigned to {operator_id}"),
        };
        let outcome = self
            .commit(
                &conversation,
                OwnershipChange::AssignOperator {
                    operator_id: operator_id.to_string(),
                    team_id: team_id.map(str::to_string),
                },
                AuditEntry::new(AuditEvent::AgentAssigned, actor, detail),
            )
            .await?;
        Ok(outcome.conversation)
    }

    /// Routes the conversation within `team_id`.
    ///
    /// A bot-owned conversation that nobody can take (manual team, or no
    /// operator under `keep_with_bot`) stays with the bot, queued for the team.
    /// For a human-owned conversation those errors go back to the caller.
    pub async fn transfer_to_team(
        &self,
        tenant_id: &str,
        conversation_id: &str,
        team_id: &str,
        actor: Actor,
        reason: &str,
    ) -> Result<TransferOutcome, TetherError> {
        let conversation = self.get_conversation(tenant_id, conversation_id).await?;
        self.route_to_team(conversation, team_id, actor, reason).await
    }

    pub(crate) async fn route_to_team(
        &self,
        conversation: Conversation,
        team_id: &str,
        actor: Actor,
        reason: &str,
    ) -> Result<TransferOutcome, TetherError> {
        let tenant_id = conversation.tenant_id.clone();
        let team = self.store.get_team(&tenant_id, team_id).await?;
        let mut members = self.store.list_members(&tenant_id, team_id).await?;
        let was_bot = conversation.is_bot;
        // Reassignment within the same team goes to someone else.
        if let Some((team, op)) = conversation.occupied_slot().filter(|(t, _)| *t == team_id) {
            debug!(team_id = team, operator_id = op, "excluding current assignee");
            members.retain(|m| m.operator_id != op);
        }

        match self.router.route(&team, &members) {
            Ok(decision) => {
                let outcome = self
                    .commit(
                        &conversation,
                        OwnershipChange::AssignOperator {
                            operator_id: decision.operator_id.clone(),
                            team_id: Some(team.id.clone()),
                        },
                        AuditEntry::new(
                            AuditEvent::AgentAssigned,
                            actor,
                            format!(
                                "{reason}: assigned to {} ({})",
                                decision.operator_id, decision.reason
                            ),
                        ),
                    )
                    .await?;
                let mut assigned = outcome.conversation;
                if was_bot {
                    self.bus
                        .publish(EventDraft::bot_transfer(&assigned, reason, false))
                        .await;
                    assigned = self.send_transfer_notice(assigned).await?;
                }
                Ok(TransferOutcome::Assigned {
                    conversation: assigned,
                    decision,
                })
            }
            Err(
                e @ (TetherError::NoAvailableOperator { .. }
                | TetherError::ManualAssignmentRequired { .. }),
            ) if was_bot => {
                let queued_reason = e.to_string();
                if conversation.team_id.as_deref() == Some(team_id)
                    && conversation.handoff_state() != HandoffState::Closed
                {
                    debug!(
                        tenant_id = %tenant_id,
                        conversation_id = %conversation.id,
                        team_id,
                        "already queued for team"
                    );
                    return Ok(TransferOutcome::Queued {
                        conversation,
                        reason: queued_reason,
                    });
                }
                let outcome = self
                    .commit(
                        &conversation,
                        OwnershipChange::QueueForTeam {
                            team_id: team.id.clone(),
                        },
                        AuditEntry::new(
                            AuditEvent::TransferQueued,
                            actor,
                            format!("{reason}: {queued_reason}"),
                        ),
                    )
                    .await?;
                let queued = outcome.conversation;
                self.bus
                    .publish(EventDraft::bot_transfer(&queued, reason, true))
                    .await;
                info!(
                    tenant_id = %tenant_id,
                    conversation_id = %queued.id,
                    team_id,
                    "transfer queued, bot keeps the conversation"
                );
                Ok(TransferOutcome::Queued {
                    conversation: queued,
                    reason: queued_reason,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Bot-initiated transfer to the instance's configured team.
    pub(crate) async fn transfer_from_bot(
        &self,
        conversation: Conversation,
        trigger: &TransferTrigger,
    ) -> Result<TransferOutcome, TetherError> {
        let bot = self
            .bot_config(&conversation.tenant_id, &conversation.instance_id)
            .await?;
        let reason = trigger.to_string();
        match bot.transfer_team_id.as_deref() {
            Some(team_id) => {
                self.route_to_team(conversation, team_id, Actor::Bot, &reason)
                    .await
            }
            None => {
                debug!(
                    tenant_id = %conversation.tenant_id,
                    conversation_id = %conversation.id,
                    %reason,
                    "no transfer team configured"
                );
                self.bus
                    .publish(EventDraft::bot_transfer(&conversation, &reason, true))
                    .await;
                Ok(TransferOutcome::Unrouted { conversation })
            }
        }
    }

    /// Transfer template inside business hours, away template outside.
    async fn send_transfer_notice(&self, conversation: Conversation) -> Result<Conversation, TetherError> {
        let bot = self
            .bot_config(&conversation.tenant_id, &conversation.instance_id)
            .await?;
        let (template, purpose) = if bot.is_business_hours(self.clock.now()) {
            (bot.templates.transfer.as_deref(), "transfer")
        } else {
            (bot.templates.away.as_deref(), "away")
        };
        Ok(self
            .send_template(&conversation, template, purpose)
            .await
            .unwrap_or(conversation))
    }

    /// Reopens a closed conversation after new inbound contact.
    ///
    /// A previous assignee gets it back. Otherwise `reopen_unowned` decides:
    /// `bot` reopens to BOT_PENDING, `team` also routes it to its last team.
    /// The `team` branch is only reachable for rows written outside the
    /// engine, since an engine close always keeps the previous operator.
    pub(crate) async fn reopen(&self, conversation: Conversation) -> Result<Conversation, TetherError> {
        let audit = |detail: String| {
            AuditEntry::new(AuditEvent::ConversationReopened, Actor::System, detail)
        };

        if let Some(operator_id) = conversation.previous_operator_id.clone() {
            let team_id = conversation.team_id.clone();
            let outcome = self
                .commit(
                    &conversation,
                    OwnershipChange::ReopenToOperator {
                        operator_id: operator_id.clone(),
                        team_id,
                    },
                    audit(format!("reopened to {operator_id}")),
                )
                .await?;
            return Ok(outcome.conversation);
        }

        let last_team = conversation.team_id.clone();
        let outcome = self
            .commit(
                &conversation,
                OwnershipChange::ReopenToBot,
                audit("reopened to bot".to_string()),
            )
            .await?;
        let reopened = outcome.conversation;

        match (self.routing().reopen_unowned, last_team) {
            (ReopenUnowned::Team, Some(team_id)) if !conversation.is_bot => {
                let routed = self
                    .route_to_team(reopened, &team_id, Actor::System, "reopened")
                    .await?;
                Ok(routed.conversation().clone())
            }
            _ => Ok(reopened),
        }
    }

    /// Starts a human-owned conversation and optionally sends the first message.
    pub async fn start_outreach(&self, outreach: Outreach) -> Result<Conversation, TetherError> {
        let existing = self
            .store
            .find_conversation_by_contact(
                &outreach.tenant_id,
                &outreach.instance_id,
                &outreach.contact_address,
            )
            .await?;
        if let Some(open) = existing.filter(|c| c.handoff_state() != HandoffState::Closed) {
            return Err(TetherError::Conflict(format!(
                "conversation {} with {} is still open",
                open.id, outreach.contact_address
            )));
        }
        if let Some(team) = outreach.team_id.as_deref() {
            self.store
                .get_member(&outreach.tenant_id, team, &outreach.operator_id)
                .await?;
        }

        let conversation = self
            .store
            .create_conversation(NewConversation {
                tenant_id: outreach.tenant_id.clone(),
                instance_id: outreach.instance_id.clone(),
                contact_address: outreach.contact_address.clone(),
                contact_display_name: outreach.contact_display_name.clone(),
                owner: ConversationOwner::Operator {
                    operator_id: outreach.operator_id.clone(),
                    team_id: outreach.team_id.clone(),
                },
                created_at: self.clock.now(),
            })
            .await?;
        info!(
            tenant_id = %conversation.tenant_id,
            conversation_id = %conversation.id,
            operator_id = %outreach.operator_id,
            "outreach conversation started"
        );
        self.bus
            .publish(EventDraft::conversation_update(&conversation))
            .await;
        self.bus
            .publish(EventDraft::new_assignment(&conversation))
            .await;

        match outreach.first_message.as_deref().filter(|m| !m.trim().is_empty()) {
            Some(text) => {
                let (updated, _) = self
                    .deliver(&conversation, text, Delivery::operator(&outreach.operator_id))
                    .await?;
                Ok(updated)
            }
            None => Ok(conversation),
        }
    }

    /// Keeps `team_id` only when the operator belongs to that team.
    async fn team_of_member(
        &self,
        tenant_id: &str,
        team_id: Option<&str>,
        operator_id: &str,
    ) -> Result<Option<String>, TetherError> {
        let Some(team) = team_id else {
            return Ok(None);
        };
        match self.store.get_member(tenant_id, team, operator_id).await {
            Ok(_) => Ok(Some(team.to_string())),
            Err(TetherError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
