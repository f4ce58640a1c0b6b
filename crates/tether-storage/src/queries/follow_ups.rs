// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Follow-up rules and per-(rule, conversation) attempt counters.

use rusqlite::types::{Type, Value};
use rusqlite::{OptionalExtension, params};
use tether_core::TetherError;
use tether_core::model::{FollowUpRule, RuleScope};

use super::{Outcome, get_json, get_ts, get_u32, json_value, run, ts};
use crate::database::Database;

const COLUMNS: &str =
    "id, tenant_id, name, enabled, trigger_spec, action_spec, max_attempts, scope, created_at";

fn scope_text(scope: RuleScope) -> &'static str {
    match scope {
        RuleScope::Any => "any",
        RuleScope::Bot => "bot",
        RuleScope::Human => "human",
    }
}

fn get_scope(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<RuleScope> {
    let raw: String = row.get(idx)?;
    serde_json::from_value(serde_json::Value::String(raw))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<FollowUpRule> {
    Ok(FollowUpRule {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        name: row.get(2)?,
        enabled: row.get(3)?,
        trigger: get_json(row, 4)?,
        action: get_json(row, 5)?,
        max_attempts: get_u32(row, 6)?,
        scope: get_scope(row, 7)?,
        created_at: get_ts(row, 8)?,
    })
}

fn load(
    conn: &rusqlite::Connection,
    tenant_id: &str,
    rule_id: &str,
) -> rusqlite::Result<Result<FollowUpRule, TetherError>> {
    let rule = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM follow_up_rules WHERE id = ?1 AND tenant_id = ?2"),
            params![rule_id, tenant_id],
            from_row,
        )
        .optional()?;
    Ok(rule.ok_or_else(|| TetherError::not_found("follow-up rule", rule_id)))
}

pub async fn create_rule(db: &Database, rule: FollowUpRule) -> Result<FollowUpRule, TetherError> {
    run(db, move |conn| -> Outcome<FollowUpRule> {
        conn.execute(
            &format!(
                "INSERT INTO follow_up_rules ({COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
            ),
            params![
                rule.id,
                rule.tenant_id,
                rule.name,
                rule.enabled,
                json_value(&rule.trigger)?,
                json_value(&rule.action)?,
                rule.max_attempts,
                scope_text(rule.scope),
                ts(rule.created_at),
            ],
        )?;
        Ok(Ok(rule))
    })
    .await
}

/// Rules ordered by (created_at, id); `tenant_id = None` spans every tenant.
pub async fn list_rules(
    db: &Database,
    tenant_id: Option<&str>,
    enabled_only: bool,
) -> Result<Vec<FollowUpRule>, TetherError> {
    let tenant = tenant_id.map_or(Value::Null, |t| Value::Text(t.to_string()));
    run(db, move |conn| -> Outcome<Vec<FollowUpRule>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM follow_up_rules
             WHERE (?1 IS NULL OR tenant_id = ?1) AND (?2 = 0 OR enabled = 1)
             ORDER BY created_at, id"
        ))?;
        let rows = stmt.query_map(params![tenant, enabled_only], from_row)?;
        Ok(Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?))
    })
    .await
}

/// Deletes the rule along with its attempt counters.
pub async fn delete_rule(db: &Database, tenant_id: &str, rule_id: &str) -> Result<(), TetherError> {
    let (tenant_id, rule_id) = (tenant_id.to_string(), rule_id.to_string());
    run(db, move |conn| -> Outcome<()> {
        let tx = conn.transaction()?;
        if let Err(e) = load(&tx, &tenant_id, &rule_id)? {
            return Ok(Err(e));
        }
        tx.execute(
            "DELETE FROM follow_up_attempts WHERE rule_id = ?1",
            params![rule_id],
        )?;
        tx.execute("DELETE FROM follow_up_rules WHERE id = ?1", params![rule_id])?;
        tx.commit()?;
        Ok(Ok(()))
    })
    .await
}

pub async fn set_rule_enabled(
    db: &Database,
    tenant_id: &str,
    rule_id: &str,
    enabled: bool,
) -> Result<FollowUpRule, TetherError> {
    let (tenant_id, rule_id) = (tenant_id.to_string(), rule_id.to_string());
    run(db, move |conn| -> Outcome<FollowUpRule> {
        conn.execute(
            "UPDATE follow_up_rules SET enabled = ?1 WHERE id = ?2 AND tenant_id = ?3",
            params![enabled, rule_id, tenant_id],
        )?;
        load(conn, &tenant_id, &rule_id)
    })
    .await
}

fn current_attempts(
    conn: &rusqlite::Connection,
    rule_id: &str,
    conversation_id: &str,
) -> rusqlite::Result<u32> {
    let attempts: Option<i64> = conn
        .query_row(
            "SELECT attempts FROM follow_up_attempts WHERE rule_id = ?1 AND conversation_id = ?2",
            params![rule_id, conversation_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(attempts.map_or(0, |a| u32::try_from(a.max(0)).unwrap_or(u32::MAX)))
}

pub async fn attempts(
    db: &Database,
    tenant_id: &str,
    rule_id: &str,
    conversation_id: &str,
) -> Result<u32, TetherError> {
    let keys = [tenant_id, rule_id, conversation_id].map(str::to_string);
    run(db, move |conn| -> Outcome<u32> {
        let [tenant_id, rule_id, conversation_id] = &keys;
        if let Err(e) = load(conn, tenant_id, rule_id)? {
            return Ok(Err(e));
        }
        Ok(Ok(current_attempts(conn, rule_id, conversation_id)?))
    })
    .await
}

/// Consumes one attempt under a write transaction so two sweeps cannot both
/// take the last slot.
pub async fn record_attempt(
    db: &Database,
    tenant_id: &str,
    rule_id: &str,
    conversation_id: &str,
    max_attempts: u32,
) -> Result<u32, TetherError> {
    let keys = [tenant_id, rule_id, conversation_id].map(str::to_string);
    run(db, move |conn| -> Outcome<u32> {
        let [tenant_id, rule_id, conversation_id] = &keys;
        let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
        let used = current_attempts(&tx, rule_id, conversation_id)?;
        if used >= max_attempts {
            return Ok(Err(TetherError::AttemptLimitReached {
                rule_id: rule_id.clone(),
                conversation_id: conversation_id.clone(),
            }));
        }
        tx.execute(
            "INSERT INTO follow_up_attempts (tenant_id, rule_id, conversation_id, attempts)
             VALUES (?1, ?2, ?3, 1)
             ON CONFLICT (rule_id, conversation_id) DO UPDATE SET attempts = attempts + 1",
            params![tenant_id, rule_id, conversation_id],
        )?;
        tx.commit()?;
        Ok(Ok(used + 1))
    })
    .await
}

pub async fn release_attempt(
    db: &Database,
    tenant_id: &str,
    rule_id: &str,
    conversation_id: &str,
) -> Result<(), TetherError> {
    let keys = [tenant_id, rule_id, conversation_id].map(str::to_string);
    run(db, move |conn| -> Outcome<()> {
        let [tenant_id, rule_id, conversation_id] = &keys;
        conn.execute(
            "UPDATE follow_up_attempts SET attempts = MAX(0, attempts - 1)
             WHERE tenant_id = ?1 AND rule_id = ?2 AND conversation_id = ?3",
            params![tenant_id, rule_id, conversation_id],
        )?;
        Ok(Ok(()))
    })
    .await
}
