// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation reads, updates, and atomic ownership transitions.

use rusqlite::types::Value;
use rusqlite::{OptionalExtension, Transaction, params, params_from_iter};
use tether_core::TetherError;
use tether_core::model::{
    Conversation, ConversationFilter, ConversationUpdate, LoadChange, NewConversation,
    TransitionCommit, TransitionOutcome,
};
use tracing::debug;

use super::{
    Outcome, flag, get_enum, get_json, get_opt_enum, get_opt_json, get_opt_ts, get_ts, get_u32, json_value,
    opt_text, opt_ts_value, run, text, ts_value,
};
use crate::database::Database;

const COLUMNS: &str = "id, tenant_id, instance_id, contact_address, contact_display_name, \
    status, is_bot, assigned_operator_id, assigned_at, team_id, archived, tags, unread_count, \
    last_message_at, last_message_preview, last_message_direction, qualification_score, \
    qualification_data, closed_at, closed_by_operator_id, previous_operator_id, created_at, version";

const PLACEHOLDERS: &str = "?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, \
    ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23";

fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    let version: i64 = row.get(22)?;
    Ok(Conversation {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        instance_id: row.get(2)?,
        contact_address: row.get(3)?,
        contact_display_name: row.get(4)?,
        status: get_enum(row, 5)?,
        is_bot: row.get(6)?,
        assigned_operator_id: row.get(7)?,
        assigned_at: get_opt_ts(row, 8)?,
        team_id: row.get(9)?,
        archived: row.get(10)?,
        tags: get_json(row, 11)?,
        unread_count: get_u32(row, 12)?,
        last_message_at: get_ts(row, 13)?,
        last_message_preview: row.get(14)?,
        last_message_direction: get_opt_enum(row, 15)?,
        qualification_score: row.get(16)?,
        qualification_data: get_opt_json(row, 17)?,
        closed_at: get_opt_ts(row, 18)?,
        closed_by_operator_id: row.get(19)?,
        previous_operator_id: row.get(20)?,
        created_at: get_ts(row, 21)?,
        version: u64::try_from(version).unwrap_or_default(),
    })
}

/// Column values in `COLUMNS` order.
fn values(c: &Conversation) -> rusqlite::Result<Vec<Value>> {
    Ok(vec![
        text(&c.id),
        text(&c.tenant_id),
        text(&c.instance_id),
        text(&c.contact_address),
        opt_text(c.contact_display_name.as_deref()),
        text(c.status.to_string()),
        flag(c.is_bot),
        opt_text(c.assigned_operator_id.as_deref()),
        opt_ts_value(c.assigned_at),
        opt_text(c.team_id.as_deref()),
        flag(c.archived),
        json_value(&c.tags)?,
        Value::Integer(i64::from(c.unread_count)),
        ts_value(c.last_message_at),
        opt_text(c.last_message_preview.as_deref()),
        c.last_message_direction
            .map_or(Value::Null, |d| text(d.to_string())),
        c.qualification_score.map_or(Value::Null, Value::Real),
        c.qualification_data
            .as_ref()
            .map(json_value)
            .transpose()?
            .unwrap_or(Value::Null),
        opt_ts_value(c.closed_at),
        opt_text(c.closed_by_operator_id.as_deref()),
        opt_text(c.previous_operator_id.as_deref()),
        ts_value(c.created_at),
        Value::Integer(i64::try_from(c.version).unwrap_or(i64::MAX)),
    ])
}

pub(crate) fn insert(tx: &Transaction<'_>, c: &Conversation) -> rusqlite::Result<()> {
    tx.execute(
        &format!("INSERT INTO conversations ({COLUMNS}) VALUES ({PLACEHOLDERS})"),
        params_from_iter(values(c)?),
    )?;
    Ok(())
}

/// Rewrites every column of an existing row.
pub(crate) fn save(tx: &Transaction<'_>, c: &Conversation) -> rusqlite::Result<()> {
    tx.execute(
        &format!("UPDATE conversations SET ({COLUMNS}) = ({PLACEHOLDERS}) WHERE id = ?1"),
        params_from_iter(values(c)?),
    )?;
    Ok(())
}

pub(crate) fn load(
    conn: &rusqlite::Connection,
    tenant_id: &str,
    conversation_id: &str,
) -> rusqlite::Result<Option<Conversation>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM conversations WHERE id = ?1 AND tenant_id = ?2"),
        params![conversation_id, tenant_id],
        from_row,
    )
    .optional()
}

pub(crate) fn load_or_not_found(
    conn: &rusqlite::Connection,
    tenant_id: &str,
    conversation_id: &str,
) -> rusqlite::Result<Result<Conversation, TetherError>> {
    Ok(load(conn, tenant_id, conversation_id)?
        .ok_or_else(|| TetherError::not_found("conversation", conversation_id)))
}

/// Applies member-load deltas, clamped at zero. Rows for operators that are
/// not team members are left alone.
pub(crate) fn apply_loads(
    tx: &Transaction<'_>,
    tenant_id: &str,
    loads: &[LoadChange],
) -> rusqlite::Result<()> {
    for load in loads {
        let updated = tx.execute(
            "UPDATE team_members
             SET active_conversation_count = MAX(0, active_conversation_count + ?1),
                 last_assigned_at = COALESCE(?2, last_assigned_at)
             WHERE tenant_id = ?3 AND team_id = ?4 AND operator_id = ?5",
            params![
                load.delta,
                load.assigned_at.map(super::ts),
                tenant_id,
                load.team_id,
                load.operator_id
            ],
        )?;
        if updated == 0 {
            debug!(
                team_id = %load.team_id,
                operator_id = %load.operator_id,
                "load change for non-member ignored"
            );
        }
    }
    Ok(())
}

pub async fn create_conversation(
    db: &Database,
    new: NewConversation,
) -> Result<Conversation, TetherError> {
    run(db, move |conn| -> Outcome<Conversation> {
        let (conversation, loads) = new.into_conversation();
        let tx = conn.transaction()?;
        insert(&tx, &conversation)?;
        apply_loads(&tx, &conversation.tenant_id, &loads)?;
        tx.commit()?;
        Ok(Ok(conversation))
    })
    .await
}

pub async fn get_conversation(
    db: &Database,
    tenant_id: &str,
    conversation_id: &str,
) -> Result<Conversation, TetherError> {
    let (tenant_id, conversation_id) = (tenant_id.to_string(), conversation_id.to_string());
    run(db, move |conn| load_or_not_found(conn, &tenant_id, &conversation_id)).await
}

pub async fn find_by_contact(
    db: &Database,
    tenant_id: &str,
    instance_id: &str,
    contact_address: &str,
) -> Result<Option<Conversation>, TetherError> {
    let keys = [tenant_id, instance_id, contact_address].map(str::to_string);
    run(db, move |conn| -> Outcome<Option<Conversation>> {
        let found = conn
            .query_row(
                &format!(
                    "SELECT {COLUMNS} FROM conversations
                     WHERE tenant_id = ?1 AND instance_id = ?2 AND contact_address = ?3
                     ORDER BY created_at DESC, id DESC LIMIT 1"
                ),
                params_from_iter(keys.iter()),
                from_row,
            )
            .optional()?;
        Ok(Ok(found))
    })
    .await
}

pub async fn find_conversations(
    db: &Database,
    filter: &ConversationFilter,
) -> Result<Vec<Conversation>, TetherError> {
    let mut clauses: Vec<String> = Vec::new();
    let mut args: Vec<Value> = Vec::new();
    let mut push = |clause: &str, value: Value| {
        args.push(value);
        clauses.push(clause.replace('?', &format!("?{}", args.len())));
    };

    if let Some(tenant) = &filter.tenant_id {
        push("tenant_id = ?", text(tenant));
    }
    if let Some(is_bot) = filter.is_bot {
        push("is_bot = ?", flag(is_bot));
    }
    if let Some(archived) = filter.archived {
        push("archived = ?", flag(archived));
    }
    if let Some(team) = &filter.team_id {
        push("team_id = ?", text(team));
    }
    if let Some(op) = &filter.assigned_operator_id {
        push("assigned_operator_id = ?", text(op));
    }
    if let Some(before) = filter.last_message_before {
        push("last_message_at < ?", ts_value(before));
    }
    if !filter.statuses.is_empty() {
        let statuses: Vec<String> = filter.statuses.iter().map(ToString::to_string).collect();
        push(
            "status IN (SELECT value FROM json_each(?))",
            json_value(&statuses).map_err(|e| TetherError::Storage {
                source: Box::new(e),
            })?,
        );
    }

    let mut sql = format!("SELECT {COLUMNS} FROM conversations");
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY created_at ASC, id ASC");
    if let Some(limit) = filter.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }

    run(db, move |conn| -> Outcome<Vec<Conversation>> {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args), from_row)?;
        Ok(Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?))
    })
    .await
}

pub async fn update_conversation(
    db: &Database,
    tenant_id: &str,
    conversation_id: &str,
    expected_version: Option<u64>,
    update: ConversationUpdate,
) -> Result<Conversation, TetherError> {
    let (tenant_id, conversation_id) = (tenant_id.to_string(), conversation_id.to_string());
    run(db, move |conn| -> Outcome<Conversation> {
        let tx = conn.transaction()?;
        let mut conversation = match load_or_not_found(&tx, &tenant_id, &conversation_id)? {
            Ok(c) => c,
            Err(e) => return Ok(Err(e)),
        };
        if let Some(expected) = expected_version.filter(|v| *v != conversation.version) {
            return Ok(Err(TetherError::invalid_transition(
                &conversation.id,
                format!(
                    "conversation changed concurrently (expected version {expected}, found {})",
                    conversation.version
                ),
            )));
        }
        if let Err(e) = conversation.apply_update(&update) {
            return Ok(Err(e));
        }
        save(&tx, &conversation)?;
        tx.commit()?;
        Ok(Ok(conversation))
    })
    .await
}

/// Applies the transition, inserts its audit message, and moves member load in
/// one transaction. A rejected or stale commit leaves nothing behind.
pub async fn apply_transition(
    db: &Database,
    commit: TransitionCommit,
) -> Result<TransitionOutcome, TetherError> {
    run(db, move |conn| -> Outcome<TransitionOutcome> {
        let tx = conn.transaction()?;
        let mut conversation =
            match load_or_not_found(&tx, &commit.tenant_id, &commit.conversation_id)? {
                Ok(c) => c,
                Err(e) => return Ok(Err(e)),
            };
        if let Err(e) = commit.check_version(&conversation) {
            return Ok(Err(e));
        }
        let load_changes = match conversation.apply_change(&commit.change, commit.at) {
            Ok(loads) => loads,
            Err(e) => return Ok(Err(e)),
        };

        save(&tx, &conversation)?;
        let audit_message = commit.audit_message();
        super::messages::insert(&tx, &audit_message)?;
        apply_loads(&tx, &conversation.tenant_id, &load_changes)?;
        tx.commit()?;

        Ok(Ok(TransitionOutcome {
            conversation,
            audit_message,
            load_changes,
        }))
    })
    .await
}
