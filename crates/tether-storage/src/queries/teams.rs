// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Team and team member operations.

use rusqlite::{OptionalExtension, params};
use tether_core::TetherError;
use tether_core::model::{Team, TeamMember, TeamPatch};

use super::{Outcome, get_enum, get_opt_ts, get_ts, get_u32, run, ts};
use crate::database::Database;

const TEAM_COLUMNS: &str = "id, tenant_id, name, assignment_mode, auto_assign, created_at";
const MEMBER_COLUMNS: &str = "team_id, operator_id, role, is_online, \
    active_conversation_count, last_assigned_at, joined_at";

fn team_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Team> {
    Ok(Team {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        name: row.get(2)?,
        assignment_mode: get_enum(row, 3)?,
        auto_assign: row.get(4)?,
        created_at: get_ts(row, 5)?,
    })
}

fn member_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TeamMember> {
    Ok(TeamMember {
        team_id: row.get(0)?,
        operator_id: row.get(1)?,
        role: get_enum(row, 2)?,
        is_online: row.get(3)?,
        active_conversation_count: get_u32(row, 4)?,
        last_assigned_at: get_opt_ts(row, 5)?,
        joined_at: get_ts(row, 6)?,
    })
}

fn load_team(
    conn: &rusqlite::Connection,
    tenant_id: &str,
    team_id: &str,
) -> rusqlite::Result<Result<Team, TetherError>> {
    let team = conn
        .query_row(
            &format!("SELECT {TEAM_COLUMNS} FROM teams WHERE id = ?1 AND tenant_id = ?2"),
            params![team_id, tenant_id],
            team_from_row,
        )
        .optional()?;
    Ok(team.ok_or_else(|| TetherError::not_found("team", team_id)))
}

fn load_member(
    conn: &rusqlite::Connection,
    tenant_id: &str,
    team_id: &str,
    operator_id: &str,
) -> rusqlite::Result<Result<TeamMember, TetherError>> {
    let member = conn
        .query_row(
            &format!(
                "SELECT {MEMBER_COLUMNS} FROM team_members
                 WHERE tenant_id = ?1 AND team_id = ?2 AND operator_id = ?3"
            ),
            params![tenant_id, team_id, operator_id],
            member_from_row,
        )
        .optional()?;
    Ok(member.ok_or_else(|| TetherError::not_found("team member", operator_id)))
}

fn name_taken(
    conn: &rusqlite::Connection,
    tenant_id: &str,
    name: &str,
    except_id: &str,
) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM teams WHERE tenant_id = ?1 AND name = ?2 AND id <> ?3)",
        params![tenant_id, name, except_id],
        |row| row.get(0),
    )
}

pub async fn create_team(db: &Database, team: Team) -> Result<Team, TetherError> {
    run(db, move |conn| -> Outcome<Team> {
        let tx = conn.transaction()?;
        if name_taken(&tx, &team.tenant_id, &team.name, &team.id)? {
            return Ok(Err(TetherError::Conflict(format!(
                "team name `{}` already exists",
                team.name
            ))));
        }
        tx.execute(
            &format!("INSERT INTO teams ({TEAM_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
            params![
                team.id,
                team.tenant_id,
                team.name,
                team.assignment_mode.to_string(),
                team.auto_assign,
                ts(team.created_at),
            ],
        )?;
        tx.commit()?;
        Ok(Ok(team))
    })
    .await
}

pub async fn get_team(db: &Database, tenant_id: &str, team_id: &str) -> Result<Team, TetherError> {
    let (tenant_id, team_id) = (tenant_id.to_string(), team_id.to_string());
    run(db, move |conn| load_team(conn, &tenant_id, &team_id)).await
}

pub async fn list_teams(db: &Database, tenant_id: &str) -> Result<Vec<Team>, TetherError> {
    let tenant_id = tenant_id.to_string();
    run(db, move |conn| -> Outcome<Vec<Team>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {TEAM_COLUMNS} FROM teams WHERE tenant_id = ?1 ORDER BY created_at, id"
        ))?;
        let rows = stmt.query_map(params![tenant_id], team_from_row)?;
        Ok(Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?))
    })
    .await
}

pub async fn update_team(
    db: &Database,
    tenant_id: &str,
    team_id: &str,
    patch: TeamPatch,
) -> Result<Team, TetherError> {
    let (tenant_id, team_id) = (tenant_id.to_string(), team_id.to_string());
    run(db, move |conn| -> Outcome<Team> {
        let tx = conn.transaction()?;
        let mut team = match load_team(&tx, &tenant_id, &team_id)? {
            Ok(t) => t,
            Err(e) => return Ok(Err(e)),
        };
        if let Err(e) = patch.apply(&mut team) {
            return Ok(Err(e));
        }
        if name_taken(&tx, &tenant_id, &team.name, &team.id)? {
            return Ok(Err(TetherError::Conflict(format!(
                "team name `{}` already exists",
                team.name
            ))));
        }
        tx.execute(
            "UPDATE teams SET name = ?1, assignment_mode = ?2, auto_assign = ?3 WHERE id = ?4",
            params![
                team.name,
                team.assignment_mode.to_string(),
                team.auto_assign,
                team.id
            ],
        )?;
        tx.commit()?;
        Ok(Ok(team))
    })
    .await
}

pub async fn delete_team(db: &Database, tenant_id: &str, team_id: &str) -> Result<(), TetherError> {
    let (tenant_id, team_id) = (tenant_id.to_string(), team_id.to_string());
    run(db, move |conn| -> Outcome<()> {
        let tx = conn.transaction()?;
        if let Err(e) = load_team(&tx, &tenant_id, &team_id)? {
            return Ok(Err(e));
        }
        let active: i64 = tx.query_row(
            "SELECT COALESCE(SUM(active_conversation_count), 0) FROM team_members WHERE team_id = ?1",
            params![team_id],
            |row| row.get(0),
        )?;
        if active > 0 {
            return Ok(Err(TetherError::Conflict(format!(
                "team {team_id} still has {active} active conversations"
            ))));
        }
        let referenced_by: Option<String> = tx
            .query_row(
                "SELECT instance_id FROM bot_configs
                 WHERE tenant_id = ?1 AND json_extract(config, '$.transfer_team_id') = ?2
                 ORDER BY instance_id LIMIT 1",
                params![tenant_id, team_id],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(instance_id) = referenced_by {
            return Ok(Err(TetherError::Conflict(format!(
                "team {team_id} is the transfer team of instance {instance_id}"
            ))));
        }
        tx.execute("DELETE FROM team_members WHERE team_id = ?1", params![team_id])?;
        tx.execute("DELETE FROM teams WHERE id = ?1", params![team_id])?;
        tx.commit()?;
        Ok(Ok(()))
    })
    .await
}

pub async fn add_member(
    db: &Database,
    tenant_id: &str,
    member: TeamMember,
) -> Result<TeamMember, TetherError> {
    let tenant_id = tenant_id.to_string();
    run(db, move |conn| -> Outcome<TeamMember> {
        let tx = conn.transaction()?;
        if let Err(e) = load_team(&tx, &tenant_id, &member.team_id)? {
            return Ok(Err(e));
        }
        if load_member(&tx, &tenant_id, &member.team_id, &member.operator_id)?.is_ok() {
            return Ok(Err(TetherError::Conflict(format!(
                "operator {} is already a member of team {}",
                member.operator_id, member.team_id
            ))));
        }
        tx.execute(
            &format!(
                "INSERT INTO team_members (tenant_id, {MEMBER_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
            ),
            params![
                tenant_id,
                member.team_id,
                member.operator_id,
                member.role.to_string(),
                member.is_online,
                member.active_conversation_count,
                member.last_assigned_at.map(ts),
                ts(member.joined_at),
            ],
        )?;
        tx.commit()?;
        Ok(Ok(member))
    })
    .await
}

pub async fn remove_member(
    db: &Database,
    tenant_id: &str,
    team_id: &str,
    operator_id: &str,
) -> Result<(), TetherError> {
    let keys = [tenant_id, team_id, operator_id].map(str::to_string);
    run(db, move |conn| -> Outcome<()> {
        let [tenant_id, team_id, operator_id] = &keys;
        let tx = conn.transaction()?;
        let member = match load_member(&tx, tenant_id, team_id, operator_id)? {
            Ok(m) => m,
            Err(e) => return Ok(Err(e)),
        };
        if member.active_conversation_count > 0 {
            return Ok(Err(TetherError::Conflict(format!(
                "operator {operator_id} still owns {} conversations in team {team_id}",
                member.active_conversation_count
            ))));
        }
        tx.execute(
            "DELETE FROM team_members WHERE team_id = ?1 AND operator_id = ?2",
            params![team_id, operator_id],
        )?;
        tx.commit()?;
        Ok(Ok(()))
    })
    .await
}

/// Members in insertion order.
pub async fn list_members(
    db: &Database,
    tenant_id: &str,
    team_id: &str,
) -> Result<Vec<TeamMember>, TetherError> {
    let (tenant_id, team_id) = (tenant_id.to_string(), team_id.to_string());
    run(db, move |conn| -> Outcome<Vec<TeamMember>> {
        if let Err(e) = load_team(conn, &tenant_id, &team_id)? {
            return Ok(Err(e));
        }
        let mut stmt = conn.prepare(&format!(
            "SELECT {MEMBER_COLUMNS} FROM team_members
             WHERE tenant_id = ?1 AND team_id = ?2 ORDER BY seq"
        ))?;
        let rows = stmt.query_map(params![tenant_id, team_id], member_from_row)?;
        Ok(Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?))
    })
    .await
}

pub async fn get_member(
    db: &Database,
    tenant_id: &str,
    team_id: &str,
    operator_id: &str,
) -> Result<TeamMember, TetherError> {
    let keys = [tenant_id, team_id, operator_id].map(str::to_string);
    run(db, move |conn| {
        let [tenant_id, team_id, operator_id] = &keys;
        load_member(conn, tenant_id, team_id, operator_id)
    })
    .await
}

pub async fn set_member_online(
    db: &Database,
    tenant_id: &str,
    team_id: &str,
    operator_id: &str,
    online: bool,
) -> Result<TeamMember, TetherError> {
    let keys = [tenant_id, team_id, operator_id].map(str::to_string);
    run(db, move |conn| -> Outcome<TeamMember> {
        let [tenant_id, team_id, operator_id] = &keys;
        conn.execute(
            "UPDATE team_members SET is_online = ?1
             WHERE tenant_id = ?2 AND team_id = ?3 AND operator_id = ?4",
            params![online, tenant_id, team_id, operator_id],
        )?;
        load_member(conn, tenant_id, team_id, operator_id)
    })
    .await
}

/// Adjusts the load counter directly, clamped at zero.
pub async fn increment_member_load(
    db: &Database,
    tenant_id: &str,
    team_id: &str,
    operator_id: &str,
    delta: i32,
) -> Result<TeamMember, TetherError> {
    let keys = [tenant_id, team_id, operator_id].map(str::to_string);
    run(db, move |conn| -> Outcome<TeamMember> {
        let [tenant_id, team_id, operator_id] = &keys;
        conn.execute(
            "UPDATE team_members
             SET active_conversation_count = MAX(0, active_conversation_count + ?1)
             WHERE tenant_id = ?2 AND team_id = ?3 AND operator_id = ?4",
            params![delta, tenant_id, team_id, operator_id],
        )?;
        load_member(conn, tenant_id, team_id, operator_id)
    })
    .await
}
