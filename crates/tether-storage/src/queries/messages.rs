// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only message log.

use rusqlite::{Transaction, params};
use tether_core::TetherError;
use tether_core::model::{Conversation, ConversationUpdate, Message};

use super::{Outcome, get_enum, get_opt_json, get_ts, run, ts};
use crate::database::Database;

const COLUMNS: &str = "id, tenant_id, conversation_id, direction, kind, content, external_id, \
    status, sent_at, sent_by_operator_id, automated, metadata";

fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        tenant_id: row.get(1)?,
        conversation_id: row.get(2)?,
        direction: get_enum(row, 3)?,
        kind: get_enum(row, 4)?,
        content: row.get(5)?,
        external_id: row.get(6)?,
        status: get_enum(row, 7)?,
        sent_at: get_ts(row, 8)?,
        sent_by_operator_id: row.get(9)?,
        automated: row.get(10)?,
        metadata: get_opt_json(row, 11)?,
    })
}

pub(crate) fn insert(tx: &Transaction<'_>, message: &Message) -> rusqlite::Result<()> {
    let metadata = message
        .metadata
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
    tx.execute(
        &format!(
            "INSERT INTO messages ({COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
        ),
        params![
            message.id,
            message.tenant_id,
            message.conversation_id,
            message.direction.to_string(),
            message.kind.to_string(),
            message.content,
            message.external_id,
            message.status.to_string(),
            ts(message.sent_at),
            message.sent_by_operator_id,
            message.automated,
            metadata,
        ],
    )?;
    Ok(())
}

/// Inserts the message and refreshes the conversation's derived fields in one
/// transaction.
pub async fn create_message(db: &Database, message: Message) -> Result<Conversation, TetherError> {
    store_message(db, message, None).await
}

/// Like [`create_message`], also adding `tag` to the conversation before the
/// transaction commits.
pub async fn create_tagged_message(
    db: &Database,
    message: Message,
    tag: &str,
) -> Result<Conversation, TetherError> {
    store_message(db, message, Some(ConversationUpdate::AddTag(tag.to_string()))).await
}

async fn store_message(
    db: &Database,
    message: Message,
    update: Option<ConversationUpdate>,
) -> Result<Conversation, TetherError> {
    run(db, move |conn| -> Outcome<Conversation> {
        let tx = conn.transaction()?;
        let mut conversation = match super::conversations::load_or_not_found(
            &tx,
            &message.tenant_id,
            &message.conversation_id,
        )? {
            Ok(c) => c,
            Err(e) => return Ok(Err(e)),
        };
        if let Some(update) = &update {
            if let Err(e) = conversation.apply_update(update) {
                return Ok(Err(e));
            }
        }
        insert(&tx, &message)?;
        conversation.record_message(&message);
        super::conversations::save(&tx, &conversation)?;
        tx.commit()?;
        Ok(Ok(conversation))
    })
    .await
}

/// Messages in insertion order. With `limit`, only the newest `limit`.
pub async fn list_messages(
    db: &Database,
    tenant_id: &str,
    conversation_id: &str,
    limit: Option<usize>,
) -> Result<Vec<Message>, TetherError> {
    let (tenant_id, conversation_id) = (tenant_id.to_string(), conversation_id.to_string());
    let limit = limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));
    run(db, move |conn| -> Outcome<Vec<Message>> {
        if let Err(e) = super::conversations::load_or_not_found(conn, &tenant_id, &conversation_id)? {
            return Ok(Err(e));
        }
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM (
                 SELECT seq, {COLUMNS} FROM messages
                 WHERE tenant_id = ?1 AND conversation_id = ?2
                 ORDER BY seq DESC LIMIT ?3
             ) ORDER BY seq ASC"
        ))?;
        let rows = stmt.query_map(params![tenant_id, conversation_id, limit], from_row)?;
        Ok(Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?))
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use tether_core::model::{ConversationOwner, NewConversation};
    use tether_core::types::Direction;

    async fn setup() -> (Database, Conversation) {
        let db = Database::open_in_memory().await.unwrap();
        let conversation = super::super::conversations::create_conversation(
            &db,
            NewConversation {
                tenant_id: "t1".into(),
                instance_id: "inst-1".into(),
                contact_address: "+1".into(),
                contact_display_name: None,
                owner: ConversationOwner::Bot,
                created_at: Utc::now() - Duration::hours(1),
            },
        )
        .await
        .unwrap();
        (db, conversation)
    }

    #[tokio::test]
    async fn inbound_message_updates_derived_fields() {
        let (db, c) = setup().await;
        let at = Utc::now();
        let updated = create_message(&db, Message::inbound("t1", &c.id, "hello", None, at))
            .await
            .unwrap();
        assert_eq!(updated.unread_count, 1);
        assert_eq!(updated.last_message_preview.as_deref(), Some("hello"));
        assert_eq!(updated.last_message_direction, Some(Direction::Inbound));
        assert_eq!(updated.version, c.version, "messages do not bump the version");
    }

    #[tokio::test]
    async fn message_for_other_tenant_is_rejected() {
        let (db, c) = setup().await;
        let err = create_message(&db, Message::inbound("t2", &c.id, "hi", None, Utc::now()))
            .await
            .unwrap_err();
        assert!(matches!(err, TetherError::NotFound { .. }));
    }

    #[tokio::test]
    async fn list_limit_keeps_newest_in_order() {
        let (db, c) = setup().await;
        for text in ["one", "two", "three"] {
            create_message(&db, Message::outbound("t1", &c.id, text, None, Utc::now()))
                .await
                .unwrap();
        }
        let all = list_messages(&db, "t1", &c.id, None).await.unwrap();
        assert_eq!(all.len(), 3);
        let last_two = list_messages(&db, "t1", &c.id, Some(2)).await.unwrap();
        let contents: Vec<_> = last_two.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["two", "three"]);
    }

    #[tokio::test]
    async fn tagged_message_stores_both_or_neither() {
        let (db, c) = setup().await;
        let updated = create_tagged_message(
            &db,
            Message::outbound("t1", &c.id, "still there?", None, Utc::now()),
            "follow-up",
        )
        .await
        .unwrap();
        assert!(updated.tags.contains("follow-up"));
        assert_eq!(updated.version, c.version + 1);

        let err = create_tagged_message(
            &db,
            Message::outbound("t1", &c.id, "again", None, Utc::now()),
            "  ",
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TetherError::Validation(_)));
        let all = list_messages(&db, "t1", &c.id, None).await.unwrap();
        assert_eq!(all.len(), 1, "rejected tag leaves no message behind");
    }
}
