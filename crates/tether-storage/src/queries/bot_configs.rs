// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bot configuration, one JSON document per (tenant, instance).

use rusqlite::{OptionalExtension, params};
use tether_core::TetherError;
use tether_core::model::BotConfig;

use super::{Outcome, get_json, json_value, run};
use crate::database::Database;

pub async fn get_bot_config(
    db: &Database,
    tenant_id: &str,
    instance_id: &str,
) -> Result<Option<BotConfig>, TetherError> {
    let (tenant_id, instance_id) = (tenant_id.to_string(), instance_id.to_string());
    run(db, move |conn| -> Outcome<Option<BotConfig>> {
        let config = conn
            .query_row(
                "SELECT config FROM bot_configs WHERE tenant_id = ?1 AND instance_id = ?2",
                params![tenant_id, instance_id],
                |row| get_json(row, 0),
            )
            .optional()?;
        Ok(Ok(config))
    })
    .await
}

pub async fn put_bot_config(db: &Database, config: BotConfig) -> Result<BotConfig, TetherError> {
    run(db, move |conn| -> Outcome<BotConfig> {
        conn.execute(
            "INSERT INTO bot_configs (tenant_id, instance_id, config) VALUES (?1, ?2, ?3)
             ON CONFLICT (tenant_id, instance_id) DO UPDATE SET config = excluded.config",
            params![config.tenant_id, config.instance_id, json_value(&config)?],
        )?;
        Ok(Ok(config))
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_core::model::BusinessHours;

    #[tokio::test]
    async fn put_replaces_and_scopes_by_tenant() {
        let db = Database::open_in_memory().await.unwrap();
        assert!(get_bot_config(&db, "t1", "inst").await.unwrap().is_none());

        let mut config = BotConfig::disabled("t1", "inst");
        put_bot_config(&db, config.clone()).await.unwrap();
        config.enabled = true;
        config.transfer_keywords = vec!["human".into()];
        config.business_hours = Some(BusinessHours::office());
        put_bot_config(&db, config.clone()).await.unwrap();

        assert_eq!(get_bot_config(&db, "t1", "inst").await.unwrap(), Some(config));
        assert!(get_bot_config(&db, "t2", "inst").await.unwrap().is_none());
    }
}
