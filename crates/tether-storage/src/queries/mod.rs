// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules and the column codecs they share.
//!
//! Closures passed to `Connection::call` return
//! `rusqlite::Result<Result<T, TetherError>>`: the outer layer carries SQLite
//! failures, the inner one domain rejections that must roll the transaction
//! back without being reported as storage errors.

pub mod bot_configs;
pub mod conversations;
pub mod follow_ups;
pub mod messages;
pub mod teams;

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{Type, Value};
use tether_core::TetherError;

use crate::database::{Database, map_tr_err};

/// Domain result carried out of a `call` closure.
pub(crate) type Outcome<T> = rusqlite::Result<Result<T, TetherError>>;

/// Runs a closure on the database thread and flattens both error layers.
pub(crate) async fn run<T, F>(db: &Database, f: F) -> Result<T, TetherError>
where
    T: Send + 'static,
    F: FnOnce(&mut rusqlite::Connection) -> Outcome<T> + Send + 'static,
{
    db.connection().call(f).await.map_err(map_tr_err)?
}

/// Timestamps are stored as fixed-width RFC 3339 text so they sort lexically.
pub(crate) fn ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn ts_value(at: DateTime<Utc>) -> Value {
    Value::Text(ts(at))
}

pub(crate) fn opt_ts_value(at: Option<DateTime<Utc>>) -> Value {
    at.map_or(Value::Null, ts_value)
}

pub(crate) fn text(s: impl Into<String>) -> Value {
    Value::Text(s.into())
}

pub(crate) fn opt_text(s: Option<&str>) -> Value {
    s.map_or(Value::Null, |s| Value::Text(s.to_string()))
}

pub(crate) fn flag(b: bool) -> Value {
    Value::Integer(i64::from(b))
}

pub(crate) fn json_value<T: serde::Serialize>(value: &T) -> rusqlite::Result<Value> {
    serde_json::to_string(value)
        .map(Value::Text)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

fn conversion_err(
    idx: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

pub(crate) fn get_ts(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_err(idx, e))
}

pub(crate) fn get_opt_ts(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| {
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| conversion_err(idx, e))
    })
    .transpose()
}

/// Parses a strum-backed enum column.
pub(crate) fn get_enum<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_err(idx, e))
}

pub(crate) fn get_opt_enum<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| raw.parse().map_err(|e| conversion_err(idx, e)))
        .transpose()
}

pub(crate) fn get_json<T: serde::de::DeserializeOwned>(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_err(idx, e))
}

pub(crate) fn get_opt_json<T: serde::de::DeserializeOwned>(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<T>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| serde_json::from_str(&raw).map_err(|e| conversion_err(idx, e)))
        .transpose()
}

pub(crate) fn get_u32(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<u32> {
    let raw: i64 = row.get(idx)?;
    Ok(u32::try_from(raw.max(0)).unwrap_or(u32::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn timestamps_keep_full_precision() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
            + Duration::nanoseconds(353_220_708);
        let raw = ts(at);
        assert_eq!(raw, "2026-03-01T12:00:00.353220708Z");
        let parsed = DateTime::parse_from_rfc3339(&raw).unwrap().with_timezone(&Utc);
        assert_eq!(parsed, at);
    }

    #[test]
    fn timestamps_sort_lexically() {
        let base = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let earlier = ts(base + Duration::nanoseconds(9));
        let later = ts(base + Duration::nanoseconds(10));
        assert!(earlier < later);
        assert!(ts(base) < earlier);
    }
}
