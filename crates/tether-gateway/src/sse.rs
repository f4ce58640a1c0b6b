// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Server-Sent Events stream for GET /v1/events.
//!
//! Each bus event becomes one SSE frame:
//! ```text
//! id: 1767700000123
//! event: conversation_update
//! data: {"id":1767700000123,"type":"conversation_update","tenant_id":"t1",...}
//! ```
//!
//! Clients resume with the `Last-Event-ID` header (sent by browsers on
//! reconnect) or a `last_event_id` query parameter. When the replay log no
//! longer reaches back that far, a `resync` frame comes first so the console
//! reloads its state.

use std::convert::Infallible;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
};
use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;

use tether_core::model::Event;

use crate::auth::Tenant;
use crate::error::ApiError;
use crate::server::GatewayState;

#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    pub last_event_id: Option<u64>,
}

/// The resume cursor. The header wins over the query parameter.
fn resume_cursor(headers: &HeaderMap, query: &EventsQuery) -> Result<Option<u64>, ApiError> {
    match headers.get("last-event-id").and_then(|v| v.to_str().ok()) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ApiError::bad_request(format!("invalid Last-Event-ID: {raw}"))),
        None => Ok(query.last_event_id),
    }
}

fn to_frame(event: &Event) -> SseEvent {
    let frame = SseEvent::default()
        .id(event.id.to_string())
        .event(event.kind.to_string());
    match serde_json::to_string(event) {
        Ok(data) => frame.data(data),
        Err(e) => {
            tracing::warn!(event_id = event.id, error = %e, "failed to serialize event");
            frame.data("{}")
        }
    }
}

pub async fn stream_events(
    State(state): State<GatewayState>,
    Tenant(tenant_id): Tenant,
    headers: HeaderMap,
    Query(query): Query<EventsQuery>,
) -> Result<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>, ApiError> {
    let cursor = resume_cursor(&headers, &query)?;
    let subscription = state.engine.bus().subscribe(&tenant_id, cursor).await;
    tracing::debug!(
        tenant_id = %tenant_id,
        cursor = ?cursor,
        replay = subscription.pending_replay(),
        gap = subscription.has_gap(),
        "event stream opened"
    );

    let resync = subscription.has_gap().then(|| {
        SseEvent::default()
            .event("resync")
            .data(r#"{"reason":"replay window exceeded"}"#)
    });
    let events = subscription.into_stream().map(|event| to_frame(&event));
    let stream = stream::iter(resync).chain(events).map(Ok);

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(state.keep_alive)))
}
