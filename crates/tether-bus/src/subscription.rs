// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One live session's view of a tenant's events.

use std::collections::VecDeque;

use futures::Stream;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

use tether_core::model::Event;

/// Replay-then-live event stream for one tenant.
///
/// Events are yielded in id order. Anything at or below the last delivered id
/// is dropped, which covers the overlap between the replay snapshot and the
/// live channel.
pub struct Subscription {
    tenant_id: String,
    replay: VecDeque<Event>,
    live: broadcast::Receiver<Event>,
    last_delivered: Option<u64>,
    gap: bool,
}

impl Subscription {
    pub(crate) fn new(
        tenant_id: &str,
        replay: VecDeque<Event>,
        live: broadcast::Receiver<Event>,
        cursor: Option<u64>,
        gap: bool,
    ) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            replay,
            live,
            last_delivered: cursor,
            gap,
        }
    }

    /// True when the resume cursor predates the oldest retained event.
    pub fn has_gap(&self) -> bool {
        self.gap
    }

    /// Number of replayed events not yet yielded.
    pub fn pending_replay(&self) -> usize {
        self.replay.len()
    }

    /// Next event, or `None` once the bus is gone.
    pub async fn next(&mut self) -> Option<Event> {
        if let Some(event) = self.replay.pop_front() {
            self.last_delivered = Some(event.id);
            return Some(event);
        }
        loop {
            match self.live.recv().await {
                Ok(event) => {
                    if self.last_delivered.is_some_and(|last| event.id <= last) {
                        continue;
                    }
                    self.last_delivered = Some(event.id);
                    return Some(event);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(tenant_id = %self.tenant_id, skipped, "subscriber lagged, events dropped");
                    self.gap = true;
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = Event> + Send + 'static {
        futures::stream::unfold(self, |mut sub| async move {
            sub.next().await.map(|event| (event, sub))
        })
    }
}
