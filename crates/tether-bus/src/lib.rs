// SPDX-FileCopyrightText: 2026 Tether Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event fan-out for operator consoles.
//!
//! Each tenant owns a bounded, time-ordered replay log and a broadcast channel
//! for live delivery. Publishing appends to the log and broadcasts under the
//! same lock, and subscribing snapshots the log and attaches to the channel
//! under that lock too, so a subscriber sees every event exactly once across
//! the replay/live boundary. Delivery is at-most-once with gaps: a subscriber
//! that falls behind the channel, or resumes from a cursor older than the
//! log, skips ahead.

pub mod subscription;

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::{Mutex, broadcast};
use tracing::{debug, trace};

use tether_config::model::EventsConfig;
use tether_core::Clock;
use tether_core::model::{Event, EventDraft};

pub use subscription::Subscription;

struct TenantLog {
    buffer: Mutex<Buffer>,
    live: broadcast::Sender<Event>,
}

struct Buffer {
    events: VecDeque<Event>,
    /// Id of the newest event dropped from the front, if any.
    evicted_through: Option<u64>,
}

/// Counters exposed on the health endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BusStats {
    pub tenants: usize,
    pub buffered_events: usize,
    pub live_subscribers: usize,
}

/// In-process publish/subscribe hub keyed by tenant.
pub struct EventBus {
    tenants: DashMap<String, Arc<TenantLog>>,
    last_id: AtomicU64,
    clock: Arc<dyn Clock>,
    buffer_capacity: usize,
    live_capacity: usize,
}

impl EventBus {
    pub fn new(config: &EventsConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            tenants: DashMap::new(),
            last_id: AtomicU64::new(0),
            clock,
            buffer_capacity: config.buffer_capacity.max(1),
            live_capacity: config.live_capacity.max(1),
        }
    }

    fn tenant(&self, tenant_id: &str) -> Arc<TenantLog> {
        if let Some(log) = self.tenants.get(tenant_id) {
            return Arc::clone(log.value());
        }
        let log = self
            .tenants
            .entry(tenant_id.to_string())
            .or_insert_with(|| {
                let (live, _) = broadcast::channel(self.live_capacity);
                Arc::new(TenantLog {
                    buffer: Mutex::new(Buffer {
                        events: VecDeque::with_capacity(self.buffer_capacity),
                        evicted_through: None,
                    }),
                    live,
                })
            });
        Arc::clone(log.value())
    }

    /// Millisecond clock reading, bumped past the previous id when the clock
    /// stalls or goes backwards.
    fn next_id(&self, now_ms: u64) -> u64 {
        let mut current = self.last_id.load(Ordering::Relaxed);
        loop {
            let next = now_ms.max(current + 1);
            match self.last_id.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return next,
                Err(actual) => current = actual,
            }
        }
    }

    /// Sequences the draft, appends it to the tenant log, and broadcasts it.
    /// Never waits on subscribers.
    pub async fn publish(&self, draft: EventDraft) -> Event {
        let log = self.tenant(&draft.tenant_id);
        let mut buffer = log.buffer.lock().await;

        let timestamp = self.clock.now();
        let now_ms = u64::try_from(timestamp.timestamp_millis()).unwrap_or(0);
        let event = Event {
            id: self.next_id(now_ms),
            kind: draft.kind,
            tenant_id: draft.tenant_id,
            data: draft.data,
            timestamp,
        };

        if buffer.events.len() >= self.buffer_capacity {
            if let Some(dropped) = buffer.events.pop_front() {
                buffer.evicted_through = Some(dropped.id);
            }
        }
        buffer.events.push_back(event.clone());

        let receivers = log.live.send(event.clone()).unwrap_or(0);
        trace!(
            tenant_id = %event.tenant_id,
            event_id = event.id,
            kind = %event.kind,
            receivers,
            "event published"
        );
        event
    }

    /// Opens a stream for `tenant_id`. With a cursor, buffered events newer
    /// than it are replayed first; without one, only new events are delivered.
    pub async fn subscribe(&self, tenant_id: &str, last_event_id: Option<u64>) -> Subscription {
        let log = self.tenant(tenant_id);
        let buffer = log.buffer.lock().await;
        let live = log.live.subscribe();

        let (replay, gap) = match last_event_id {
            Some(cursor) => {
                let replay: VecDeque<Event> = buffer
                    .events
                    .iter()
                    .filter(|e| e.id > cursor)
                    .cloned()
                    .collect();
                let gap = buffer.evicted_through.is_some_and(|evicted| evicted > cursor);
                (replay, gap)
            }
            None => (VecDeque::new(), false),
        };
        drop(buffer);

        debug!(
            tenant_id,
            cursor = ?last_event_id,
            replayed = replay.len(),
            gap,
            "subscriber attached"
        );
        Subscription::new(tenant_id, replay, live, last_event_id, gap)
    }

    /// Buffered events for a tenant newer than `after`, oldest first.
    pub async fn recent(&self, tenant_id: &str, after: Option<u64>) -> Vec<Event> {
        let Some(log) = self.tenants.get(tenant_id).map(|l| Arc::clone(l.value())) else {
            return Vec::new();
        };
        let buffer = log.buffer.lock().await;
        buffer
            .events
            .iter()
            .filter(|e| after.is_none_or(|cursor| e.id > cursor))
            .cloned()
            .collect()
    }

    pub async fn stats(&self) -> BusStats {
        let logs: Vec<Arc<TenantLog>> = self
            .tenants
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        let mut stats = BusStats {
            tenants: logs.len(),
            ..BusStats::default()
        };
        for log in logs {
            stats.buffered_events += log.buffer.lock().await.events.len();
            stats.live_subscribers += log.live.receiver_count();
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use serde_json::json;
    use tether_core::model::EventKind;

    /// Clock that never advances, to exercise id bumping.
    struct FrozenClock(DateTime<Utc>);

    impl Clock for FrozenClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn bus(buffer: usize) -> EventBus {
        let clock = Arc::new(FrozenClock(
            Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        ));
        EventBus::new(
            &EventsConfig {
                buffer_capacity: buffer,
                live_capacity: 16,
            },
            clock,
        )
    }

    fn draft(tenant: &str, n: u64) -> EventDraft {
        EventDraft::new(EventKind::Typing, tenant, json!({ "n": n }))
    }

    #[tokio::test]
    async fn ids_are_strictly_increasing_under_a_frozen_clock() {
        let bus = bus(10);
        let a = bus.publish(draft("t1", 1)).await;
        let b = bus.publish(draft("t2", 2)).await;
        let c = bus.publish(draft("t1", 3)).await;
        assert!(a.id < b.id && b.id < c.id);
        assert_eq!(a.id, 1_772_366_400_000);
    }

    #[tokio::test]
    async fn buffer_is_bounded_and_tenant_scoped() {
        let bus = bus(3);
        for n in 0..5 {
            bus.publish(draft("t1", n)).await;
        }
        bus.publish(draft("t2", 99)).await;

        let recent = bus.recent("t1", None).await;
        let ns: Vec<_> = recent.iter().map(|e| e.data["n"].as_u64().unwrap()).collect();
        assert_eq!(ns, [2, 3, 4]);
        assert_eq!(bus.recent("t2", None).await.len(), 1);
        assert!(bus.recent("t3", None).await.is_empty());

        let stats = bus.stats().await;
        assert_eq!(stats.tenants, 2);
        assert_eq!(stats.buffered_events, 4);
    }

    #[tokio::test]
    async fn stale_cursor_reports_gap() {
        let bus = bus(2);
        let first = bus.publish(draft("t1", 0)).await;
        for n in 1..4 {
            bus.publish(draft("t1", n)).await;
        }
        let sub = bus.subscribe("t1", Some(first.id)).await;
        assert!(sub.has_gap());

        let latest = bus.recent("t1", None).await;
        let sub = bus.subscribe("t1", Some(latest[0].id)).await;
        assert!(!sub.has_gap());
    }
}
