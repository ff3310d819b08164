//! In-memory activity ring: the last 50 intake/trigger events, for operator
//! inspection through `GET /activity`. Process-local by design; it is a
//! debugging window, not an audit log.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Ring capacity; reads never return more than this.
pub const CAPACITY: usize = 50;

#[derive(Debug, Clone, Serialize)]
pub struct ActivityEvent {
    pub at: DateTime<Utc>,
    /// e.g. "webhook_accepted", "webhook_ignored", "manual_trigger", "retry".
    pub kind: String,
    pub tenant_slug: Option<String>,
    pub detail: String,
}

/// Fixed-capacity ring, newest last, oldest evicted first.
#[derive(Clone, Default)]
pub struct ActivityBuffer {
    inner: Arc<Mutex<VecDeque<ActivityEvent>>>,
}

impl ActivityBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, kind: &str, tenant_slug: Option<&str>, detail: impl Into<String>) {
        let event = ActivityEvent {
            at: Utc::now(),
            kind: kind.to_string(),
            tenant_slug: tenant_slug.map(str::to_string),
            detail: detail.into(),
        };
        let mut ring = self.inner.lock().expect("activity lock poisoned");
        if ring.len() == CAPACITY {
            ring.pop_front();
        }
        ring.push_back(event);
    }

    /// Snapshot of the newest `limit` events, newest last.
    pub fn snapshot(&self, limit: usize) -> Vec<ActivityEvent> {
        let ring = self.inner.lock().expect("activity lock poisoned");
        let take = limit.min(ring.len());
        ring.iter().skip(ring.len() - take).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_oldest_at_capacity() {
        let buffer = ActivityBuffer::new();
        for i in 0..(CAPACITY + 10) {
            buffer.record("webhook_accepted", Some("t1"), format!("event {i}"));
        }
        let events = buffer.snapshot(CAPACITY * 2);
        assert_eq!(events.len(), CAPACITY);
        assert_eq!(events[0].detail, "event 10");
        assert_eq!(events.last().unwrap().detail, format!("event {}", CAPACITY + 9));
    }

    #[test]
    fn snapshot_limits_from_the_tail() {
        let buffer = ActivityBuffer::new();
        for i in 0..5 {
            buffer.record("retry", None, format!("event {i}"));
        }
        let events = buffer.snapshot(2);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].detail, "event 3");
        assert_eq!(events[1].detail, "event 4");
    }
}
