//! Activity event bus.
//!
//! Completed operations are appended to the registry's audit log, kept in a
//! short in-memory history for new subscribers, and broadcast to live ones.
//! Slow subscribers may lag and skip events.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::warn;
use whisperprint_store::RegistryStore;

/// Events kept for the `history` snapshot.
pub const HISTORY_LEN: usize = 50;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    DocumentFingerprinted,
    DocumentIdentified,
    ContentChecked,
    FeedbackRecorded,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::DocumentFingerprinted => "document_fingerprinted",
            EventType::DocumentIdentified => "document_identified",
            EventType::ContentChecked => "content_checked",
            EventType::FeedbackRecorded => "feedback_recorded",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_type: EventType,
    pub event_data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

struct History {
    recent: VecDeque<Event>,
    last_timestamp: Option<DateTime<Utc>>,
}

pub struct EventBus {
    sender: broadcast::Sender<Event>,
    history: Mutex<History>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            history: Mutex::new(History {
                recent: VecDeque::with_capacity(HISTORY_LEN),
                last_timestamp: None,
            }),
        }
    }

    /// Publish an event. Timestamps are non-decreasing across calls.
    ///
    /// The audit append is best effort: a failed write is logged and the
    /// event is still delivered.
    pub fn publish(
        &self,
        store: &RegistryStore,
        event_type: EventType,
        event_data: serde_json::Value,
    ) -> Event {
        let event = {
            let mut history = self.history.lock();
            let now = Utc::now();
            let timestamp = match history.last_timestamp {
                Some(last) if last > now => last,
                _ => now,
            };
            history.last_timestamp = Some(timestamp);

            let event = Event {
                event_type,
                event_data,
                timestamp,
            };
            if history.recent.len() == HISTORY_LEN {
                history.recent.pop_front();
            }
            history.recent.push_back(event.clone());
            // No live subscribers is not an error.
            let _ = self.sender.send(event.clone());
            event
        };

        // Persisted outside the lock so publishers never wait on disk.
        if let Err(e) =
            store.append_audit_event(event_type.as_str(), &event.event_data, event.timestamp)
        {
            warn!("Failed to persist {} event: {}", event_type.as_str(), e);
        }
        event
    }

    /// Most recent events, oldest first.
    pub fn history(&self) -> Vec<Event> {
        self.history.lock().recent.iter().cloned().collect()
    }

    /// History snapshot plus a receiver for everything published after it.
    pub fn subscribe(&self) -> (Vec<Event>, broadcast::Receiver<Event>) {
        let history = self.history.lock();
        let receiver = self.sender.subscribe();
        (history.recent.iter().cloned().collect(), receiver)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_store() -> (RegistryStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = RegistryStore::open(dir.path().join("test.db")).unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn test_subscriber_receives_after_history() {
        let (store, _dir) = test_store();
        let bus = EventBus::new();
        bus.publish(&store, EventType::ContentChecked, json!({"risk_score": 0.2}));

        let (history, mut rx) = bus.subscribe();
        assert_eq!(history.len(), 1);

        bus.publish(&store, EventType::FeedbackRecorded, json!({"action": "safe"}));
        let live = rx.recv().await.unwrap();
        assert_eq!(live.event_type, EventType::FeedbackRecorded);
        assert!(live.timestamp >= history[0].timestamp);
    }

    #[test]
    fn test_history_is_bounded_and_ordered() {
        let (store, _dir) = test_store();
        let bus = EventBus::new();
        for i in 0..(HISTORY_LEN + 5) {
            bus.publish(&store, EventType::ContentChecked, json!({ "n": i }));
        }
        let history = bus.history();
        assert_eq!(history.len(), HISTORY_LEN);
        assert_eq!(history[0].event_data["n"], 5);
        assert!(history.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn test_events_are_persisted() {
        let (store, _dir) = test_store();
        let bus = EventBus::new();
        bus.publish(&store, EventType::DocumentIdentified, json!({"matched": false}));

        let audit = store.audit_events(10, Some("document_identified")).unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].event_data["matched"], false);
    }

    #[test]
    fn test_concurrent_publishers_all_persisted_in_order() {
        let (store, _dir) = test_store();
        let bus = EventBus::new();
        std::thread::scope(|scope| {
            for t in 0..4 {
                let (bus, store) = (&bus, &store);
                scope.spawn(move || {
                    for i in 0..10 {
                        bus.publish(store, EventType::ContentChecked, json!({ "t": t, "i": i }));
                    }
                });
            }
        });

        let history = bus.history();
        assert_eq!(history.len(), 40);
        assert!(history.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert_eq!(store.audit_events(100, None).unwrap().len(), 40);
    }

    #[test]
    fn test_event_wire_shape() {
        let (store, _dir) = test_store();
        let event = EventBus::new().publish(&store, EventType::DocumentFingerprinted, json!({}));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], "document_fingerprinted");
        assert!(json["timestamp"].is_string());
    }
}
