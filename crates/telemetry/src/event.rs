//! Event bus for call and registry lifecycle events.
//!
//! Uses [`tokio::sync::broadcast`] for fan-out delivery to multiple subscribers.
//! Events are fire-and-forget projections; dropping them is acceptable.

use std::sync::atomic::{AtomicU64, Ordering};

use nimbus_core::{FunctionCallId, ScheduleId};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Lifecycle event emitted by the loader, engine and scheduler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CallEvent {
    /// A function was registered or replaced.
    FunctionLoaded {
        /// Registry name.
        function: String,
    },
    /// A function was removed from the registry.
    FunctionUnloaded {
        /// Registry name.
        function: String,
    },
    /// A call row was inserted.
    CallStarted {
        /// Row id.
        call_id: FunctionCallId,
        /// Registry name.
        function: String,
    },
    /// A call finished successfully.
    CallSucceeded {
        /// Row id.
        call_id: FunctionCallId,
        /// Registry name.
        function: String,
        /// Wall-clock duration.
        duration_ms: u64,
        /// Whether a warm marker was used.
        warm: bool,
    },
    /// A call finished with a failure.
    CallFailed {
        /// Row id.
        call_id: FunctionCallId,
        /// Registry name.
        function: String,
        /// Failure kind as persisted.
        kind: String,
    },
    /// The scheduler turned a schedule off.
    ScheduleDeactivated {
        /// Schedule id.
        schedule_id: ScheduleId,
        /// Why.
        reason: String,
    },
}

/// Broadcast-based event bus.
///
/// Delivers events to all active subscribers. If no subscribers are
/// listening, events are silently dropped.
///
/// # Examples
///
/// ```
/// use nimbus_telemetry::event::{CallEvent, EventBus};
///
/// let bus = EventBus::new(64);
/// let mut sub = bus.subscribe();
///
/// bus.emit(CallEvent::FunctionLoaded { function: "double".into() });
///
/// assert_eq!(bus.total_emitted(), 1);
/// assert!(sub.try_recv().is_some());
/// ```
#[derive(Debug)]
pub struct EventBus {
    sender: broadcast::Sender<CallEvent>,
    emitted: AtomicU64,
}

impl EventBus {
    /// Create a new event bus with the given channel capacity.
    ///
    /// Lagging subscribers skip the oldest events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            emitted: AtomicU64::new(0),
        }
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, event: CallEvent) {
        self.emitted.fetch_add(1, Ordering::Relaxed);
        // No receivers is fine.
        let _ = self.sender.send(event);
    }

    /// Subscribe to events emitted from now on.
    pub fn subscribe(&self) -> EventSubscriber {
        EventSubscriber {
            receiver: self.sender.subscribe(),
        }
    }

    /// Total number of events emitted since creation.
    #[must_use]
    pub fn total_emitted(&self) -> u64 {
        self.emitted.load(Ordering::Relaxed)
    }

    /// Number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Subscription handle for receiving events from the [`EventBus`].
#[derive(Debug)]
pub struct EventSubscriber {
    receiver: broadcast::Receiver<CallEvent>,
}

impl EventSubscriber {
    /// Receive the next event.
    ///
    /// Returns `None` once the bus is dropped. Lagged gaps are skipped.
    pub async fn recv(&mut self) -> Option<CallEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Receive an event if one is immediately available.
    pub fn try_recv(&mut self) -> Option<CallEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => {}
                Err(_) => return None,
            }
        }
    }

    /// Drain everything currently buffered.
    pub fn drain(&mut self) -> Vec<CallEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn emit_without_subscribers_does_not_panic() {
        let bus = EventBus::new(16);
        bus.emit(CallEvent::FunctionUnloaded {
            function: "double".into(),
        });
        assert_eq!(bus.total_emitted(), 1);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn subscriber_receives_via_recv() {
        let bus = EventBus::new(16);
        let mut sub = bus.subscribe();
        let call_id = FunctionCallId::v4();

        bus.emit(CallEvent::CallSucceeded {
            call_id,
            function: "double".into(),
            duration_ms: 12,
            warm: true,
        });

        let event = sub.recv().await.unwrap();
        assert_eq!(
            event,
            CallEvent::CallSucceeded {
                call_id,
                function: "double".into(),
                duration_ms: 12,
                warm: true,
            }
        );
    }

    #[test]
    fn multiple_subscribers_each_get_a_copy() {
        let bus = EventBus::new(16);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        bus.emit(CallEvent::FunctionLoaded {
            function: "a".into(),
        });
        bus.emit(CallEvent::FunctionLoaded {
            function: "b".into(),
        });

        assert_eq!(sub1.drain().len(), 2);
        assert_eq!(sub2.drain().len(), 2);
    }

    #[test]
    fn lagging_subscriber_keeps_newest() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();
        for name in ["a", "b", "c", "d"] {
            bus.emit(CallEvent::FunctionLoaded {
                function: name.into(),
            });
        }
        let got = sub.drain();
        assert_eq!(
            got.last(),
            Some(&CallEvent::FunctionLoaded {
                function: "d".into()
            })
        );
        assert!(got.len() <= 2);
    }

    #[test]
    fn events_serialize_with_tag() {
        let event = CallEvent::FunctionLoaded {
            function: "double".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"event": "function_loaded", "function": "double"})
        );
    }
}
