//! Event bus abstraction for the analyzer→host direction.
//!
//! The analyzer never knows how messages reach the host. A webview bridge,
//! a stdout writer or a test recorder all implement [`EventBus`].

use std::sync::{Arc, Mutex};

use crate::HostMessage;

/// Sink for outbound host messages.
pub trait EventBus: Send + Sync {
    /// Emit an event with a JSON payload. Must not block.
    ///
    /// # Arguments
    /// * `topic` - Event name (see [`crate::event_names`])
    /// * `payload` - JSON payload to emit
    fn emit(&self, topic: &str, payload: serde_json::Value);
}

/// Type alias for shared event bus reference.
pub type EventBusRef = Arc<dyn EventBus>;

/// In-memory event bus for testing.
///
/// Captures all emitted events for later inspection.
#[derive(Default)]
pub struct InMemoryEventBus {
    events: Mutex<Vec<EmittedEvent>>,
}

/// A captured event from InMemoryEventBus.
#[derive(Debug, Clone)]
pub struct EmittedEvent {
    pub topic: String,
    pub payload: serde_json::Value,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all captured events.
    pub fn events(&self) -> Vec<EmittedEvent> {
        self.lock().clone()
    }

    /// Get events for a specific topic.
    pub fn events_for(&self, topic: &str) -> Vec<EmittedEvent> {
        self.lock()
            .iter()
            .filter(|e| e.topic == topic)
            .cloned()
            .collect()
    }

    /// Captured events decoded back into host messages, skipping foreign payloads.
    pub fn messages(&self) -> Vec<HostMessage> {
        self.lock()
            .iter()
            .filter_map(|e| serde_json::from_value(e.payload.clone()).ok())
            .collect()
    }

    /// Texts of captured SPEAK messages, in emission order.
    pub fn spoken(&self) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter_map(|m| match m {
                HostMessage::Speak(speak) => Some(speak.text),
                HostMessage::Stats(_) => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<EmittedEvent>> {
        // A panicked writer cannot leave the Vec half-updated.
        self.events.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl EventBus for InMemoryEventBus {
    fn emit(&self, topic: &str, payload: serde_json::Value) {
        self.lock().push(EmittedEvent {
            topic: topic.to_string(),
            payload,
        });
    }
}

/// No-op event bus that discards all events.
pub struct NullEventBus;

impl EventBus for NullEventBus {
    fn emit(&self, _topic: &str, _payload: serde_json::Value) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{event_names, SpeakEvent};
    use serde_json::json;

    #[test]
    fn test_in_memory_event_bus() {
        let bus = InMemoryEventBus::new();

        bus.emit(event_names::SPEAK, json!({"type": "SPEAK", "text": "one"}));
        bus.emit(event_names::STATS, json!({"key": "value"}));
        bus.emit(event_names::SPEAK, json!({"type": "SPEAK", "text": "two"}));

        assert_eq!(bus.len(), 3);
        assert_eq!(bus.events_for(event_names::SPEAK).len(), 2);
        assert_eq!(bus.events_for(event_names::STATS).len(), 1);
        assert_eq!(bus.events_for("missing").len(), 0);
        assert_eq!(bus.spoken(), vec!["one", "two"]);
    }

    #[test]
    fn test_in_memory_event_bus_clear() {
        let bus = InMemoryEventBus::new();
        HostMessage::Speak(SpeakEvent { text: "hi".into() }).publish(&bus);
        assert!(!bus.is_empty());

        bus.clear();
        assert!(bus.is_empty());
    }

    #[test]
    fn test_null_event_bus() {
        let bus = NullEventBus;
        bus.emit(event_names::STATS, json!({"data": "ignored"}));
    }
}
