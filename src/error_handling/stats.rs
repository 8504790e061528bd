//! Relay event statistics.
//!
//! This module provides thread-safe counters for the events that happen while
//! calls are relayed through the governor.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use strum::IntoEnumIterator;

use super::types::EventType;

/// Thread-safe event counter.
///
/// Every [`EventType`] gets an atomic counter at construction, so increments
/// never lock and the struct can be shared across tasks with `Arc`.
pub struct EventStats {
    events: HashMap<EventType, AtomicUsize>,
}

impl EventStats {
    pub fn new() -> Self {
        let mut events = HashMap::new();
        for event in EventType::iter() {
            events.insert(event, AtomicUsize::new(0));
        }
        EventStats { events }
    }

    /// Increment an event counter.
    pub fn increment(&self, event: EventType) {
        if let Some(counter) = self.events.get(&event) {
            counter.fetch_add(1, Ordering::Relaxed);
        } else {
            log::error!(
                "Attempted to increment counter for {:?} which is not in the map. \
                 This indicates a bug in EventStats initialization.",
                event
            );
        }
    }

    /// Get the count for an event type.
    pub fn get(&self, event: EventType) -> usize {
        self.events
            .get(&event)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Get total count across all event types.
    pub fn total(&self) -> usize {
        EventType::iter().map(|e| self.get(e)).sum()
    }

    /// Count of events that represent a failed or rejected attempt.
    pub fn total_failures(&self) -> usize {
        EventType::iter()
            .filter(|e| *e != EventType::RequestCompleted)
            .map(|e| self.get(e))
            .sum()
    }
}

impl Default for EventStats {
    fn default() -> Self {
        Self::new()
    }
}
