// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::key_value::KeyValueStore;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Fixed key the launch-outcome window is persisted under.
pub const STARTUP_EVENTS_KEY: &str = "crash-loop-db";

/// Outcome of one past launch, derived at detector evaluation time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StartupEvent {
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
    /// `true` when no crash artifact from the previous launch was found.
    pub is_successful: bool,
}

/// Persists the ordered window of recent launch outcomes through an injected
/// key-value store, as a JSON array blob under [`STARTUP_EVENTS_KEY`].
pub struct StartupEventStore {
    store: Box<dyn KeyValueStore>,
}

impl StartupEventStore {
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Loads the persisted window. Absent or corrupt history is an empty
    /// window, never a failure.
    pub fn load(&self) -> Vec<StartupEvent> {
        let Some(blob) = self.store.get(STARTUP_EVENTS_KEY) else {
            return Vec::new();
        };
        match serde_json::from_slice(&blob) {
            Ok(events) => events,
            Err(err) => {
                warn!("discarding corrupt startup-event history: {err}");
                Vec::new()
            }
        }
    }

    pub fn save(&self, events: &[StartupEvent]) -> bool {
        let blob = match serde_json::to_vec(events) {
            Ok(blob) => blob,
            Err(err) => {
                warn!("failed to encode startup events: {err}");
                return false;
            }
        };
        self.store.set(STARTUP_EVENTS_KEY, &blob)
    }

    /// Appends `event` to `events`, evicting the oldest entries (strict FIFO)
    /// so at most `threshold` remain.
    pub fn record(events: &mut Vec<StartupEvent>, event: StartupEvent, threshold: usize) {
        events.push(event);
        while events.len() > threshold {
            events.remove(0);
        }
    }
}
