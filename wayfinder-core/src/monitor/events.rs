//! Observability event bus
//!
//! Health transitions and per-invocation outcomes are published on a
//! fire-and-forget broadcast channel for external consumption. The engine
//! never persists or displays these events itself; a slow or absent
//! subscriber never blocks the hot path.

use crate::monitor::health::HealthState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Event emitted by the monitors
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MonitorEvent {
    /// A tool's health state changed
    HealthTransition {
        tool_id: String,
        from: HealthState,
        to: HealthState,
        at: DateTime<Utc>,
    },

    /// A tool invocation (traffic-driven or probe) completed
    InvocationOutcome {
        tool_id: String,
        success: bool,
        latency_ms: u64,
        probe: bool,
        error: Option<String>,
        at: DateTime<Utc>,
    },
}

/// Fire-and-forget broadcast bus for monitor events
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<MonitorEvent>,
}

impl EventBus {
    /// Create a bus with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to events emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.sender.subscribe()
    }

    /// Emit an event; silently dropped when nobody is listening
    pub fn emit(&self, event: MonitorEvent) {
        let _ = self.sender.send(event);
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
