//! Tool health tracking with circuit-breaker hysteresis
//!
//! Health is an explicit finite state machine per tool, fed by both
//! traffic-driven outcomes and periodic probes. Consecutive failures walk
//! a tool down `Healthy -> Degraded -> Unhealthy`; consecutive successes
//! walk it back up one state at a time. The one-step recovery is what
//! prevents flapping: a tool never jumps from `Unhealthy` straight back
//! to `Healthy`.

use crate::invoker::ToolConnector;
use crate::monitor::events::{EventBus, MonitorEvent};
use crate::registry::ToolRegistry;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Health classification of a tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    /// Normal operation
    Healthy,
    /// Elevated failure rate; still selectable as a fallback
    Degraded,
    /// Excluded from candidate lists
    Unhealthy,
}

impl HealthState {
    /// One state worse, saturating at `Unhealthy`
    fn worse(self) -> Self {
        match self {
            HealthState::Healthy => HealthState::Degraded,
            HealthState::Degraded | HealthState::Unhealthy => HealthState::Unhealthy,
        }
    }

    /// One state better, saturating at `Healthy`
    fn better(self) -> Self {
        match self {
            HealthState::Unhealthy => HealthState::Degraded,
            HealthState::Degraded | HealthState::Healthy => HealthState::Healthy,
        }
    }
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HealthState::Healthy => "healthy",
            HealthState::Degraded => "degraded",
            HealthState::Unhealthy => "unhealthy",
        };
        write!(f, "{}", s)
    }
}

/// Hysteresis thresholds for the health state machine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthThresholds {
    /// Consecutive failures before `Healthy -> Degraded`
    pub degrade_after: u32,

    /// Consecutive failures before `Degraded -> Unhealthy`
    pub unhealthy_after: u32,

    /// Consecutive successes before stepping one state back up
    pub recover_after: u32,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            degrade_after: 3,
            unhealthy_after: 5,
            recover_after: 3,
        }
    }
}

/// Per-tool state machine record
#[derive(Debug, Clone)]
struct ToolHealth {
    state: HealthState,
    consecutive_failures: u32,
    consecutive_successes: u32,
}

impl ToolHealth {
    fn new() -> Self {
        Self {
            state: HealthState::Healthy,
            consecutive_failures: 0,
            consecutive_successes: 0,
        }
    }

    /// Apply one outcome; returns the transition if the state changed
    ///
    /// Exactly one transition evaluation commits per outcome; the caller
    /// holds the per-tool lock.
    fn apply(
        &mut self,
        success: bool,
        thresholds: &HealthThresholds,
    ) -> Option<(HealthState, HealthState)> {
        let old = self.state;
        if success {
            self.consecutive_failures = 0;
            self.consecutive_successes += 1;
            if self.state != HealthState::Healthy
                && self.consecutive_successes >= thresholds.recover_after
            {
                self.state = self.state.better();
                self.consecutive_successes = 0;
            }
        } else {
            self.consecutive_successes = 0;
            self.consecutive_failures += 1;
            match self.state {
                HealthState::Healthy if self.consecutive_failures >= thresholds.degrade_after => {
                    self.state = self.state.worse();
                }
                HealthState::Degraded
                    if self.consecutive_failures >= thresholds.unhealthy_after =>
                {
                    self.state = self.state.worse();
                }
                _ => {}
            }
        }
        (old != self.state).then_some((old, self.state))
    }
}

/// Derives a health state per tool from passive and active signals
pub struct HealthMonitor {
    states: RwLock<HashMap<String, Arc<Mutex<ToolHealth>>>>,
    thresholds: HealthThresholds,
    events: EventBus,
}

impl HealthMonitor {
    /// Create a monitor with default thresholds
    pub fn new(events: EventBus) -> Self {
        Self::with_thresholds(HealthThresholds::default(), events)
    }

    /// Create a monitor with custom thresholds
    pub fn with_thresholds(thresholds: HealthThresholds, events: EventBus) -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            thresholds,
            events,
        }
    }

    /// Feed one outcome (traffic-driven or probe) into the state machine
    pub fn record_outcome(&self, tool_id: &str, success: bool) {
        let record = self.record_for(tool_id);
        let transition = record.lock().unwrap().apply(success, &self.thresholds);
        if let Some((from, to)) = transition {
            tracing::info!(tool = %tool_id, %from, %to, "health transition");
            self.events.emit(MonitorEvent::HealthTransition {
                tool_id: tool_id.to_string(),
                from,
                to,
                at: Utc::now(),
            });
        }
    }

    /// Current health state; unknown tools are assumed `Healthy`
    pub fn health(&self, tool_id: &str) -> HealthState {
        self.states
            .read()
            .unwrap()
            .get(tool_id)
            .map(|r| r.lock().unwrap().state)
            .unwrap_or(HealthState::Healthy)
    }

    /// Drop health state for a tool (used on deregistration)
    pub fn forget(&self, tool_id: &str) {
        self.states.write().unwrap().remove(tool_id);
    }

    fn record_for(&self, tool_id: &str) -> Arc<Mutex<ToolHealth>> {
        if let Some(record) = self.states.read().unwrap().get(tool_id) {
            return record.clone();
        }
        let mut states = self.states.write().unwrap();
        states
            .entry(tool_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(ToolHealth::new())))
            .clone()
    }
}

impl std::fmt::Debug for HealthMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthMonitor")
            .field("tracked_tools", &self.states.read().unwrap().len())
            .field("thresholds", &self.thresholds)
            .finish()
    }
}

/// Active probing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Whether the prober task runs at all
    pub enabled: bool,

    /// Interval between probe rounds
    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    /// Per-ping deadline
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(2),
        }
    }
}

/// Periodic prober issuing lightweight pings independent of real traffic
///
/// Ping outcomes feed the same hysteresis counters as traffic-driven
/// outcomes, so an idle tool can still recover (or degrade) between
/// requests.
pub struct HealthProber {
    registry: Arc<ToolRegistry>,
    health: Arc<HealthMonitor>,
    connector: Arc<dyn ToolConnector>,
    events: EventBus,
    config: ProbeConfig,
}

impl HealthProber {
    pub fn new(
        registry: Arc<ToolRegistry>,
        health: Arc<HealthMonitor>,
        connector: Arc<dyn ToolConnector>,
        events: EventBus,
        config: ProbeConfig,
    ) -> Self {
        Self {
            registry,
            health,
            connector,
            events,
            config,
        }
    }

    /// Spawn the probe loop; the task exits when `cancel` fires
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick fires immediately; skip it so startup traffic
            // is not racing a probe round.
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!("health prober stopped");
                        return;
                    }
                    _ = interval.tick() => {
                        self.probe_round().await;
                    }
                }
            }
        })
    }

    async fn probe_round(&self) {
        for tool in self.registry.all() {
            let started = std::time::Instant::now();
            let alive = self
                .connector
                .ping(&tool.endpoint, self.config.timeout)
                .await;
            let latency = started.elapsed();

            tracing::debug!(tool = %tool.id, alive, "probe completed");
            self.health.record_outcome(&tool.id, alive);
            self.events.emit(MonitorEvent::InvocationOutcome {
                tool_id: tool.id.clone(),
                success: alive,
                latency_ms: latency.as_millis() as u64,
                probe: true,
                error: (!alive).then(|| "probe failed".to_string()),
                at: Utc::now(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor() -> HealthMonitor {
        HealthMonitor::new(EventBus::new(64))
    }

    #[test]
    fn test_initial_state_is_healthy() {
        let health = monitor();
        assert_eq!(health.health("places"), HealthState::Healthy);
    }

    #[test]
    fn test_three_failures_degrade() {
        let health = monitor();
        health.record_outcome("places", false);
        health.record_outcome("places", false);
        assert_eq!(health.health("places"), HealthState::Healthy);

        health.record_outcome("places", false);
        assert_eq!(health.health("places"), HealthState::Degraded);
    }

    #[test]
    fn test_five_failures_unhealthy() {
        let health = monitor();
        for _ in 0..4 {
            health.record_outcome("places", false);
        }
        assert_eq!(health.health("places"), HealthState::Degraded);

        health.record_outcome("places", false);
        assert_eq!(health.health("places"), HealthState::Unhealthy);
    }

    #[test]
    fn test_recovery_is_one_step_at_a_time() {
        let health = monitor();
        for _ in 0..5 {
            health.record_outcome("places", false);
        }
        assert_eq!(health.health("places"), HealthState::Unhealthy);

        for _ in 0..3 {
            health.record_outcome("places", true);
        }
        // Never jumps straight back to Healthy
        assert_eq!(health.health("places"), HealthState::Degraded);

        for _ in 0..3 {
            health.record_outcome("places", true);
        }
        assert_eq!(health.health("places"), HealthState::Healthy);
    }

    #[test]
    fn test_success_resets_failure_streak() {
        let health = monitor();
        health.record_outcome("places", false);
        health.record_outcome("places", false);
        health.record_outcome("places", true);
        health.record_outcome("places", false);
        health.record_outcome("places", false);
        assert_eq!(health.health("places"), HealthState::Healthy);
    }

    #[test]
    fn test_failure_resets_success_streak() {
        let health = monitor();
        for _ in 0..3 {
            health.record_outcome("places", false);
        }
        assert_eq!(health.health("places"), HealthState::Degraded);

        health.record_outcome("places", true);
        health.record_outcome("places", true);
        health.record_outcome("places", false);
        health.record_outcome("places", true);
        health.record_outcome("places", true);
        assert_eq!(health.health("places"), HealthState::Degraded);

        health.record_outcome("places", true);
        assert_eq!(health.health("places"), HealthState::Healthy);
    }

    #[test]
    fn test_degraded_failure_streak_continues_to_unhealthy() {
        let health = monitor();
        // 3 failures -> Degraded, 2 more (5 consecutive total) -> Unhealthy
        for _ in 0..3 {
            health.record_outcome("places", false);
        }
        health.record_outcome("places", false);
        health.record_outcome("places", false);
        assert_eq!(health.health("places"), HealthState::Unhealthy);
    }

    #[tokio::test]
    async fn test_transition_events_emitted() {
        let bus = EventBus::new(64);
        let mut rx = bus.subscribe();
        let health = HealthMonitor::new(bus);

        for _ in 0..3 {
            health.record_outcome("places", false);
        }

        let event = rx.recv().await.unwrap();
        match event {
            MonitorEvent::HealthTransition { tool_id, from, to, .. } => {
                assert_eq!(tool_id, "places");
                assert_eq!(from, HealthState::Healthy);
                assert_eq!(to, HealthState::Degraded);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_forget_resets_state() {
        let health = monitor();
        for _ in 0..5 {
            health.record_outcome("places", false);
        }
        health.forget("places");
        assert_eq!(health.health("places"), HealthState::Healthy);
    }
}
