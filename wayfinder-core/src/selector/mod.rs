//! Adaptive tool selection
//!
//! The selector combines registry lookup with live performance and health
//! signals to pick the best tool for a required capability set. Scoring is
//! a weighted sum over capability-match completeness, success rate,
//! inverse p95 latency, health state, and load fairness. Unhealthy tools
//! are never candidates; when no healthy candidate exists the best
//! degraded one is returned with a caller-visible fallback flag.

use crate::error::{EngineError, Result};
use crate::monitor::{HealthMonitor, HealthState, PerformanceMonitor};
use crate::registry::{Capability, ToolDescriptor, ToolRegistry};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Scoring weights; must be tuned together, each term is in [0, 1]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionWeights {
    /// Capability-match completeness (exact match scores highest)
    pub capability_match: f64,

    /// Rolling success rate
    pub success_rate: f64,

    /// Inverse p95 latency
    pub latency: f64,

    /// Health state (healthy above degraded)
    pub health: f64,

    /// Load fairness (fewer in-flight invocations scores higher)
    pub load: f64,
}

impl Default for SelectionWeights {
    fn default() -> Self {
        Self {
            capability_match: 0.30,
            success_rate: 0.25,
            latency: 0.20,
            health: 0.15,
            load: 0.10,
        }
    }
}

/// Neutral score for a tool with no recorded samples yet
const NEUTRAL: f64 = 0.5;

/// Latency scale for the inverse-p95 term; a p95 at this value scores 0.5
const LATENCY_SCALE_MS: f64 = 200.0;

/// Tracks in-flight invocation counts per tool
#[derive(Debug, Default)]
pub struct InflightTracker {
    counts: RwLock<HashMap<String, Arc<AtomicUsize>>>,
}

impl InflightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark an invocation as started; the returned guard decrements on drop
    pub fn begin(&self, tool_id: &str) -> InflightGuard {
        let counter = self.counter_for(tool_id);
        counter.fetch_add(1, Ordering::SeqCst);
        InflightGuard { counter }
    }

    /// Current in-flight count for a tool
    pub fn count(&self, tool_id: &str) -> usize {
        self.counts
            .read()
            .unwrap()
            .get(tool_id)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    fn counter_for(&self, tool_id: &str) -> Arc<AtomicUsize> {
        if let Some(counter) = self.counts.read().unwrap().get(tool_id) {
            return counter.clone();
        }
        let mut counts = self.counts.write().unwrap();
        counts
            .entry(tool_id.to_string())
            .or_insert_with(|| Arc::new(AtomicUsize::new(0)))
            .clone()
    }
}

/// RAII guard decrementing the in-flight count when the invocation ends
pub struct InflightGuard {
    counter: Arc<AtomicUsize>,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

/// The outcome of a selection
#[derive(Debug, Clone)]
pub struct Selection {
    /// The chosen tool
    pub tool: Arc<ToolDescriptor>,

    /// True when no healthy candidate existed and a degraded one was used
    pub fallback: bool,

    /// The winning score, for logging and diagnostics
    pub score: f64,
}

/// Picks the best tool for a required capability set
pub struct ToolSelector {
    registry: Arc<ToolRegistry>,
    performance: Arc<PerformanceMonitor>,
    health: Arc<HealthMonitor>,
    inflight: Arc<InflightTracker>,
    weights: SelectionWeights,
}

impl ToolSelector {
    pub fn new(
        registry: Arc<ToolRegistry>,
        performance: Arc<PerformanceMonitor>,
        health: Arc<HealthMonitor>,
        inflight: Arc<InflightTracker>,
    ) -> Self {
        Self::with_weights(
            registry,
            performance,
            health,
            inflight,
            SelectionWeights::default(),
        )
    }

    pub fn with_weights(
        registry: Arc<ToolRegistry>,
        performance: Arc<PerformanceMonitor>,
        health: Arc<HealthMonitor>,
        inflight: Arc<InflightTracker>,
        weights: SelectionWeights,
    ) -> Self {
        Self {
            registry,
            performance,
            health,
            inflight,
            weights,
        }
    }

    /// Select the highest-scoring tool offering every required capability
    ///
    /// `exclude` carries tool ids that already failed for the current step
    /// (sticky-selection exclusion). Unhealthy tools are never returned;
    /// an all-degraded candidate pool still yields a selection, flagged as
    /// a fallback.
    pub fn select(
        &self,
        required: &BTreeSet<Capability>,
        exclude: &BTreeSet<String>,
    ) -> Result<Selection> {
        let mut scored: Vec<(Arc<ToolDescriptor>, HealthState, f64, usize)> = Vec::new();
        let mut saw_healthy = false;

        for tool in self.registry.find_by_capabilities(required) {
            if exclude.contains(&tool.id) {
                continue;
            }
            let state = self.health.health(&tool.id);
            if state == HealthState::Unhealthy {
                continue;
            }
            if state == HealthState::Healthy {
                saw_healthy = true;
            }
            let in_flight = self.inflight.count(&tool.id);
            let score = self.score(&tool, required, state, in_flight);
            scored.push((tool, state, score, in_flight));
        }

        if scored.is_empty() {
            return Err(EngineError::NoToolAvailable(format!(
                "no selectable tool offers {:?}",
                required.iter().map(|c| c.as_str()).collect::<Vec<_>>()
            )));
        }

        // Highest score wins; ties broken by fewest in-flight, then id
        scored.sort_by(|a, b| {
            b.2.partial_cmp(&a.2)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.3.cmp(&b.3))
                .then(a.0.id.cmp(&b.0.id))
        });

        let (tool, state, score, _) = scored.remove(0);
        let fallback = !saw_healthy;
        tracing::debug!(
            tool = %tool.id,
            score,
            health = %state,
            fallback,
            "selected tool"
        );
        Ok(Selection {
            tool,
            fallback,
            score,
        })
    }

    fn score(
        &self,
        tool: &ToolDescriptor,
        required: &BTreeSet<Capability>,
        state: HealthState,
        in_flight: usize,
    ) -> f64 {
        // Exact capability match scores 1.0; broader tools score lower
        let capability_match = if tool.capabilities.is_empty() {
            0.0
        } else {
            required.len() as f64 / tool.capabilities.len() as f64
        };

        let stats = self.performance.stats(&tool.id);
        let success_rate = stats.as_ref().map(|s| s.success_rate).unwrap_or(NEUTRAL);
        let latency = stats
            .as_ref()
            .map(|s| latency_score(s.p95))
            .unwrap_or(NEUTRAL);

        let health = match state {
            HealthState::Healthy => 1.0,
            HealthState::Degraded => 0.5,
            HealthState::Unhealthy => 0.0,
        };

        let load = 1.0 / (1.0 + in_flight as f64);

        self.weights.capability_match * capability_match
            + self.weights.success_rate * success_rate
            + self.weights.latency * latency
            + self.weights.health * health
            + self.weights.load * load
    }
}

/// Maps p95 latency into (0, 1]; lower latency scores higher
fn latency_score(p95: Duration) -> f64 {
    LATENCY_SCALE_MS / (p95.as_millis() as f64 + LATENCY_SCALE_MS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::EventBus;
    use crate::registry::capabilities;

    struct Fixture {
        registry: Arc<ToolRegistry>,
        performance: Arc<PerformanceMonitor>,
        health: Arc<HealthMonitor>,
        inflight: Arc<InflightTracker>,
        selector: ToolSelector,
    }

    fn fixture() -> Fixture {
        let registry = Arc::new(ToolRegistry::new());
        let performance = Arc::new(PerformanceMonitor::new());
        let health = Arc::new(HealthMonitor::new(EventBus::default()));
        let inflight = Arc::new(InflightTracker::new());
        let selector = ToolSelector::new(
            registry.clone(),
            performance.clone(),
            health.clone(),
            inflight.clone(),
        );
        Fixture {
            registry,
            performance,
            health,
            inflight,
            selector,
        }
    }

    fn register(fx: &Fixture, id: &str, caps: &[&str]) {
        fx.registry
            .register(
                ToolDescriptor::new(id, id, "1.0.0")
                    .with_capabilities(capabilities(caps))
                    .with_endpoint(format!("https://{}.internal/invoke", id)),
            )
            .unwrap();
    }

    fn record_samples(fx: &Fixture, id: &str, p95_ms: u64, success_rate: f64) {
        let total = 100;
        let successes = (success_rate * total as f64).round() as usize;
        for i in 0..total {
            fx.performance.record_outcome(
                id,
                Duration::from_millis(p95_ms),
                i < successes,
            );
        }
    }

    #[test]
    fn test_fast_healthy_tool_beats_slow_degraded_tool() {
        let fx = fixture();
        register(&fx, "tool_a", &["restaurant_search"]);
        register(&fx, "tool_b", &["restaurant_search"]);

        record_samples(&fx, "tool_a", 100, 0.99);
        record_samples(&fx, "tool_b", 500, 0.80);
        for _ in 0..3 {
            fx.health.record_outcome("tool_b", false);
        }
        assert_eq!(fx.health.health("tool_b"), HealthState::Degraded);

        let selection = fx
            .selector
            .select(&capabilities(&["restaurant_search"]), &BTreeSet::new())
            .unwrap();
        assert_eq!(selection.tool.id, "tool_a");
        assert!(!selection.fallback);
    }

    #[test]
    fn test_never_selects_unhealthy() {
        let fx = fixture();
        register(&fx, "only", &["restaurant_search"]);
        for _ in 0..5 {
            fx.health.record_outcome("only", false);
        }
        assert_eq!(fx.health.health("only"), HealthState::Unhealthy);

        let result = fx
            .selector
            .select(&capabilities(&["restaurant_search"]), &BTreeSet::new());
        assert!(matches!(result, Err(EngineError::NoToolAvailable(_))));
    }

    #[test]
    fn test_degraded_only_pool_sets_fallback_flag() {
        let fx = fixture();
        register(&fx, "shaky", &["restaurant_search"]);
        for _ in 0..3 {
            fx.health.record_outcome("shaky", false);
        }

        let selection = fx
            .selector
            .select(&capabilities(&["restaurant_search"]), &BTreeSet::new())
            .unwrap();
        assert_eq!(selection.tool.id, "shaky");
        assert!(selection.fallback);
    }

    #[test]
    fn test_no_candidates_is_error() {
        let fx = fixture();
        let result = fx
            .selector
            .select(&capabilities(&["flight_search"]), &BTreeSet::new());
        assert!(matches!(result, Err(EngineError::NoToolAvailable(_))));
    }

    #[test]
    fn test_exclusion_skips_failed_tool() {
        let fx = fixture();
        register(&fx, "primary", &["restaurant_search"]);
        register(&fx, "secondary", &["restaurant_search"]);
        record_samples(&fx, "primary", 50, 1.0);
        record_samples(&fx, "secondary", 400, 0.7);

        let first = fx
            .selector
            .select(&capabilities(&["restaurant_search"]), &BTreeSet::new())
            .unwrap();
        assert_eq!(first.tool.id, "primary");

        let mut exclude = BTreeSet::new();
        exclude.insert("primary".to_string());
        let second = fx
            .selector
            .select(&capabilities(&["restaurant_search"]), &exclude)
            .unwrap();
        assert_eq!(second.tool.id, "secondary");
    }

    #[test]
    fn test_exact_capability_match_beats_broader_tool() {
        let fx = fixture();
        register(&fx, "focused", &["restaurant_search"]);
        register(
            &fx,
            "kitchen_sink",
            &["restaurant_search", "poi_search", "weather_forecast"],
        );

        let selection = fx
            .selector
            .select(&capabilities(&["restaurant_search"]), &BTreeSet::new())
            .unwrap();
        assert_eq!(selection.tool.id, "focused");
    }

    #[test]
    fn test_load_breaks_otherwise_equal_scores() {
        let fx = fixture();
        register(&fx, "busy", &["restaurant_search"]);
        register(&fx, "idle", &["restaurant_search"]);

        let _guards: Vec<InflightGuard> =
            (0..4).map(|_| fx.inflight.begin("busy")).collect();

        let selection = fx
            .selector
            .select(&capabilities(&["restaurant_search"]), &BTreeSet::new())
            .unwrap();
        assert_eq!(selection.tool.id, "idle");
    }

    #[test]
    fn test_inflight_guard_decrements_on_drop() {
        let tracker = InflightTracker::new();
        {
            let _a = tracker.begin("places");
            let _b = tracker.begin("places");
            assert_eq!(tracker.count("places"), 2);
        }
        assert_eq!(tracker.count("places"), 0);
    }

    #[test]
    fn test_id_breaks_full_ties() {
        let fx = fixture();
        register(&fx, "beta", &["restaurant_search"]);
        register(&fx, "alpha", &["restaurant_search"]);

        let selection = fx
            .selector
            .select(&capabilities(&["restaurant_search"]), &BTreeSet::new())
            .unwrap();
        assert_eq!(selection.tool.id, "alpha");
    }
}
