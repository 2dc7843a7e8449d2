//! Performance and health monitoring
//!
//! Two monitors observe tool behavior: [`PerformanceMonitor`] keeps a
//! sliding window of latency/success samples per tool, and
//! [`HealthMonitor`] derives a circuit-breaker style health state from
//! consecutive outcomes. Both feed the [`EventBus`] so external systems
//! can observe transitions without polling.

pub mod events;
pub mod health;
pub mod performance;

pub use events::{EventBus, MonitorEvent};
pub use health::{HealthMonitor, HealthProber, HealthState, HealthThresholds, ProbeConfig};
pub use performance::{PerformanceMonitor, ToolStats, WindowConfig};
