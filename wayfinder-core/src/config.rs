//! Engine configuration
//!
//! All tuning knobs in one serializable struct, loadable from a TOML
//! file plus `WAYFINDER_`-prefixed environment overrides. Scoring
//! weights and hysteresis thresholds are deliberately configuration, not
//! hard-coded constants.

use crate::error::{EngineError, Result};
use crate::intent::IntentConfig;
use crate::invoker::RetryConfig;
use crate::monitor::{HealthThresholds, ProbeConfig, WindowConfig};
use crate::selector::SelectionWeights;
use crate::workflow::WorkflowConfig;
use serde::{Deserialize, Serialize};

/// Full engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Selector scoring weights
    pub selection: SelectionWeights,

    /// Health state machine thresholds
    pub health: HealthThresholds,

    /// Active prober settings
    pub probe: ProbeConfig,

    /// Invocation retry policy
    pub retry: RetryConfig,

    /// Performance sliding window bounds
    pub performance: WindowConfig,

    /// Intent classifier knobs
    pub intent: IntentConfig,

    /// Workflow budgets
    pub workflow: WorkflowConfig,

    /// Path to a discovery manifest to load at startup
    pub manifest_path: Option<std::path::PathBuf>,
}

impl EngineConfig {
    /// Load configuration from file and environment variables.
    ///
    /// Loads in this order:
    /// 1. Default configuration
    /// 2. Configuration file (wayfinder.toml or path from WAYFINDER_CONFIG_PATH)
    /// 3. Environment variable overrides
    pub fn load() -> Result<Self> {
        use figment::{
            providers::{Env, Format, Toml},
            Figment,
        };

        let mut figment = Figment::new()
            .merge(Toml::file("wayfinder.toml"))
            .merge(Env::prefixed("WAYFINDER_").split("_"));

        if let Ok(path) = std::env::var("WAYFINDER_CONFIG_PATH") {
            figment = figment.merge(Toml::file(path));
        }

        let config: EngineConfig = figment.extract().map_err(|e| {
            EngineError::Configuration(format!("failed to load configuration: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        use figment::{
            providers::{Format, Toml},
            Figment,
        };

        let config: EngineConfig = Figment::new()
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| {
                EngineError::Configuration(format!("failed to load configuration file: {}", e))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Sanity-check the loaded values
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.intent.threshold) {
            return Err(EngineError::Configuration(format!(
                "intent threshold must be in [0, 1], got {}",
                self.intent.threshold
            )));
        }
        if self.health.degrade_after == 0
            || self.health.unhealthy_after <= self.health.degrade_after
            || self.health.recover_after == 0
        {
            return Err(EngineError::Configuration(
                "health thresholds must satisfy 0 < degrade_after < unhealthy_after and recover_after > 0"
                    .to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(EngineError::Configuration(
                "retry max_attempts must be at least 1".to_string(),
            ));
        }
        if self.performance.max_samples == 0 {
            return Err(EngineError::Configuration(
                "performance window must hold at least 1 sample".to_string(),
            ));
        }
        if self.workflow.default_budget.is_zero() {
            return Err(EngineError::Configuration(
                "workflow default budget must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(
            file,
            r#"
[intent]
threshold = 0.6
context_bonus = 0.05

[health]
degrade_after = 2
unhealthy_after = 4
recover_after = 2

[workflow]
default_budget = "45s"
"#
        )
        .unwrap();

        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.intent.threshold, 0.6);
        assert_eq!(config.health.degrade_after, 2);
        assert_eq!(
            config.workflow.default_budget,
            std::time::Duration::from_secs(45)
        );
        // Unspecified sections keep their defaults
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let config = EngineConfig {
            intent: IntentConfig {
                threshold: 1.5,
                context_bonus: 0.1,
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inverted_health_thresholds_rejected() {
        let mut config = EngineConfig::default();
        config.health.unhealthy_after = 2;
        config.health.degrade_after = 5;
        assert!(config.validate().is_err());
    }
}
