//! Runtime state of one workflow execution

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Lifecycle of a single step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    Pending,
    Running,
    Retrying,
    Succeeded,
    Failed,
    Skipped,
    Cancelled,
}

impl StepState {
    /// Terminal states never change again
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepState::Succeeded | StepState::Failed | StepState::Skipped | StepState::Cancelled
        )
    }
}

impl std::fmt::Display for StepState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StepState::Pending => "pending",
            StepState::Running => "running",
            StepState::Retrying => "retrying",
            StepState::Succeeded => "succeeded",
            StepState::Failed => "failed",
            StepState::Skipped => "skipped",
            StepState::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// Terminal record for one step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutcome {
    pub step_id: String,
    pub state: StepState,

    /// Tool that produced the final attempt, when one was selected
    pub tool_id: Option<String>,

    /// Response payload on success
    pub result: Option<serde_json::Value>,

    /// Human-readable failure or skip reason
    pub error: Option<String>,

    /// Invocation attempts across retries and fallback
    pub attempts: u32,

    /// Whether a fallback tool (not the first selection) produced the result
    pub fallback_used: bool,
}

impl StepOutcome {
    pub fn skipped(step_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            state: StepState::Skipped,
            tool_id: None,
            result: None,
            error: Some(reason.into()),
            attempts: 0,
            fallback_used: false,
        }
    }

    pub fn cancelled(step_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            state: StepState::Cancelled,
            tool_id: None,
            result: None,
            error: Some(reason.into()),
            attempts: 0,
            fallback_used: false,
        }
    }
}

/// Aggregated workflow status exposed to the upstream caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Every step succeeded
    Success,
    /// Every required step succeeded or was permissibly skipped
    Partial,
    /// At least one required step could not complete
    Failure,
}

/// One entry in the aggregated error list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepFailure {
    pub step_id: String,
    pub reason: String,
}

/// Final result of one workflow execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowReport {
    pub status: WorkflowStatus,

    /// Terminal outcome per step id
    pub step_outcomes: BTreeMap<String, StepOutcome>,

    /// Non-fatal notes (skipped optional steps, fallback selections)
    pub warnings: Vec<String>,

    /// Failed or cancelled steps with reasons
    pub errors: Vec<StepFailure>,

    /// Wall-clock execution time
    #[serde(with = "humantime_serde")]
    pub duration: Duration,

    /// Set when the whole execution failed for one overall reason
    pub failure_reason: Option<String>,
}

impl WorkflowReport {
    /// Results of every succeeded step, keyed by step id
    pub fn results(&self) -> BTreeMap<String, serde_json::Value> {
        self.step_outcomes
            .iter()
            .filter(|(_, o)| o.state == StepState::Succeeded)
            .filter_map(|(id, o)| o.result.clone().map(|r| (id.clone(), r)))
            .collect()
    }

    pub fn outcome(&self, step_id: &str) -> Option<&StepOutcome> {
        self.step_outcomes.get(step_id)
    }
}
