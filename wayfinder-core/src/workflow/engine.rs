//! DAG scheduler for workflow execution
//!
//! The engine runs one [`WorkflowDefinition`] per request: it repeatedly
//! schedules every step whose dependencies reached a terminal allowed
//! state, runs ready steps concurrently, applies each step's failure
//! policy, and aggregates terminal step states into a single
//! [`WorkflowReport`]. The caller always gets a structured report; step
//! failures never escape as raw errors.

use super::definition::{FailurePolicy, StepSpec, WorkflowDefinition};
use super::execution::{StepFailure, StepOutcome, StepState, WorkflowReport, WorkflowStatus};
use crate::error::{EngineError, Result};
use crate::intent::Intent;
use crate::invoker::{InvocationErrorKind, InvokeOptions, ToolInvoker};
use crate::registry::{ToolDescriptor, ToolRegistry};
use crate::selector::ToolSelector;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Workflow-level tuning knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Overall time budget when the caller does not supply one
    #[serde(with = "humantime_serde")]
    pub default_budget: Duration,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            default_budget: Duration::from_secs(30),
        }
    }
}

/// Executes workflow definitions against the live tool pool
pub struct WorkflowEngine {
    registry: Arc<ToolRegistry>,
    selector: Arc<ToolSelector>,
    invoker: Arc<ToolInvoker>,
}

impl WorkflowEngine {
    pub fn new(
        registry: Arc<ToolRegistry>,
        selector: Arc<ToolSelector>,
        invoker: Arc<ToolInvoker>,
    ) -> Self {
        Self {
            registry,
            selector,
            invoker,
        }
    }

    /// Execute a definition within an overall time budget
    ///
    /// Fails fast with [`EngineError::InvalidDefinition`] when the
    /// definition does not validate; any other outcome, including a full
    /// workflow abort or timeout, comes back as a structured report.
    pub async fn execute(
        &self,
        definition: &WorkflowDefinition,
        intent: &Intent,
        budget: Duration,
    ) -> Result<WorkflowReport> {
        definition.validate(budget)?;
        tracing::info!(workflow = %definition.name, steps = definition.steps.len(), "executing workflow");

        let started = std::time::Instant::now();
        let deadline = tokio::time::Instant::now() + budget;
        let cancel = CancellationToken::new();

        let mut states: HashMap<String, StepState> = definition
            .steps
            .iter()
            .map(|s| (s.id.clone(), StepState::Pending))
            .collect();
        let mut outcomes: BTreeMap<String, StepOutcome> = BTreeMap::new();
        let mut results: HashMap<String, serde_json::Value> = HashMap::new();
        let mut join_set: JoinSet<StepOutcome> = JoinSet::new();
        let mut task_steps: HashMap<tokio::task::Id, String> = HashMap::new();
        let (state_tx, mut state_rx) = mpsc::unbounded_channel::<(String, StepState)>();
        let mut timed_out = false;
        let mut aborted_by: Option<String> = None;

        loop {
            if !timed_out && aborted_by.is_none() {
                self.schedule_ready(
                    definition,
                    intent,
                    &mut states,
                    &mut outcomes,
                    &results,
                    &mut join_set,
                    &mut task_steps,
                    &state_tx,
                    &cancel,
                );
            }
            if join_set.is_empty() {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep_until(deadline), if !timed_out => {
                    tracing::warn!(workflow = %definition.name, "workflow budget exhausted, cancelling");
                    timed_out = true;
                    cancel.cancel();
                }
                Some((step_id, state)) = state_rx.recv() => {
                    // Mid-run updates (Retrying, back to Running) only ever
                    // touch steps that have not reached a terminal outcome
                    if let Some(current) = states.get_mut(&step_id) {
                        if !current.is_terminal() {
                            *current = state;
                        }
                    }
                }
                joined = join_set.join_next_with_id() => {
                    let outcome = match joined {
                        Some(Ok((id, outcome))) => {
                            task_steps.remove(&id);
                            outcome
                        }
                        Some(Err(join_error)) => {
                            // A panicked step task is committed as a failed
                            // step so aggregation never mistakes it for done
                            tracing::error!("step task failed to join: {}", join_error);
                            let step_id = task_steps.remove(&join_error.id());
                            match step_id.as_deref().and_then(|id| definition.step(id)) {
                                Some(step) => failed(
                                    step,
                                    None,
                                    format!("step task panicked: {}", join_error),
                                    0,
                                    false,
                                ),
                                None => continue,
                            }
                        }
                        None => break,
                    };
                    self.commit(
                        definition,
                        outcome,
                        &mut states,
                        &mut outcomes,
                        &mut results,
                        &mut aborted_by,
                        &cancel,
                    );
                }
            }
        }

        // Anything without a terminal outcome was starved by an abort or
        // the deadline
        for step in &definition.steps {
            if outcomes.contains_key(&step.id) {
                continue;
            }
            let reason = if timed_out {
                "workflow_timeout".to_string()
            } else if aborted_by.is_some() {
                format!(
                    "workflow aborted by step '{}'",
                    aborted_by.as_deref().unwrap_or("unknown")
                )
            } else {
                "step did not complete".to_string()
            };
            states.insert(step.id.clone(), StepState::Cancelled);
            outcomes.insert(step.id.clone(), StepOutcome::cancelled(&step.id, reason));
        }

        Ok(aggregate(
            definition,
            outcomes,
            timed_out,
            aborted_by,
            started.elapsed(),
        ))
    }

    /// Spawn every step whose dependencies allow it; cancel steps whose
    /// dependencies terminally preclude it. Repeats until a fixpoint so
    /// cancellations cascade in one pass.
    #[allow(clippy::too_many_arguments)]
    fn schedule_ready(
        &self,
        definition: &WorkflowDefinition,
        intent: &Intent,
        states: &mut HashMap<String, StepState>,
        outcomes: &mut BTreeMap<String, StepOutcome>,
        results: &HashMap<String, serde_json::Value>,
        join_set: &mut JoinSet<StepOutcome>,
        task_steps: &mut HashMap<tokio::task::Id, String>,
        state_tx: &mpsc::UnboundedSender<(String, StepState)>,
        cancel: &CancellationToken,
    ) {
        loop {
            let mut progressed = false;
            for step in &definition.steps {
                if states[&step.id] != StepState::Pending {
                    continue;
                }

                let mut blocked_by: Option<&str> = None;
                let mut waiting = false;
                for dep in &step.depends_on {
                    match states[dep.as_str()] {
                        StepState::Succeeded => {}
                        StepState::Skipped if step.allow_skipped_deps => {}
                        StepState::Failed | StepState::Cancelled | StepState::Skipped => {
                            blocked_by = Some(dep);
                            break;
                        }
                        _ => {
                            waiting = true;
                            break;
                        }
                    }
                }

                if let Some(dep) = blocked_by {
                    tracing::debug!(step = %step.id, dep = %dep, "cancelling step, dependency unavailable");
                    states.insert(step.id.clone(), StepState::Cancelled);
                    outcomes.insert(
                        step.id.clone(),
                        StepOutcome::cancelled(&step.id, format!("dependency_failed:{}", dep)),
                    );
                    progressed = true;
                    continue;
                }
                if waiting {
                    continue;
                }

                let inputs: BTreeMap<String, serde_json::Value> = step
                    .depends_on
                    .iter()
                    .filter_map(|d| results.get(d).map(|r| (d.clone(), r.clone())))
                    .collect();
                let payload = json!({
                    "parameters": intent.parameters,
                    "inputs": inputs,
                });

                states.insert(step.id.clone(), StepState::Running);
                progressed = true;
                tracing::debug!(step = %step.id, "step scheduled");
                let handle = join_set.spawn(run_step(
                    step.clone(),
                    payload,
                    self.registry.clone(),
                    self.selector.clone(),
                    self.invoker.clone(),
                    state_tx.clone(),
                    cancel.clone(),
                ));
                task_steps.insert(handle.id(), step.id.clone());
            }
            if !progressed {
                return;
            }
        }
    }

    /// Fold one terminal step outcome into the execution state
    #[allow(clippy::too_many_arguments)]
    fn commit(
        &self,
        definition: &WorkflowDefinition,
        outcome: StepOutcome,
        states: &mut HashMap<String, StepState>,
        outcomes: &mut BTreeMap<String, StepOutcome>,
        results: &mut HashMap<String, serde_json::Value>,
        aborted_by: &mut Option<String>,
        cancel: &CancellationToken,
    ) {
        let step_id = outcome.step_id.clone();
        states.insert(step_id.clone(), outcome.state);
        if outcome.state == StepState::Succeeded {
            if let Some(result) = &outcome.result {
                results.insert(step_id.clone(), result.clone());
            }
        }

        let abort = outcome.state == StepState::Failed
            && definition
                .step(&step_id)
                .map(|s| s.on_failure == FailurePolicy::AbortWorkflow)
                .unwrap_or(false);
        outcomes.insert(step_id.clone(), outcome);

        if abort && aborted_by.is_none() {
            tracing::warn!(step = %step_id, "step failure aborts workflow");
            *aborted_by = Some(step_id);
            cancel.cancel();
        }
    }
}

/// Run one step to a terminal outcome, applying its failure policy
async fn run_step(
    step: StepSpec,
    payload: serde_json::Value,
    registry: Arc<ToolRegistry>,
    selector: Arc<ToolSelector>,
    invoker: Arc<ToolInvoker>,
    state_tx: mpsc::UnboundedSender<(String, StepState)>,
    cancel: CancellationToken,
) -> StepOutcome {
    let step_deadline = tokio::time::Instant::now() + step.timeout;
    let mut exclude: BTreeSet<String> = BTreeSet::new();
    let mut sticky: Option<Arc<ToolDescriptor>> = None;
    let mut retries: u32 = 0;
    let mut fallback_tried = false;
    let mut on_fallback = false;
    let mut attempts: u32 = 0;

    loop {
        let remaining = step_deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            return failed(&step, None, "step budget exhausted", attempts, on_fallback);
        }

        // Sticky selection: retries reuse the previous tool; a fallback
        // re-selects with the failed tool excluded
        let tool = match &sticky {
            Some(tool) => tool.clone(),
            None => match resolve(&step, &registry, &selector, &exclude) {
                Ok(tool) => {
                    sticky = Some(tool.clone());
                    tool
                }
                Err(e) => {
                    // A skippable step with no selectable tool is skipped,
                    // not failed
                    if step.on_failure == FailurePolicy::Skip {
                        return StepOutcome::skipped(&step.id, e.to_string());
                    }
                    return failed(&step, None, e.to_string(), attempts, on_fallback);
                }
            },
        };

        let options = InvokeOptions {
            timeout: step.invocation_timeout.min(remaining),
            cancel: cancel.clone(),
            correlation_id: None,
        };
        if attempts > 0 {
            let _ = state_tx.send((step.id.clone(), StepState::Running));
        }
        let result = invoker.invoke(&tool, payload.clone(), options).await;
        attempts += result.attempts;

        if result.success {
            return StepOutcome {
                step_id: step.id.clone(),
                state: StepState::Succeeded,
                tool_id: Some(tool.id.clone()),
                result: result.payload,
                error: None,
                attempts,
                fallback_used: on_fallback,
            };
        }

        if let Some(err) = &result.error {
            if err.kind == InvocationErrorKind::Cancelled {
                return StepOutcome::cancelled(&step.id, err.to_string());
            }
        }
        let error = result
            .error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown invocation failure".to_string());

        match step.on_failure {
            FailurePolicy::Retry if retries < step.max_retries => {
                retries += 1;
                let _ = state_tx.send((step.id.clone(), StepState::Retrying));
                tracing::debug!(step = %step.id, tool = %tool.id, retry = retries, "step retrying on same tool");
                continue;
            }
            FailurePolicy::FallbackTool if !fallback_tried => {
                fallback_tried = true;
                on_fallback = true;
                exclude.insert(tool.id.clone());
                sticky = None;
                let _ = state_tx.send((step.id.clone(), StepState::Retrying));
                tracing::debug!(step = %step.id, excluded = %tool.id, "step falling back to alternate tool");
                continue;
            }
            FailurePolicy::Skip => {
                return StepOutcome::skipped(&step.id, error);
            }
            _ => {
                return failed(&step, Some(&tool.id), error, attempts, on_fallback);
            }
        }
    }
}

fn resolve(
    step: &StepSpec,
    registry: &ToolRegistry,
    selector: &ToolSelector,
    exclude: &BTreeSet<String>,
) -> Result<Arc<ToolDescriptor>> {
    if let Some(pinned) = &step.pinned_tool {
        if exclude.contains(pinned) {
            return Err(EngineError::NoToolAvailable(format!(
                "pinned tool '{}' already failed for step '{}'",
                pinned, step.id
            )));
        }
        return registry.get(pinned).ok_or_else(|| {
            EngineError::NoToolAvailable(format!("pinned tool '{}' is not registered", pinned))
        });
    }
    let selection = selector.select(&step.required_capabilities, exclude)?;
    if selection.fallback {
        tracing::warn!(step = %step.id, tool = %selection.tool.id, "no healthy candidate, using degraded tool");
    }
    Ok(selection.tool)
}

fn failed(
    step: &StepSpec,
    tool_id: Option<&str>,
    error: impl Into<String>,
    attempts: u32,
    fallback_used: bool,
) -> StepOutcome {
    StepOutcome {
        step_id: step.id.clone(),
        state: StepState::Failed,
        tool_id: tool_id.map(|t| t.to_string()),
        result: None,
        error: Some(error.into()),
        attempts,
        fallback_used,
    }
}

/// Fold terminal step states into the caller-facing report
fn aggregate(
    definition: &WorkflowDefinition,
    outcomes: BTreeMap<String, StepOutcome>,
    timed_out: bool,
    aborted_by: Option<String>,
    duration: Duration,
) -> WorkflowReport {
    let mut warnings = Vec::new();
    let mut errors = Vec::new();
    let mut all_succeeded = true;
    let mut required_ok = true;

    for step in &definition.steps {
        let outcome = match outcomes.get(&step.id) {
            Some(outcome) => outcome,
            None => continue,
        };
        match outcome.state {
            StepState::Succeeded => {
                if outcome.fallback_used {
                    warnings.push(format!(
                        "step '{}' succeeded via fallback tool '{}'",
                        step.id,
                        outcome.tool_id.as_deref().unwrap_or("unknown")
                    ));
                }
            }
            StepState::Skipped => {
                all_succeeded = false;
                warnings.push(format!(
                    "step '{}' skipped: {}",
                    step.id,
                    outcome.error.as_deref().unwrap_or("no reason")
                ));
            }
            StepState::Failed | StepState::Cancelled => {
                all_succeeded = false;
                if !step.optional {
                    required_ok = false;
                }
                errors.push(StepFailure {
                    step_id: step.id.clone(),
                    reason: outcome.error.clone().unwrap_or_else(|| "unknown".to_string()),
                });
            }
            _ => {
                all_succeeded = false;
                required_ok = false;
            }
        }
    }

    let (status, failure_reason) = if timed_out {
        let any_succeeded = outcomes
            .values()
            .any(|o| o.state == StepState::Succeeded);
        let status = if any_succeeded {
            WorkflowStatus::Partial
        } else {
            WorkflowStatus::Failure
        };
        (status, Some("workflow_timeout".to_string()))
    } else if let Some(step_id) = aborted_by {
        (
            WorkflowStatus::Failure,
            Some(format!("workflow aborted by step '{}'", step_id)),
        )
    } else if all_succeeded {
        (WorkflowStatus::Success, None)
    } else if required_ok {
        (WorkflowStatus::Partial, None)
    } else {
        (
            WorkflowStatus::Failure,
            errors
                .first()
                .map(|e| format!("step '{}' failed: {}", e.step_id, e.reason)),
        )
    };

    WorkflowReport {
        status,
        step_outcomes: outcomes,
        warnings,
        errors,
        duration,
        failure_reason,
    }
}
