//! Static workflow definitions
//!
//! A definition is a directed acyclic graph of step specs, defined per
//! intent kind and read-only at runtime. Validation happens before
//! execution: duplicate ids, unknown dependencies, cycles, and
//! inconsistent timeout ordering are all configuration errors.

use crate::error::{EngineError, Result};
use crate::registry::Capability;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::Duration;

/// What to do when a step's invocation ultimately fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Re-attempt on the same tool, up to the step's retry bound
    Retry,
    /// Re-select excluding the failed tool and retry once
    FallbackTool,
    /// Mark the step skipped; dependents may still proceed
    Skip,
    /// Cancel every remaining step and fail the workflow
    AbortWorkflow,
}

/// One node in a workflow DAG
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepSpec {
    /// Unique id within the definition
    pub id: String,

    /// Capabilities a tool must offer for this step
    pub required_capabilities: BTreeSet<Capability>,

    /// Bypass selection and use this exact tool
    #[serde(default)]
    pub pinned_tool: Option<String>,

    /// Steps that must reach a terminal allowed state first
    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Failure policy applied after the invoker gives up
    pub on_failure: FailurePolicy,

    /// Budget for the whole step including retries and fallback
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Budget for a single invocation within the step
    #[serde(with = "humantime_serde")]
    pub invocation_timeout: Duration,

    /// Step-level re-attempts under the `Retry` policy
    #[serde(default)]
    pub max_retries: u32,

    /// Optional steps may fail or be skipped without failing the workflow
    #[serde(default)]
    pub optional: bool,

    /// Whether this step may run when a dependency was skipped
    #[serde(default)]
    pub allow_skipped_deps: bool,
}

impl StepSpec {
    pub fn new(id: impl Into<String>, required_capabilities: BTreeSet<Capability>) -> Self {
        Self {
            id: id.into(),
            required_capabilities,
            pinned_tool: None,
            depends_on: Vec::new(),
            on_failure: FailurePolicy::Retry,
            timeout: Duration::from_secs(10),
            invocation_timeout: Duration::from_secs(8),
            max_retries: 1,
            optional: false,
            allow_skipped_deps: false,
        }
    }

    pub fn depends_on(mut self, step_id: impl Into<String>) -> Self {
        self.depends_on.push(step_id.into());
        self
    }

    pub fn on_failure(mut self, policy: FailurePolicy) -> Self {
        self.on_failure = policy;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_invocation_timeout(mut self, timeout: Duration) -> Self {
        self.invocation_timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_pinned_tool(mut self, tool_id: impl Into<String>) -> Self {
        self.pinned_tool = Some(tool_id.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn allow_skipped_deps(mut self) -> Self {
        self.allow_skipped_deps = true;
        self
    }
}

/// A read-only DAG of steps executed for one intent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Definition name, for logging and reports
    pub name: String,

    /// Steps in declaration order; execution order follows the DAG
    pub steps: Vec<StepSpec>,
}

impl WorkflowDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn with_step(mut self, step: StepSpec) -> Self {
        self.steps.push(step);
        self
    }

    pub fn step(&self, id: &str) -> Option<&StepSpec> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Validate the definition against a workflow time budget
    ///
    /// Checks id uniqueness, dependency references, acyclicity, and the
    /// timeout ordering `invocation_timeout <= step timeout <= budget`.
    pub fn validate(&self, budget: Duration) -> Result<()> {
        if self.steps.is_empty() {
            return Err(EngineError::InvalidDefinition(format!(
                "workflow '{}' has no steps",
                self.name
            )));
        }

        let mut ids = HashSet::new();
        for step in &self.steps {
            if !ids.insert(step.id.as_str()) {
                return Err(EngineError::InvalidDefinition(format!(
                    "duplicate step id '{}'",
                    step.id
                )));
            }
            if step.required_capabilities.is_empty() && step.pinned_tool.is_none() {
                return Err(EngineError::InvalidDefinition(format!(
                    "step '{}' declares neither capabilities nor a pinned tool",
                    step.id
                )));
            }
            if step.invocation_timeout > step.timeout {
                return Err(EngineError::InvalidDefinition(format!(
                    "step '{}': invocation timeout {:?} exceeds step timeout {:?}",
                    step.id, step.invocation_timeout, step.timeout
                )));
            }
            if step.timeout > budget {
                return Err(EngineError::InvalidDefinition(format!(
                    "step '{}': step timeout {:?} exceeds workflow budget {:?}",
                    step.id, step.timeout, budget
                )));
            }
        }

        for step in &self.steps {
            for dep in &step.depends_on {
                if !ids.contains(dep.as_str()) {
                    return Err(EngineError::InvalidDefinition(format!(
                        "step '{}' depends on unknown step '{}'",
                        step.id, dep
                    )));
                }
                if dep == &step.id {
                    return Err(EngineError::InvalidDefinition(format!(
                        "step '{}' depends on itself",
                        step.id
                    )));
                }
            }
        }

        self.check_acyclic()
    }

    /// Kahn's topological sort; leftover nodes mean a cycle
    fn check_acyclic(&self) -> Result<()> {
        let mut in_degree: HashMap<&str, usize> = self
            .steps
            .iter()
            .map(|s| (s.id.as_str(), s.depends_on.len()))
            .collect();
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
        for step in &self.steps {
            for dep in &step.depends_on {
                dependents
                    .entry(dep.as_str())
                    .or_default()
                    .push(step.id.as_str());
            }
        }

        let mut ready: Vec<&str> = in_degree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(id, _)| *id)
            .collect();
        let mut visited = 0;
        while let Some(id) = ready.pop() {
            visited += 1;
            for dependent in dependents.get(id).into_iter().flatten() {
                let degree = in_degree.get_mut(dependent).ok_or_else(|| {
                    EngineError::InvalidDefinition(format!("unknown step '{}'", dependent))
                })?;
                *degree -= 1;
                if *degree == 0 {
                    ready.push(dependent);
                }
            }
        }

        if visited != self.steps.len() {
            return Err(EngineError::InvalidDefinition(format!(
                "workflow '{}' contains a dependency cycle",
                self.name
            )));
        }
        Ok(())
    }
}
