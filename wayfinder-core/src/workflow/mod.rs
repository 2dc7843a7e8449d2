//! Workflow execution
//!
//! A workflow is a DAG of steps; each step resolves a tool through the
//! selector, invokes it through the invoker, and applies a per-step
//! failure policy. Independent steps run concurrently, dependent steps
//! wait, and the whole execution runs under one deadline-derived
//! cancellation token.

pub mod builtin;
mod definition;
mod engine;
mod execution;

pub use builtin::definition_for;
pub use definition::{FailurePolicy, StepSpec, WorkflowDefinition};
pub use engine::{WorkflowConfig, WorkflowEngine};
pub use execution::{StepFailure, StepOutcome, StepState, WorkflowReport, WorkflowStatus};
