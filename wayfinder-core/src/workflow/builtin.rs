//! Built-in workflow definitions per intent kind
//!
//! Each intent kind maps to a static DAG shape; the primary step inherits
//! the capability set the analyzer attached to the intent, so a food
//! search and a destination search share one definition.

use super::definition::{FailurePolicy, StepSpec, WorkflowDefinition};
use crate::intent::{Intent, IntentKind};
use crate::registry::capabilities;
use std::time::Duration;

const STEP_TIMEOUT: Duration = Duration::from_secs(10);
const INVOCATION_TIMEOUT: Duration = Duration::from_secs(8);

fn step(id: &str, caps: std::collections::BTreeSet<crate::registry::Capability>) -> StepSpec {
    StepSpec::new(id, caps)
        .with_timeout(STEP_TIMEOUT)
        .with_invocation_timeout(INVOCATION_TIMEOUT)
}

/// The workflow definition for a classified intent
///
/// `Unknown` has no workflow; the caller turns that into a failure
/// response with a clarification warning.
pub fn definition_for(intent: &Intent) -> Option<WorkflowDefinition> {
    let definition = match intent.kind {
        IntentKind::Search => WorkflowDefinition::new("search")
            .with_step(
                step("search", intent.required_capabilities.clone())
                    .on_failure(FailurePolicy::FallbackTool),
            )
            .with_step(
                step("rank", capabilities(&["result_ranking"]))
                    .depends_on("search")
                    .on_failure(FailurePolicy::Skip)
                    .optional(),
            ),
        IntentKind::Recommendation => WorkflowDefinition::new("recommendation")
            .with_step(
                step("candidates", capabilities(&["recommendation"]))
                    .on_failure(FailurePolicy::FallbackTool),
            )
            .with_step(
                step("rank", capabilities(&["result_ranking"]))
                    .depends_on("candidates")
                    .on_failure(FailurePolicy::Retry)
                    .with_max_retries(1),
            )
            .with_step(
                step("enrich", capabilities(&["local_information"]))
                    .depends_on("rank")
                    .on_failure(FailurePolicy::Skip)
                    .optional(),
            ),
        IntentKind::Analysis => WorkflowDefinition::new("analysis").with_step(
            step("analyze", capabilities(&["review_analysis"]))
                .on_failure(FailurePolicy::Retry)
                .with_max_retries(2),
        ),
        IntentKind::Itinerary => WorkflowDefinition::new("itinerary")
            .with_step(
                step("attractions", capabilities(&["destination_search"]))
                    .on_failure(FailurePolicy::FallbackTool),
            )
            .with_step(
                step("dining", capabilities(&["restaurant_search"]))
                    .on_failure(FailurePolicy::FallbackTool),
            )
            .with_step(
                step("weather", capabilities(&["weather_forecast"]))
                    .on_failure(FailurePolicy::Skip)
                    .optional(),
            )
            .with_step(
                step("assemble", capabilities(&["itinerary_planning"]))
                    .depends_on("attractions")
                    .depends_on("dining")
                    .depends_on("weather")
                    .allow_skipped_deps()
                    .on_failure(FailurePolicy::AbortWorkflow),
            ),
        IntentKind::Information => WorkflowDefinition::new("information").with_step(
            step("lookup", capabilities(&["local_information"]))
                .on_failure(FailurePolicy::FallbackTool),
        ),
        IntentKind::Unknown => return None,
    };
    Some(definition)
}
