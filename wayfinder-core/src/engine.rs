//! Engine facade wiring every component together
//!
//! One [`Engine`] instance owns the registry, monitors, analyzer,
//! selector, invoker, and workflow engine, and exposes the upstream
//! request/response contract: callers always receive a well-formed
//! [`EngineResponse`], never a raw error.

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::intent::{Intent, IntentAnalyzer, IntentKind, SessionContext};
use crate::invoker::{HttpConnector, RetryConfig, TokenProvider, ToolConnector, ToolInvoker};
use crate::monitor::{
    EventBus, HealthMonitor, HealthProber, MonitorEvent, PerformanceMonitor,
};
use crate::registry::{DiscoveryManifest, ToolDescriptor, ToolRegistry};
use crate::selector::{InflightTracker, ToolSelector};
use crate::workflow::{
    definition_for, StepFailure, WorkflowEngine, WorkflowStatus,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// One upstream request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineRequest {
    /// Natural-language request text
    #[serde(default)]
    pub raw_text: String,

    /// Structured payload merged into every step invocation
    #[serde(default)]
    pub payload: Option<serde_json::Value>,

    /// Session context for intent continuity
    #[serde(default)]
    pub session: SessionContext,
}

impl EngineRequest {
    pub fn text(raw_text: impl Into<String>) -> Self {
        Self {
            raw_text: raw_text.into(),
            payload: None,
            session: SessionContext::default(),
        }
    }
}

/// The upstream response contract
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineResponse {
    /// Overall status
    pub status: WorkflowStatus,

    /// Assembled payload: intent summary plus per-step results
    pub result: serde_json::Value,

    /// Non-fatal notes
    pub warnings: Vec<String>,

    /// Failed or cancelled steps with reasons
    pub errors: Vec<StepFailure>,
}

impl EngineResponse {
    fn failure(result: serde_json::Value, warnings: Vec<String>, errors: Vec<StepFailure>) -> Self {
        Self {
            status: WorkflowStatus::Failure,
            result,
            warnings,
            errors,
        }
    }
}

/// Builder for [`Engine`]
pub struct EngineBuilder {
    config: EngineConfig,
    connector: Option<Arc<dyn ToolConnector>>,
    tokens: Option<Arc<dyn TokenProvider>>,
    descriptors: Vec<ToolDescriptor>,
    manifest: Option<DiscoveryManifest>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            connector: None,
            tokens: None,
            descriptors: Vec::new(),
            manifest: None,
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_connector(mut self, connector: Arc<dyn ToolConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn with_token_provider(mut self, tokens: Arc<dyn TokenProvider>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Register a tool at startup
    pub fn with_tool(mut self, descriptor: ToolDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    /// Register every tool from a discovery manifest at startup
    pub fn with_manifest(mut self, manifest: DiscoveryManifest) -> Self {
        self.manifest = Some(manifest);
        self
    }

    pub fn build(self) -> Result<Engine> {
        self.config.validate()?;
        let tokens = self.tokens.ok_or_else(|| {
            EngineError::Configuration("a token provider is required".to_string())
        })?;
        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(HttpConnector::new()));

        let events = EventBus::default();
        let registry = Arc::new(ToolRegistry::new());
        let performance = Arc::new(PerformanceMonitor::with_config(
            self.config.performance.clone(),
        ));
        let health = Arc::new(HealthMonitor::with_thresholds(
            self.config.health.clone(),
            events.clone(),
        ));
        let inflight = Arc::new(InflightTracker::new());

        for descriptor in self.descriptors {
            registry
                .register(descriptor)
                .map_err(|e| EngineError::Registration(e.to_string()))?;
        }
        if let Some(manifest) = &self.manifest {
            manifest.register_into(&registry)?;
        }
        if let Some(path) = &self.config.manifest_path {
            DiscoveryManifest::load(path)?.register_into(&registry)?;
        }

        let selector = Arc::new(ToolSelector::with_weights(
            registry.clone(),
            performance.clone(),
            health.clone(),
            inflight.clone(),
            self.config.selection.clone(),
        ));
        let retry: RetryConfig = self.config.retry.clone();
        let invoker = Arc::new(ToolInvoker::new(
            connector.clone(),
            tokens,
            retry,
            performance.clone(),
            health.clone(),
            inflight,
            events.clone(),
        ));
        let workflows = WorkflowEngine::new(registry.clone(), selector, invoker);
        let analyzer = IntentAnalyzer::with_config(self.config.intent.clone());

        let shutdown = CancellationToken::new();
        let prober_handle = if self.config.probe.enabled {
            let prober = HealthProber::new(
                registry.clone(),
                health.clone(),
                connector,
                events.clone(),
                self.config.probe.clone(),
            );
            Some(prober.spawn(shutdown.child_token()))
        } else {
            None
        };

        Ok(Engine {
            config: self.config,
            registry,
            analyzer,
            workflows,
            events,
            shutdown,
            prober_handle: Mutex::new(prober_handle),
        })
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The tool orchestration engine
pub struct Engine {
    config: EngineConfig,
    registry: Arc<ToolRegistry>,
    analyzer: IntentAnalyzer,
    workflows: WorkflowEngine,
    events: EventBus,
    shutdown: CancellationToken,
    prober_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Handle one upstream request end to end
    ///
    /// Classifies the request, runs the matching workflow, and folds the
    /// outcome into the response contract. Never returns an error: an
    /// unclassifiable request and an internal failure both come back as
    /// structured failure responses.
    pub async fn handle(&self, request: EngineRequest) -> EngineResponse {
        let intent = self.analyzer.classify(&request.raw_text, &request.session);
        tracing::info!(intent = %intent.kind, confidence = intent.confidence, "handling request");

        if intent.kind == IntentKind::Unknown {
            return EngineResponse::failure(
                json!({
                    "intent": intent.kind,
                    "confidence": intent.confidence,
                    "parameters": intent.parameters,
                }),
                vec![
                    "request could not be classified with enough confidence; please rephrase"
                        .to_string(),
                ],
                Vec::new(),
            );
        }

        let intent = merge_payload(intent, request.payload);
        let definition = match definition_for(&intent) {
            Some(definition) => definition,
            None => {
                return EngineResponse::failure(
                    json!({ "intent": intent.kind }),
                    vec![format!("no workflow available for intent '{}'", intent.kind)],
                    Vec::new(),
                );
            }
        };

        let report = match self
            .workflows
            .execute(&definition, &intent, self.config.workflow.default_budget)
            .await
        {
            Ok(report) => report,
            Err(e) => {
                tracing::error!("workflow execution rejected: {}", e);
                return EngineResponse::failure(
                    json!({ "intent": intent.kind }),
                    Vec::new(),
                    vec![StepFailure {
                        step_id: "<workflow>".to_string(),
                        reason: e.to_string(),
                    }],
                );
            }
        };

        let mut warnings = report.warnings.clone();
        if let Some(reason) = &report.failure_reason {
            warnings.push(format!("workflow ended early: {}", reason));
        }
        EngineResponse {
            status: report.status,
            result: json!({
                "intent": intent.kind,
                "confidence": intent.confidence,
                "parameters": intent.parameters,
                "steps": report.results(),
            }),
            warnings,
            errors: report.errors,
        }
    }

    /// Handle to the tool registry, for dynamic registration
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Subscribe to health-transition and invocation-outcome events
    pub fn subscribe_events(&self) -> broadcast::Receiver<MonitorEvent> {
        self.events.subscribe()
    }

    /// Stop the background prober and drain it
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let handle = self.prober_handle.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("tools", &self.registry.len())
            .finish()
    }
}

/// Merge a caller-supplied structured payload into the intent parameters
fn merge_payload(mut intent: Intent, payload: Option<serde_json::Value>) -> Intent {
    use crate::intent::ParamValue;

    let Some(serde_json::Value::Object(map)) = payload else {
        return intent;
    };
    for (key, value) in map {
        let param = match value {
            serde_json::Value::String(s) => ParamValue::Text(s),
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(n) => ParamValue::Number(n),
                None => continue,
            },
            serde_json::Value::Array(items) => ParamValue::List(
                items
                    .into_iter()
                    .filter_map(|v| match v {
                        serde_json::Value::String(s) => Some(s),
                        other => Some(other.to_string()),
                    })
                    .collect(),
            ),
            _ => continue,
        };
        // Explicit payload wins over extracted parameters
        intent.parameters.insert(key, param);
    }
    intent
}
