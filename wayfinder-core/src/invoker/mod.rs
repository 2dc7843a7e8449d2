//! Authenticated tool invocation with timeout, retry, and backoff
//!
//! The invoker owns the full lifecycle of one tool call: token
//! attachment, correlation id, per-attempt deadline, retry with
//! exponential backoff for transient failures, and a single forced token
//! refresh on auth rejection. Every attempt's outcome feeds the
//! performance and health monitors, and the final outcome is always a
//! normalized [`InvocationResult`].

mod auth;
mod connector;
mod result;
mod retry;

pub use auth::{BearerToken, StaticTokenProvider, TokenProvider};
pub use connector::{ConnectorRequest, HttpConnector, ToolConnector};
pub use result::{InvocationError, InvocationErrorKind, InvocationResult};
pub use retry::RetryConfig;

use crate::monitor::{EventBus, HealthMonitor, MonitorEvent, PerformanceMonitor};
use crate::registry::ToolDescriptor;
use crate::selector::InflightTracker;
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Per-call options supplied by the workflow engine
#[derive(Debug, Clone)]
pub struct InvokeOptions {
    /// Overall deadline across all attempts
    pub timeout: Duration,

    /// Cancellation token of the owning workflow execution
    pub cancel: CancellationToken,

    /// Correlation id; generated when absent
    pub correlation_id: Option<String>,
}

impl InvokeOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            cancel: CancellationToken::new(),
            correlation_id: None,
        }
    }
}

/// Executes authenticated RPC calls against selected tools
pub struct ToolInvoker {
    connector: Arc<dyn ToolConnector>,
    tokens: Arc<dyn TokenProvider>,
    retry: RetryConfig,
    performance: Arc<PerformanceMonitor>,
    health: Arc<HealthMonitor>,
    inflight: Arc<InflightTracker>,
    events: EventBus,
}

impl ToolInvoker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        connector: Arc<dyn ToolConnector>,
        tokens: Arc<dyn TokenProvider>,
        retry: RetryConfig,
        performance: Arc<PerformanceMonitor>,
        health: Arc<HealthMonitor>,
        inflight: Arc<InflightTracker>,
        events: EventBus,
    ) -> Self {
        Self {
            connector,
            tokens,
            retry,
            performance,
            health,
            inflight,
            events,
        }
    }

    /// Invoke a tool with the configured retry policy
    ///
    /// Transient failures (timeout, retryable tool errors) are retried up
    /// to the configured attempt bound with backoff; an auth failure
    /// forces exactly one token refresh and one immediate retry; 4xx-class
    /// and malformed-response failures are not retried. The outcome of
    /// every attempt is recorded into the monitors.
    pub async fn invoke(
        &self,
        tool: &ToolDescriptor,
        payload: Value,
        options: InvokeOptions,
    ) -> InvocationResult {
        let correlation_id = options
            .correlation_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let started = Instant::now();
        let deadline = started + options.timeout;
        let _inflight = self.inflight.begin(&tool.id);

        let mut attempts: u32 = 0;
        let mut transient_attempts: u32 = 0;
        let mut refreshed = false;
        let mut token = match self.tokens.token().await {
            Ok(token) => token,
            Err(e) => {
                return self.finish_failed(
                    tool,
                    &correlation_id,
                    InvocationError::auth(format!("token acquisition failed: {}", e)),
                    started,
                    0,
                );
            }
        };

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return self.finish_failed(
                    tool,
                    &correlation_id,
                    InvocationError::timeout("invocation budget exhausted"),
                    started,
                    attempts,
                );
            }

            attempts += 1;
            let request = ConnectorRequest {
                endpoint: tool.endpoint.clone(),
                payload: payload.clone(),
                bearer_token: token.reveal().to_string(),
                correlation_id: correlation_id.clone(),
                timeout: remaining,
            };

            let attempt_started = Instant::now();
            let outcome = tokio::select! {
                _ = options.cancel.cancelled() => {
                    return InvocationResult::failed(
                        &tool.id,
                        &correlation_id,
                        InvocationError::cancelled("workflow cancelled"),
                        started.elapsed(),
                        attempts,
                    );
                }
                outcome = self.connector.call(request) => outcome,
            };
            let attempt_latency = attempt_started.elapsed();

            match outcome {
                Ok(value) => {
                    self.record(tool, attempt_latency, true, None);
                    return InvocationResult::succeeded(
                        &tool.id,
                        &correlation_id,
                        value,
                        started.elapsed(),
                        attempts,
                    );
                }
                Err(error) => {
                    tracing::warn!(
                        tool = %tool.id,
                        attempt = attempts,
                        kind = %error.kind,
                        "invocation attempt failed: {}",
                        error.message
                    );
                    self.record(tool, attempt_latency, false, Some(&error));

                    if error.kind == InvocationErrorKind::AuthFailure && !refreshed {
                        // One forced refresh, retried immediately without backoff
                        refreshed = true;
                        match self.tokens.refresh().await {
                            Ok(new_token) => {
                                tracing::debug!(tool = %tool.id, "token refreshed after auth failure");
                                token = new_token;
                                continue;
                            }
                            Err(e) => {
                                return self.finish_with(
                                    tool,
                                    &correlation_id,
                                    InvocationError::auth(format!(
                                        "token refresh failed: {}",
                                        e
                                    )),
                                    started,
                                    attempts,
                                );
                            }
                        }
                    }

                    if error.retryable && transient_attempts + 1 < self.retry.max_attempts {
                        let delay = self.retry.delay_for_attempt(transient_attempts);
                        transient_attempts += 1;

                        let remaining = deadline.saturating_duration_since(Instant::now());
                        if delay >= remaining {
                            return self.finish_with(
                                tool,
                                &correlation_id,
                                InvocationError::timeout(
                                    "invocation budget exhausted during backoff",
                                ),
                                started,
                                attempts,
                            );
                        }
                        tokio::select! {
                            _ = options.cancel.cancelled() => {
                                return InvocationResult::failed(
                                    &tool.id,
                                    &correlation_id,
                                    InvocationError::cancelled("workflow cancelled"),
                                    started.elapsed(),
                                    attempts,
                                );
                            }
                            _ = tokio::time::sleep(delay) => {}
                        }
                        continue;
                    }

                    return self.finish_with(tool, &correlation_id, error, started, attempts);
                }
            }
        }
    }

    /// Record one attempt into the monitors and emit an outcome event
    fn record(
        &self,
        tool: &ToolDescriptor,
        latency: Duration,
        success: bool,
        error: Option<&InvocationError>,
    ) {
        self.performance.record_outcome(&tool.id, latency, success);
        self.health.record_outcome(&tool.id, success);
        self.events.emit(MonitorEvent::InvocationOutcome {
            tool_id: tool.id.clone(),
            success,
            latency_ms: latency.as_millis() as u64,
            probe: false,
            error: error.map(|e| e.to_string()),
            at: Utc::now(),
        });
    }

    /// A terminal failure whose attempt was already recorded
    fn finish_with(
        &self,
        tool: &ToolDescriptor,
        correlation_id: &str,
        error: InvocationError,
        started: Instant,
        attempts: u32,
    ) -> InvocationResult {
        InvocationResult::failed(&tool.id, correlation_id, error, started.elapsed(), attempts)
    }

    /// A terminal failure that never reached the wire; still recorded so
    /// health reflects the tool being unreachable
    fn finish_failed(
        &self,
        tool: &ToolDescriptor,
        correlation_id: &str,
        error: InvocationError,
        started: Instant,
        attempts: u32,
    ) -> InvocationResult {
        self.record(tool, started.elapsed(), false, Some(&error));
        InvocationResult::failed(&tool.id, correlation_id, error, started.elapsed(), attempts)
    }
}
