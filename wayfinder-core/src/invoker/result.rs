//! Normalized invocation outcomes
//!
//! Every invocation, however it ends, is folded into an
//! [`InvocationResult`]; transport-level failures never escape the
//! invoker as raw errors.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Classification of an invocation failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationErrorKind {
    /// The call exceeded its deadline
    Timeout,
    /// The tool rejected the bearer token
    AuthFailure,
    /// The tool reported an error or the transport failed
    ToolError,
    /// The response body did not parse as the declared output shape
    MalformedResponse,
    /// The owning workflow was cancelled mid-call
    Cancelled,
}

impl std::fmt::Display for InvocationErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            InvocationErrorKind::Timeout => "timeout",
            InvocationErrorKind::AuthFailure => "auth_failure",
            InvocationErrorKind::ToolError => "tool_error",
            InvocationErrorKind::MalformedResponse => "malformed_response",
            InvocationErrorKind::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// A classified invocation failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationError {
    pub kind: InvocationErrorKind,
    pub message: String,
    /// Whether another attempt could plausibly succeed
    pub retryable: bool,
}

impl InvocationError {
    pub fn new(kind: InvocationErrorKind, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            kind,
            message: message.into(),
            retryable,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(InvocationErrorKind::Timeout, message, true)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(InvocationErrorKind::AuthFailure, message, false)
    }

    pub fn tool(message: impl Into<String>, retryable: bool) -> Self {
        Self::new(InvocationErrorKind::ToolError, message, retryable)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(InvocationErrorKind::MalformedResponse, message, false)
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(InvocationErrorKind::Cancelled, message, false)
    }
}

impl std::fmt::Display for InvocationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Final outcome of one `invoke` call, after all retries
#[derive(Debug, Clone)]
pub struct InvocationResult {
    /// Whether the invocation ultimately succeeded
    pub success: bool,

    /// Wall-clock time across all attempts
    pub latency: Duration,

    /// Response payload on success
    pub payload: Option<serde_json::Value>,

    /// Classified error on failure
    pub error: Option<InvocationError>,

    /// The invoked tool
    pub tool_id: String,

    /// Correlation id attached to every attempt
    pub correlation_id: String,

    /// Number of attempts made (including the successful one)
    pub attempts: u32,
}

impl InvocationResult {
    pub fn succeeded(
        tool_id: impl Into<String>,
        correlation_id: impl Into<String>,
        payload: serde_json::Value,
        latency: Duration,
        attempts: u32,
    ) -> Self {
        Self {
            success: true,
            latency,
            payload: Some(payload),
            error: None,
            tool_id: tool_id.into(),
            correlation_id: correlation_id.into(),
            attempts,
        }
    }

    pub fn failed(
        tool_id: impl Into<String>,
        correlation_id: impl Into<String>,
        error: InvocationError,
        latency: Duration,
        attempts: u32,
    ) -> Self {
        Self {
            success: false,
            latency,
            payload: None,
            error: Some(error),
            tool_id: tool_id.into(),
            correlation_id: correlation_id.into(),
            attempts,
        }
    }

    /// The failure kind, if the invocation failed
    pub fn error_kind(&self) -> Option<InvocationErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }
}
