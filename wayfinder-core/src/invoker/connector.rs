//! Transport seam for tool RPC calls
//!
//! [`ToolConnector`] is the closed contract every tool is invoked
//! through, regardless of what remote backend it wraps. The production
//! implementation is [`HttpConnector`]; tests substitute programmable
//! mocks.

use super::result::InvocationError;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// One outbound RPC request
#[derive(Debug, Clone)]
pub struct ConnectorRequest {
    /// Tool endpoint URL
    pub endpoint: String,

    /// JSON payload matching the tool's input schema
    pub payload: Value,

    /// Bearer token for the Authorization header
    pub bearer_token: String,

    /// Correlation id propagated as a header for tracing
    pub correlation_id: String,

    /// Deadline for this single attempt
    pub timeout: Duration,
}

/// Closed invoke/ping contract over a remote tool
#[async_trait]
pub trait ToolConnector: Send + Sync {
    /// Execute one authenticated call; errors come back classified
    async fn call(&self, request: ConnectorRequest) -> Result<Value, InvocationError>;

    /// Lightweight liveness check against an endpoint
    async fn ping(&self, endpoint: &str, timeout: Duration) -> bool;
}

/// HTTP(S) connector speaking the tool RPC contract
pub struct HttpConnector {
    client: reqwest::Client,
}

impl HttpConnector {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for HttpConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolConnector for HttpConnector {
    async fn call(&self, request: ConnectorRequest) -> Result<Value, InvocationError> {
        let response = self
            .client
            .post(&request.endpoint)
            .bearer_auth(&request.bearer_token)
            .header("x-correlation-id", &request.correlation_id)
            .json(&request.payload)
            .timeout(request.timeout)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(InvocationError::auth(format!(
                "tool rejected credentials with status {}",
                status.as_u16()
            )));
        }
        if !status.is_success() {
            // 408/429 and 5xx are worth another attempt; other 4xx are not
            let retryable = status.is_server_error()
                || status == reqwest::StatusCode::REQUEST_TIMEOUT
                || status == reqwest::StatusCode::TOO_MANY_REQUESTS;
            return Err(InvocationError::tool(
                format!("tool returned status {}", status.as_u16()),
                retryable,
            ));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| InvocationError::malformed(format!("response body did not parse: {}", e)))
    }

    async fn ping(&self, endpoint: &str, timeout: Duration) -> bool {
        self.client
            .get(endpoint)
            .timeout(timeout)
            .send()
            .await
            .map(|r| !r.status().is_server_error())
            .unwrap_or(false)
    }
}

fn classify_transport_error(error: reqwest::Error) -> InvocationError {
    if error.is_timeout() {
        InvocationError::timeout(format!("call exceeded deadline: {}", error))
    } else if error.is_decode() {
        InvocationError::malformed(format!("response decode failed: {}", error))
    } else {
        InvocationError::tool(format!("transport failure: {}", error), true)
    }
}
