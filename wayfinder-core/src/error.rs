//! Error types for Wayfinder operations

use std::time::Duration;

/// Result type for Wayfinder operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Error types for the orchestration engine
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Tool registration failed
    #[error("Registration error: {0}")]
    Registration(String),

    /// No tool satisfies the required capabilities
    #[error("No tool available for capabilities [{0}]")]
    NoToolAvailable(String),

    /// Authentication against a tool endpoint failed
    #[error("Authentication error: {0}")]
    Auth(String),

    /// An invocation exceeded its deadline
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// A tool returned an error response
    #[error("Tool error: {0}")]
    Tool(String),

    /// A tool response did not match its declared contract
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// A workflow was aborted by a step's failure policy
    #[error("Workflow aborted: {0}")]
    WorkflowAborted(String),

    /// Execution was cancelled
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Workflow definition is invalid
    #[error("Invalid workflow definition: {0}")]
    InvalidDefinition(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for EngineError {
    fn from(s: String) -> Self {
        EngineError::Other(s)
    }
}

impl From<&str> for EngineError {
    fn from(s: &str) -> Self {
        EngineError::Other(s.to_string())
    }
}

impl From<anyhow::Error> for EngineError {
    fn from(err: anyhow::Error) -> Self {
        EngineError::Other(err.to_string())
    }
}
