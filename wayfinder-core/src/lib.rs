//! # Wayfinder - Adaptive Tool Orchestration
//!
//! Wayfinder routes natural-language or structured requests across a pool
//! of remote capability providers ("tools"), with:
//! - Capability-tagged tool registry with dynamic discovery
//! - Rolling per-tool performance statistics (latency, success, throughput)
//! - Circuit-breaker style health tracking fed by traffic and probes
//! - Keyword intent classification with session continuity
//! - Adaptive weighted tool selection with fallback
//! - Authenticated invocation with retry, backoff, and token refresh
//! - DAG workflow execution with per-step failure policies
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use wayfinder_core::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let engine = Engine::builder()
//!         .with_token_provider(Arc::new(StaticTokenProvider::new("token")))
//!         .with_tool(
//!             ToolDescriptor::new("places", "Places API", "1.0.0")
//!                 .with_capabilities(capabilities(&["restaurant_search"]))
//!                 .with_endpoint("https://places.internal/invoke"),
//!         )
//!         .build()?;
//!
//!     let response = engine
//!         .handle(EngineRequest::text("find restaurants for dinner"))
//!         .await;
//!     println!("{:?}", response.status);
//!
//!     engine.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! A request flows analyzer -> workflow engine -> selector -> invoker;
//! every invocation outcome feeds the performance and health monitors, so
//! routing decisions adapt to real-time conditions. Tool services, the
//! identity provider, and the upstream caller are all external
//! collaborators reached through injected interfaces.

pub mod config;
pub mod engine;
pub mod error;
pub mod intent;
pub mod invoker;
pub mod monitor;
pub mod registry;
pub mod selector;
pub mod workflow;

pub use config::EngineConfig;
pub use engine::{Engine, EngineBuilder, EngineRequest, EngineResponse};
pub use error::{EngineError, Result};

/// Commonly used types
pub mod prelude {
    pub use crate::config::EngineConfig;
    pub use crate::engine::{Engine, EngineBuilder, EngineRequest, EngineResponse};
    pub use crate::error::{EngineError, Result};
    pub use crate::intent::{Intent, IntentAnalyzer, IntentKind, SessionContext};
    pub use crate::invoker::{
        BearerToken, HttpConnector, StaticTokenProvider, TokenProvider, ToolConnector,
    };
    pub use crate::monitor::{HealthState, MonitorEvent, ToolStats};
    pub use crate::registry::{capabilities, Capability, DiscoveryManifest, ToolDescriptor};
    pub use crate::workflow::{
        FailurePolicy, StepSpec, WorkflowDefinition, WorkflowReport, WorkflowStatus,
    };
}
