//! Intent analysis for incoming requests
//!
//! The analyzer classifies a raw request into one of a closed set of
//! intents, each carrying a confidence score, the capability set needed
//! to satisfy it, and best-effort extracted parameters. Classification
//! never fails: anything unparseable comes back as [`IntentKind::Unknown`]
//! with confidence 0.

mod classifier;
mod params;

pub use classifier::{IntentAnalyzer, IntentConfig};

use crate::registry::Capability;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// The classified purpose of an incoming request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    /// Locate places matching criteria
    Search,
    /// Rank or suggest options
    Recommendation,
    /// Examine reviews or compare options
    Analysis,
    /// Plan a multi-stop schedule
    Itinerary,
    /// Answer a factual question about a place
    Information,
    /// Could not be classified with enough confidence
    Unknown,
}

impl std::fmt::Display for IntentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            IntentKind::Search => "search",
            IntentKind::Recommendation => "recommendation",
            IntentKind::Analysis => "analysis",
            IntentKind::Itinerary => "itinerary",
            IntentKind::Information => "information",
            IntentKind::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// A scalar or list parameter extracted from the request text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Text(String),
    Number(f64),
    List(Vec<String>),
}

impl ParamValue {
    /// The text value, if this is a text parameter
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParamValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Classification result for one request; immutable once produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    /// Classified intent kind
    pub kind: IntentKind,

    /// Confidence in [0, 1]
    pub confidence: f64,

    /// Capabilities a tool must offer to satisfy this intent
    pub required_capabilities: BTreeSet<Capability>,

    /// Best-effort extracted parameters
    pub parameters: BTreeMap<String, ParamValue>,
}

impl Intent {
    /// The `Unknown` intent with zero confidence and no parameters
    pub fn unknown() -> Self {
        Self {
            kind: IntentKind::Unknown,
            confidence: 0.0,
            required_capabilities: BTreeSet::new(),
            parameters: BTreeMap::new(),
        }
    }
}

/// Per-session context carried across requests
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionContext {
    /// Opaque session identifier from the upstream caller
    pub session_id: Option<String>,

    /// Intent classified for the previous request in this session
    pub prior_intent: Option<IntentKind>,
}

impl SessionContext {
    pub fn with_prior(prior: IntentKind) -> Self {
        Self {
            session_id: None,
            prior_intent: Some(prior),
        }
    }
}
