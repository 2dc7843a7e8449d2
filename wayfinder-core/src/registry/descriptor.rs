//! Tool descriptors and capability tags
//!
//! A descriptor is the registry's immutable record of a remote tool:
//! identity, the capability tags it claims to satisfy, the JSON contract
//! for its input/output, and the endpoint it is invoked at. Changing a
//! tool's capabilities requires registering a new version.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A named functional tag a tool claims to satisfy (e.g. `restaurant_search`)
///
/// Capability names are lowercase `snake_case` identifiers. Parsing rejects
/// anything else so that manifest typos fail at registration time rather
/// than silently never matching.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capability(String);

impl Capability {
    /// Parse a capability tag, validating its shape
    pub fn parse(tag: impl AsRef<str>) -> Result<Self, String> {
        let tag = tag.as_ref();
        if tag.is_empty() {
            return Err("capability tag must not be empty".to_string());
        }
        let valid = tag
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
        if !valid || tag.starts_with('_') || tag.ends_with('_') {
            return Err(format!(
                "capability tag '{}' must be lowercase snake_case",
                tag
            ));
        }
        Ok(Self(tag.to_string()))
    }

    /// Get the tag as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Build a capability set from string tags, panicking on malformed tags
///
/// Intended for statically known tags; manifest loading goes through
/// [`Capability::parse`] and reports errors instead.
pub fn capabilities(tags: &[&str]) -> BTreeSet<Capability> {
    tags.iter()
        .map(|t| Capability::parse(t).expect("invalid capability tag"))
        .collect()
}

/// Immutable descriptor of a registered tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Unique tool id
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Tool version; a capability change requires a new version
    pub version: String,

    /// Capability tags the tool claims to satisfy
    pub capabilities: BTreeSet<Capability>,

    /// JSON Schema for the invocation payload
    #[serde(default)]
    pub input_schema: serde_json::Value,

    /// JSON Schema for the response payload
    #[serde(default)]
    pub output_schema: serde_json::Value,

    /// Endpoint the tool is invoked at
    pub endpoint: String,
}

impl ToolDescriptor {
    /// Create a descriptor with the required identity fields
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: version.into(),
            capabilities: BTreeSet::new(),
            input_schema: serde_json::Value::Null,
            output_schema: serde_json::Value::Null,
            endpoint: String::new(),
        }
    }

    /// Add a capability tag
    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.insert(capability);
        self
    }

    /// Replace the capability set
    pub fn with_capabilities(mut self, capabilities: BTreeSet<Capability>) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Set the endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the input schema
    pub fn with_input_schema(mut self, schema: serde_json::Value) -> Self {
        self.input_schema = schema;
        self
    }

    /// Set the output schema
    pub fn with_output_schema(mut self, schema: serde_json::Value) -> Self {
        self.output_schema = schema;
        self
    }

    /// Check whether this tool satisfies every capability in `required`
    pub fn satisfies(&self, required: &BTreeSet<Capability>) -> bool {
        required.is_subset(&self.capabilities)
    }
}
