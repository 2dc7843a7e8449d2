//! Tool Registry for registration, deregistration, and capability lookup
//!
//! The registry holds capability-tagged descriptors of the remote tools
//! the engine may route to. Reads are always consistent with the latest
//! completed `register`/`deregister` call; deregistered tools stop being
//! selectable immediately while in-flight invocations on them may finish.
//!
//! # Example
//!
//! ```rust,ignore
//! use wayfinder_core::registry::{ToolRegistry, ToolDescriptor, capabilities};
//!
//! let registry = ToolRegistry::new();
//! registry.register(
//!     ToolDescriptor::new("places", "Places API", "1.0.0")
//!         .with_capabilities(capabilities(&["restaurant_search"]))
//!         .with_endpoint("https://places.internal/invoke"),
//! )?;
//!
//! let candidates = registry.find_by_capabilities(&capabilities(&["restaurant_search"]));
//! ```

mod descriptor;
mod manifest;

pub use descriptor::{capabilities, Capability, ToolDescriptor};
pub use manifest::DiscoveryManifest;

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

/// Error type for registry operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistrationError {
    /// Tool id already registered at this version
    #[error("Tool '{id}' is already registered at version {version}")]
    Duplicate { id: String, version: String },

    /// Tool id registered at a different version without deregistration
    #[error("Tool '{id}' version conflict: registered {existing}, offered {offered}")]
    VersionConflict {
        id: String,
        existing: String,
        offered: String,
    },

    /// Descriptor failed validation
    #[error("Invalid descriptor for '{id}': {reason}")]
    InvalidDescriptor { id: String, reason: String },
}

/// Registry of capability-tagged tool descriptors
///
/// Shared across all concurrent workflow executions; mutations are
/// serialized behind a single write lock, reads take snapshots.
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<ToolDescriptor>>>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
        }
    }

    /// Register a tool descriptor
    ///
    /// Validates that the descriptor declares at least one capability and
    /// a non-empty endpoint, and that the id is not already taken. The
    /// same id may only be re-registered with an explicit version bump
    /// after deregistration.
    pub fn register(&self, descriptor: ToolDescriptor) -> Result<(), RegistrationError> {
        Self::validate(&descriptor)?;

        let mut tools = self.tools.write().unwrap();
        if let Some(existing) = tools.get(&descriptor.id) {
            if existing.version != descriptor.version {
                return Err(RegistrationError::VersionConflict {
                    id: descriptor.id.clone(),
                    existing: existing.version.clone(),
                    offered: descriptor.version.clone(),
                });
            }
            return Err(RegistrationError::Duplicate {
                id: descriptor.id.clone(),
                version: descriptor.version.clone(),
            });
        }

        tracing::debug!(tool = %descriptor.id, version = %descriptor.version, "registered tool");
        tools.insert(descriptor.id.clone(), Arc::new(descriptor));
        Ok(())
    }

    /// Remove a tool; it stops being selectable immediately
    ///
    /// Returns the removed descriptor, or `None` if the id was unknown.
    /// In-flight invocations against the tool are allowed to finish.
    pub fn deregister(&self, tool_id: &str) -> Option<Arc<ToolDescriptor>> {
        let removed = self.tools.write().unwrap().remove(tool_id);
        if removed.is_some() {
            tracing::debug!(tool = %tool_id, "deregistered tool");
        }
        removed
    }

    /// Get a descriptor by id
    pub fn get(&self, tool_id: &str) -> Option<Arc<ToolDescriptor>> {
        self.tools.read().unwrap().get(tool_id).cloned()
    }

    /// Check if a tool is registered
    pub fn contains(&self, tool_id: &str) -> bool {
        self.tools.read().unwrap().contains_key(tool_id)
    }

    /// Find every tool whose capability set is a superset of `required`
    ///
    /// An empty result is valid, not an error. Results are ordered by
    /// tool id so repeated queries are deterministic.
    pub fn find_by_capabilities(
        &self,
        required: &BTreeSet<Capability>,
    ) -> Vec<Arc<ToolDescriptor>> {
        let tools = self.tools.read().unwrap();
        let mut matches: Vec<Arc<ToolDescriptor>> = tools
            .values()
            .filter(|tool| tool.satisfies(required))
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.id.cmp(&b.id));
        matches
    }

    /// Snapshot of all registered descriptors, ordered by id
    pub fn all(&self) -> Vec<Arc<ToolDescriptor>> {
        let tools = self.tools.read().unwrap();
        let mut all: Vec<Arc<ToolDescriptor>> = tools.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    /// All registered tool ids, ordered
    pub fn ids(&self) -> Vec<String> {
        self.all().iter().map(|t| t.id.clone()).collect()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.read().unwrap().len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn validate(descriptor: &ToolDescriptor) -> Result<(), RegistrationError> {
        if descriptor.id.is_empty() {
            return Err(RegistrationError::InvalidDescriptor {
                id: "<empty>".to_string(),
                reason: "tool id must not be empty".to_string(),
            });
        }
        if descriptor.capabilities.is_empty() {
            return Err(RegistrationError::InvalidDescriptor {
                id: descriptor.id.clone(),
                reason: "capability set must not be empty".to_string(),
            });
        }
        if descriptor.endpoint.is_empty() {
            return Err(RegistrationError::InvalidDescriptor {
                id: descriptor.id.clone(),
                reason: "endpoint must not be empty".to_string(),
            });
        }
        if descriptor.version.is_empty() {
            return Err(RegistrationError::InvalidDescriptor {
                id: descriptor.id.clone(),
                reason: "version must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tool_count", &self.len())
            .field("tools", &self.ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_tool(id: &str, caps: &[&str]) -> ToolDescriptor {
        ToolDescriptor::new(id, id, "1.0.0")
            .with_capabilities(capabilities(caps))
            .with_endpoint(format!("https://{}.internal/invoke", id))
    }

    #[test]
    fn test_register_and_get() {
        let registry = ToolRegistry::new();
        registry
            .register(make_tool("places", &["restaurant_search"]))
            .unwrap();

        assert!(registry.contains("places"));
        assert_eq!(registry.get("places").unwrap().id, "places");
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn test_register_duplicate() {
        let registry = ToolRegistry::new();
        registry
            .register(make_tool("places", &["restaurant_search"]))
            .unwrap();

        let result = registry.register(make_tool("places", &["restaurant_search"]));
        assert!(matches!(result, Err(RegistrationError::Duplicate { .. })));
    }

    #[test]
    fn test_register_version_conflict() {
        let registry = ToolRegistry::new();
        registry
            .register(make_tool("places", &["restaurant_search"]))
            .unwrap();

        let mut bumped = make_tool("places", &["restaurant_search", "poi_search"]);
        bumped.version = "2.0.0".to_string();
        let result = registry.register(bumped);
        assert!(matches!(
            result,
            Err(RegistrationError::VersionConflict { .. })
        ));
    }

    #[test]
    fn test_register_rejects_empty_capabilities() {
        let registry = ToolRegistry::new();
        let tool = ToolDescriptor::new("empty", "Empty", "1.0.0")
            .with_endpoint("https://empty.internal/invoke");

        let result = registry.register(tool);
        assert!(matches!(
            result,
            Err(RegistrationError::InvalidDescriptor { .. })
        ));
    }

    #[test]
    fn test_register_rejects_missing_endpoint() {
        let registry = ToolRegistry::new();
        let tool = ToolDescriptor::new("noend", "NoEnd", "1.0.0")
            .with_capabilities(capabilities(&["restaurant_search"]));

        assert!(registry.register(tool).is_err());
    }

    #[test]
    fn test_find_by_capabilities_superset_match() {
        let registry = ToolRegistry::new();
        registry
            .register(make_tool("places", &["restaurant_search", "poi_search"]))
            .unwrap();
        registry
            .register(make_tool("weather", &["weather_forecast"]))
            .unwrap();

        let found = registry.find_by_capabilities(&capabilities(&["restaurant_search"]));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "places");

        let found = registry.find_by_capabilities(&capabilities(&["weather_forecast"]));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "weather");
    }

    #[test]
    fn test_find_by_capabilities_empty_result_is_valid() {
        let registry = ToolRegistry::new();
        registry
            .register(make_tool("places", &["restaurant_search"]))
            .unwrap();

        let found = registry.find_by_capabilities(&capabilities(&["flight_search"]));
        assert!(found.is_empty());
    }

    #[test]
    fn test_round_trip_register_find_deregister() {
        let registry = ToolRegistry::new();
        let tool = make_tool("places", &["restaurant_search", "poi_search"]);
        let exact_caps = tool.capabilities.clone();
        registry.register(tool).unwrap();

        let found = registry.find_by_capabilities(&exact_caps);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "places");

        registry.deregister("places").unwrap();
        assert!(registry.find_by_capabilities(&exact_caps).is_empty());
        assert!(registry
            .find_by_capabilities(&capabilities(&["restaurant_search"]))
            .is_empty());
    }

    #[test]
    fn test_find_ordering_is_deterministic() {
        let registry = ToolRegistry::new();
        registry
            .register(make_tool("places_b", &["restaurant_search"]))
            .unwrap();
        registry
            .register(make_tool("places_a", &["restaurant_search"]))
            .unwrap();

        let found = registry.find_by_capabilities(&capabilities(&["restaurant_search"]));
        let ids: Vec<&str> = found.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["places_a", "places_b"]);
    }
}
