//! Discovery manifest loading
//!
//! A manifest is a declarative YAML or JSON document listing tool ids,
//! capabilities, schemas, and endpoints, used to populate the registry
//! at startup.

use super::descriptor::{Capability, ToolDescriptor};
use super::{RegistrationError, ToolRegistry};
use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// Declarative listing of tools to register at startup
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoveryManifest {
    /// Tools to register
    pub tools: Vec<ManifestEntry>,
}

/// One tool entry in a discovery manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub id: String,
    pub name: String,
    pub version: String,
    pub capabilities: Vec<String>,
    pub endpoint: String,
    #[serde(default)]
    pub input_schema: serde_json::Value,
    #[serde(default)]
    pub output_schema: serde_json::Value,
}

impl DiscoveryManifest {
    /// Parse a manifest from YAML text
    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text)
            .map_err(|e| EngineError::Configuration(format!("invalid manifest: {}", e)))
    }

    /// Parse a manifest from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| EngineError::Configuration(format!("invalid manifest: {}", e)))
    }

    /// Load a manifest from a `.yaml`/`.yml` or `.json` file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&text),
            Some("json") => Self::from_json(&text),
            other => Err(EngineError::Configuration(format!(
                "unsupported manifest extension: {:?}",
                other
            ))),
        }
    }

    /// Register every entry into the registry, returning how many were added
    ///
    /// Fails on the first malformed entry or registration conflict; entries
    /// registered before the failure stay registered.
    pub fn register_into(&self, registry: &ToolRegistry) -> Result<usize> {
        let mut registered = 0;
        for entry in &self.tools {
            let descriptor = entry.to_descriptor()?;
            registry
                .register(descriptor)
                .map_err(|e: RegistrationError| EngineError::Registration(e.to_string()))?;
            registered += 1;
        }
        tracing::info!(count = registered, "registered tools from manifest");
        Ok(registered)
    }
}

impl ManifestEntry {
    fn to_descriptor(&self) -> Result<ToolDescriptor> {
        let mut caps = BTreeSet::new();
        for tag in &self.capabilities {
            let cap = Capability::parse(tag).map_err(EngineError::Registration)?;
            caps.insert(cap);
        }
        Ok(ToolDescriptor::new(&self.id, &self.name, &self.version)
            .with_capabilities(caps)
            .with_endpoint(&self.endpoint)
            .with_input_schema(self.input_schema.clone())
            .with_output_schema(self.output_schema.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::capabilities;

    const MANIFEST_YAML: &str = r#"
tools:
  - id: places
    name: Places API
    version: 1.0.0
    capabilities: [restaurant_search, poi_search]
    endpoint: https://places.internal/invoke
  - id: weather
    name: Weather API
    version: 0.4.2
    capabilities: [weather_forecast]
    endpoint: https://weather.internal/invoke
"#;

    #[test]
    fn test_manifest_from_yaml() {
        let manifest = DiscoveryManifest::from_yaml(MANIFEST_YAML).unwrap();
        assert_eq!(manifest.tools.len(), 2);
        assert_eq!(manifest.tools[0].id, "places");
        assert_eq!(manifest.tools[1].capabilities, vec!["weather_forecast"]);
    }

    #[test]
    fn test_manifest_from_json() {
        let manifest = DiscoveryManifest::from_json(
            r#"{"tools": [{"id": "rank", "name": "Ranker", "version": "1.0.0",
                "capabilities": ["result_ranking"], "endpoint": "https://rank.internal"}]}"#,
        )
        .unwrap();
        assert_eq!(manifest.tools.len(), 1);
    }

    #[test]
    fn test_register_into() {
        let manifest = DiscoveryManifest::from_yaml(MANIFEST_YAML).unwrap();
        let registry = ToolRegistry::new();

        let count = manifest.register_into(&registry).unwrap();
        assert_eq!(count, 2);
        assert!(registry.contains("places"));
        assert!(registry.contains("weather"));

        let found = registry.find_by_capabilities(&capabilities(&["poi_search"]));
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_register_into_rejects_bad_capability() {
        let manifest = DiscoveryManifest::from_yaml(
            r#"
tools:
  - id: bad
    name: Bad
    version: 1.0.0
    capabilities: ["Not A Tag"]
    endpoint: https://bad.internal
"#,
        )
        .unwrap();

        let registry = ToolRegistry::new();
        assert!(manifest.register_into(&registry).is_err());
        assert!(registry.is_empty());
    }
}
