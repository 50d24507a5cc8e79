//! Registry definitions stored on disk.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::store::{RulesSetRegistry, SchemaRegistry};

/// A YAML or JSON file with named schemas and rule sets.
///
/// ```yaml
/// schemas:
///   user:
///     name: {type: string}
/// rules_sets:
///   positive: {type: integer, min: 1}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryFile {
    pub schemas: IndexMap<String, Value>,
    pub rules_sets: IndexMap<String, Value>,
}

impl RegistryFile {
    /// Parse a registry file. JSON is accepted since it is valid YAML.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse registry definitions")
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read registry file {:?}", path))?;
        Self::from_yaml_str(&content).with_context(|| format!("Invalid registry file {:?}", path))
    }

    /// Add every definition to the given registries.
    pub fn install(&self, schemas: &SchemaRegistry, rules_sets: &RulesSetRegistry) -> Result<()> {
        info!(
            "Installing {} schemas and {} rules sets",
            self.schemas.len(),
            self.rules_sets.len()
        );
        schemas
            .extend(self.schemas.clone())
            .context("Invalid schema definition")?;
        rules_sets
            .extend(self.rules_sets.clone())
            .context("Invalid rules set definition")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_yaml() {
        let file = RegistryFile::from_yaml_str(
            "schemas:\n  user:\n    name: {type: string}\nrules_sets:\n  positive: {type: integer, min: 1}\n",
        )
        .unwrap();

        assert_eq!(file.schemas["user"], json!({"name": {"type": "string"}}));
        assert_eq!(file.rules_sets["positive"], json!({"type": "integer", "min": 1}));
    }

    #[test]
    fn test_sections_are_optional() {
        let file = RegistryFile::from_yaml_str("rules_sets: {}\n").unwrap();
        assert!(file.schemas.is_empty());
    }

    #[test]
    fn test_install_rejects_non_mappings() {
        let file = RegistryFile::from_yaml_str("schemas:\n  broken: [1, 2]\n").unwrap();
        let result = file.install(&SchemaRegistry::new(), &RulesSetRegistry::new());
        assert!(result.is_err());
    }
}
