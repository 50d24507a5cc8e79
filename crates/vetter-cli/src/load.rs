//! Reading schemas, documents and settings from disk

use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::debug;
use vetter_engine::{RegistryFile, RulesSetRegistry, SchemaRegistry, Validator, ValidatorConfig};

use crate::cli::SchemaArgs;

/// Parse a YAML or JSON file. JSON goes through the YAML parser too.
pub fn load_value(path: &Path) -> Result<Value> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    serde_yaml::from_str(&content).with_context(|| format!("Failed to parse {:?}", path))
}

/// Build a validator from the schema, settings and registry files.
pub fn build_validator(args: &SchemaArgs, normalize: Option<bool>) -> Result<Validator> {
    let schema = load_value(&args.schema)?;

    let mut config = match &args.config {
        Some(path) => ValidatorConfig::from_path(path)
            .with_context(|| format!("Failed to load settings from {:?}", path))?,
        None => ValidatorConfig::default(),
    };
    if let Some(normalize) = normalize {
        config.normalize = normalize;
    }

    let schemas = SchemaRegistry::new();
    let rules_sets = RulesSetRegistry::new();
    if let Some(path) = &args.registry {
        RegistryFile::load_from_path(path)?.install(&schemas, &rules_sets)?;
        debug!("Loaded registry {:?}", path);
    }

    Validator::builder()
        .schema(schema)
        .config(config)
        .schema_registry(schemas)
        .rules_set_registry(rules_sets)
        .build()
        .with_context(|| format!("Invalid schema {:?}", args.schema))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    #[test]
    fn test_load_yaml_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = dir.path().join("doc.yaml");
        let json_file = dir.path().join("doc.json");
        fs::write(&yaml, "name: ada\ntags: [a, b]\n").unwrap();
        fs::write(&json_file, r#"{"name": "ada", "tags": ["a", "b"]}"#).unwrap();

        let expected = json!({"name": "ada", "tags": ["a", "b"]});
        assert_eq!(load_value(&yaml).unwrap(), expected);
        assert_eq!(load_value(&json_file).unwrap(), expected);
    }

    #[test]
    fn test_missing_file() {
        let err = load_value(&PathBuf::from("/nonexistent/doc.yaml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }

    #[test]
    fn test_bad_schema_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let schema = dir.path().join("schema.yaml");
        fs::write(&schema, "name: {type: text}\n").unwrap();

        let args = SchemaArgs {
            schema: schema.clone(),
            config: None,
            registry: None,
        };
        let err = build_validator(&args, None).unwrap_err();
        assert!(err.to_string().starts_with("Invalid schema"));
    }
}
