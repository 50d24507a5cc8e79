//! Test fixtures for vetter
//!
//! A small order schema with documents that pass and fail it, plus a
//! temp-dir writer for tests that read schemas and documents from disk.

use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// Test fixture categories
pub enum FixtureType {
    /// `schema.json`, `valid.json` and `invalid.json`
    Orders,
    /// The order schema and documents as YAML
    OrdersYaml,
    /// `registry.yaml` with a named schema and rules set
    Registry,
    /// `config.yaml` turning on unknown-field purging
    Config,
}

/// Writes fixtures into a temporary directory that lives as long as this value.
pub struct TestFixtures {
    temp_dir: Option<tempfile::TempDir>,
}

impl Default for TestFixtures {
    fn default() -> Self {
        Self::new()
    }
}

impl TestFixtures {
    pub fn new() -> Self {
        Self { temp_dir: None }
    }

    /// Write a fixture set and return the directory holding it.
    pub fn setup(&mut self, fixture_type: FixtureType) -> Result<PathBuf> {
        let dir = match self.temp_dir.take() {
            Some(dir) => dir,
            None => tempfile::tempdir().context("Failed to create fixture directory")?,
        };
        let path = dir.path().to_path_buf();
        self.temp_dir = Some(dir);

        match fixture_type {
            FixtureType::Orders => {
                write_json(&path.join("schema.json"), &order_schema())?;
                write_json(&path.join("valid.json"), &valid_order())?;
                write_json(&path.join("invalid.json"), &invalid_order())?;
            }
            FixtureType::OrdersYaml => {
                write_yaml(&path.join("schema.yaml"), &order_schema())?;
                write_yaml(&path.join("valid.yaml"), &valid_order())?;
                write_yaml(&path.join("invalid.yaml"), &invalid_order())?;
            }
            FixtureType::Registry => write_file(&path.join("registry.yaml"), REGISTRY_YAML)?,
            FixtureType::Config => write_file(&path.join("config.yaml"), "purge_unknown: true\n")?,
        }
        Ok(path)
    }

    /// Write an arbitrary file next to the fixtures.
    pub fn write(&mut self, name: &str, content: &str) -> Result<PathBuf> {
        if self.temp_dir.is_none() {
            let dir = tempfile::tempdir().context("Failed to create fixture directory")?;
            self.temp_dir = Some(dir);
        }
        let dir = self
            .temp_dir
            .as_ref()
            .context("Fixture directory missing")?;
        let path = dir.path().join(name);
        write_file(&path, content)?;
        Ok(path)
    }
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).with_context(|| format!("Failed to write fixture {:?}", path))
}

fn write_json(path: &Path, value: &Value) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    write_file(path, &content)
}

fn write_yaml(path: &Path, value: &Value) -> Result<()> {
    let content = serde_yaml::to_string(value)?;
    write_file(path, &content)
}

const REGISTRY_YAML: &str = r#"
schemas:
  address:
    street: {type: string, required: true}
    city: {type: string}
rules_sets:
  positive: {type: integer, min: 1}
"#;

/// An order: customer details, line items and a status with a default.
pub fn order_schema() -> Value {
    json!({
        "id": {"type": "integer", "required": true, "min": 1},
        "customer": {
            "type": "dict",
            "required": true,
            "schema": {
                "name": {"type": "string", "required": true, "minlength": 1},
                "email": {"type": "string", "regex": "[^@]+@[^@]+"}
            }
        },
        "status": {
            "type": "string",
            "allowed": ["open", "paid", "shipped"],
            "default": "open"
        },
        "items": {
            "type": "list",
            "minlength": 1,
            "schema": {
                "type": "dict",
                "schema": {
                    "sku": {"type": "string", "required": true},
                    "quantity": {"type": "integer", "min": 1}
                }
            }
        },
        "note": {"type": "string", "nullable": true},
        "tags": {"type": "list", "schema": {"type": "string"}}
    })
}

/// Passes [`order_schema`]; normalization adds `status: open`.
pub fn valid_order() -> Value {
    json!({
        "id": 7,
        "customer": {"name": "Ada", "email": "ada@example.com"},
        "items": [{"sku": "A-1", "quantity": 2}],
        "note": null
    })
}

/// Fails [`order_schema`] at the top level, in the nested customer and in
/// the first line item.
pub fn invalid_order() -> Value {
    json!({
        "id": 0,
        "customer": {"email": "nope"},
        "status": "lost",
        "items": [{"quantity": 0}],
        "coupon": "SPRING"
    })
}

/// The messages [`invalid_order`] renders to.
pub fn invalid_order_messages() -> Value {
    json!({
        "coupon": ["unknown field"],
        "customer": [{
            "email": ["value does not match regex '[^@]+@[^@]+'"],
            "name": ["required field"]
        }],
        "id": ["min value is 1"],
        "items": [{"0": [{
            "quantity": ["min value is 1"],
            "sku": ["required field"]
        }]}],
        "status": ["unallowed value lost"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn fixtures_are_valid() {
        assert!(order_schema()["customer"]["schema"].is_object());
        assert!(valid_order().is_object());
        assert_eq!(invalid_order()["status"], "lost");
    }

    #[test]
    fn setup_writes_files() {
        let mut fixtures = TestFixtures::new();
        let dir = fixtures.setup(FixtureType::Orders).unwrap();
        let schema: Value =
            serde_json::from_str(&fs::read_to_string(dir.join("schema.json")).unwrap()).unwrap();
        assert_eq!(schema, order_schema());

        let same_dir = fixtures.setup(FixtureType::Registry).unwrap();
        assert_eq!(dir, same_dir);
        assert!(dir.join("registry.yaml").exists());
    }

    #[test]
    fn yaml_fixtures_round_trip() {
        let mut fixtures = TestFixtures::new();
        let dir = fixtures.setup(FixtureType::OrdersYaml).unwrap();
        let document: Value =
            serde_yaml::from_str(&fs::read_to_string(dir.join("invalid.yaml")).unwrap()).unwrap();
        assert_eq!(document, invalid_order());
    }
}
