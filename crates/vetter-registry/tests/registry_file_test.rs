use pretty_assertions::assert_eq;
use serde_json::json;
use std::fs;
use tempfile::TempDir;
use vetter_registry::{RegistryFile, Resolver, RulesSetRegistry, SchemaRegistry};

#[test]
fn test_load_and_install_from_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("registry.yaml");
    fs::write(
        &path,
        r#"
schemas:
  address:
    street: {type: string, required: true}
    city: {type: string}
rules_sets:
  non_empty_string:
    type: string
    empty: false
"#,
    )
    .unwrap();

    let file = RegistryFile::load_from_path(&path).unwrap();
    let schemas = SchemaRegistry::new();
    let rules_sets = RulesSetRegistry::new();
    file.install(&schemas, &rules_sets).unwrap();

    let resolver = Resolver::new(schemas, rules_sets);
    let address = resolver.resolve_schema(&json!("address")).unwrap();
    assert_eq!(
        serde_json::Value::Object(address),
        json!({
            "street": {"type": "string", "required": true},
            "city": {"type": "string"}
        })
    );

    let rules = resolver.resolve_rule_set(&json!("non_empty_string")).unwrap();
    assert_eq!(rules.flag("empty"), Some(false));
}

#[test]
fn test_json_registry_files_are_accepted() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("registry.json");
    fs::write(&path, r#"{"rules_sets": {"flag": {"type": "boolean"}}}"#).unwrap();

    let file = RegistryFile::load_from_path(&path).unwrap();
    assert_eq!(file.rules_sets.len(), 1);
    assert!(file.schemas.is_empty());
}

#[test]
fn test_missing_file_reports_path() {
    let dir = TempDir::new().unwrap();
    let err = RegistryFile::load_from_path(&dir.path().join("absent.yaml")).unwrap_err();
    assert!(format!("{:#}", err).contains("absent.yaml"));
}
