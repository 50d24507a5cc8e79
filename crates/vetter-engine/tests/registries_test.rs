//! Named schemas and rule sets shared between validators

use pretty_assertions::assert_eq;
use serde_json::json;
use vetter_engine::{
    ErrorCode, PathSegment, RegistryFile, RulesSetRegistry, SchemaError, SchemaRegistry,
    Validator, VetterError,
};
use vetter_test_fixtures::{FixtureType, TestFixtures};

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn address() -> serde_json::Value {
    json!({
        "street": {"type": "string", "required": true},
        "city": {"type": "string"}
    })
}

#[test]
fn test_schema_reference_in_a_field() -> TestResult {
    let schemas = SchemaRegistry::new();
    schemas.add("address", address())?;

    let validator = Validator::builder()
        .schema(json!({"home": {"type": "dict", "schema": "address"}}))
        .schema_registry(schemas)
        .build()?;

    assert!(validator
        .validate(&json!({"home": {"street": "Main St", "city": "Springfield"}}))?
        .is_valid());

    let validation = validator.validate(&json!({"home": {"city": "Springfield"}}))?;
    assert!(validation.errors().contains(ErrorCode::RequiredField));
    assert_eq!(
        validation.messages(),
        json!({"home": [{"street": ["required field"]}]})
    );
    Ok(())
}

#[test]
fn test_schema_reference_as_the_whole_schema() -> TestResult {
    let schemas = SchemaRegistry::new();
    schemas.add("address", address())?;

    let validator = Validator::builder()
        .schema(json!("address"))
        .schema_registry(schemas)
        .build()?;

    assert!(validator.validate(&json!({"street": "Main St"}))?.is_valid());
    assert!(!validator.validate(&json!({"city": "Springfield"}))?.is_valid());
    Ok(())
}

#[test]
fn test_definitions_added_later_are_visible() -> TestResult {
    let schemas = SchemaRegistry::new();
    let validator = Validator::builder()
        .schema(json!({"name": {"type": "string"}}))
        .schema_registry(schemas.clone())
        .build()?;

    assert_eq!(
        validator.validate_with(&json!({}), &json!("address")).map(|_| ()),
        Err(VetterError::Schema(SchemaError::UnknownSchema(
            "address".to_string()
        )))
    );

    schemas.add("address", address())?;
    assert!(validator.schema_registry().ptr_eq(&schemas));
    let validation = validator.validate_with(&json!({"street": "Main St"}), &json!("address"))?;
    assert!(validation.is_valid());
    Ok(())
}

#[test]
fn test_redefined_rules_set_takes_effect() -> TestResult {
    let rules_sets = RulesSetRegistry::new();
    rules_sets.add("positive", json!({"type": "integer", "min": 1}))?;

    let validator = Validator::builder()
        .schema(json!({"count": "positive"}))
        .rules_set_registry(rules_sets.clone())
        .build()?;
    let validation = validator.validate(&json!({"count": 0}))?;
    assert_eq!(validation.messages(), json!({"count": ["min value is 1"]}));

    rules_sets.add("positive", json!({"type": "integer", "min": 0}))?;
    assert!(validator.validate(&json!({"count": 0}))?.is_valid());
    Ok(())
}

#[test]
fn test_schema_check_cache() -> TestResult {
    let schemas = SchemaRegistry::new();
    let mut validator = Validator::builder()
        .schema(json!({"name": {"type": "string"}}))
        .schema_registry(schemas.clone())
        .build()?;
    assert_eq!(validator.cached_schema_count(), 1);

    validator.validate(&json!({"name": "ada"}))?;
    assert_eq!(validator.cached_schema_count(), 1);

    // A registry change invalidates earlier checks.
    schemas.add("unrelated", json!({"x": {"type": "integer"}}))?;
    validator.validate(&json!({"name": "ada"}))?;
    assert_eq!(validator.cached_schema_count(), 2);

    validator.clear_caches();
    assert_eq!(validator.cached_schema_count(), 0);

    validator.set_schema(json!({"age": {"type": "integer"}}))?;
    assert_eq!(validator.cached_schema_count(), 1);
    assert!(validator.validate(&json!({"age": 3}))?.is_valid());
    Ok(())
}

#[test]
fn test_set_schema_rejects_bad_schemas() -> TestResult {
    let mut validator = Validator::new(json!({"name": {"type": "string"}}))?;

    let result = validator.set_schema(json!({"name": {"type": "text"}}));
    assert!(matches!(
        result,
        Err(VetterError::Schema(SchemaError::UnknownType { .. }))
    ));
    // The previous schema stays in place.
    assert!(validator.validate(&json!({"name": "ada"}))?.is_valid());
    Ok(())
}

#[test]
fn test_recursive_schema() -> TestResult {
    let schemas = SchemaRegistry::new();
    schemas.add(
        "tree",
        json!({
            "value": {"type": "integer"},
            "children": {"type": "list", "schema": {"type": "dict", "schema": "tree"}}
        }),
    )?;

    let validator = Validator::builder()
        .schema(json!("tree"))
        .schema_registry(schemas)
        .build()?;

    let good = json!({"value": 1, "children": [{"value": 2, "children": [{"value": 3}]}]});
    assert!(validator.validate(&good)?.is_valid());

    let bad = json!({"value": 1, "children": [{"value": 2, "children": [{"value": "three"}]}]});
    let validation = validator.validate(&bad)?;
    let deep = validation
        .document_error_tree()
        .fetch_errors_from(&[
            PathSegment::from("children"),
            PathSegment::Index(0),
            PathSegment::from("children"),
            PathSegment::Index(0),
            PathSegment::from("value"),
        ])
        .into_iter()
        .map(|error| error.code)
        .collect::<Vec<_>>();
    assert_eq!(deep, vec![ErrorCode::BadType]);
    Ok(())
}

#[test]
fn test_registry_file() -> TestResult {
    let mut fixtures = TestFixtures::new();
    let dir = fixtures.setup(FixtureType::Registry)?;

    let file = RegistryFile::load_from_path(&dir.join("registry.yaml"))?;
    let schemas = SchemaRegistry::new();
    let rules_sets = RulesSetRegistry::new();
    file.install(&schemas, &rules_sets)?;
    assert_eq!(schemas.names(), vec!["address".to_string()]);
    assert!(rules_sets.contains("positive"));

    let validator = Validator::builder()
        .schema(json!({
            "home": {"type": "dict", "schema": "address"},
            "count": "positive"
        }))
        .schema_registry(schemas)
        .rules_set_registry(rules_sets)
        .build()?;

    let validation = validator.validate(&json!({"home": {}, "count": 0}))?;
    assert_eq!(
        validation.messages(),
        json!({
            "count": ["min value is 1"],
            "home": [{"street": ["required field"]}]
        })
    );
    Ok(())
}

#[test]
fn test_global_registry_is_shared() -> TestResult {
    let name = "registries_test_global_point";
    SchemaRegistry::global().add(
        name,
        json!({"x": {"type": "integer", "required": true}}),
    )?;

    let validator = Validator::builder()
        .schema(json!(name))
        .schema_registry(SchemaRegistry::global().clone())
        .build()?;
    assert!(validator.validate(&json!({"x": 1}))?.is_valid());

    SchemaRegistry::global().remove(name);
    Ok(())
}
