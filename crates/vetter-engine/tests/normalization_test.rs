//! Normalization: renaming, coercion, defaults and purging

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use vetter_engine::{
    ErrorCode, HandlerError, Map, RuleHandler, Validator, ValidatorBuilder, ValidatorConfig,
};
use vetter_test_fixtures::{order_schema, valid_order, FixtureType, TestFixtures};

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn with_transforms(builder: ValidatorBuilder) -> ValidatorBuilder {
    builder
        .rule(
            "trim",
            RuleHandler::transform(|value| match value {
                Value::String(text) => Ok(Value::String(text.trim().to_string())),
                _ => Err("not a string".into()),
            }),
        )
        .rule(
            "to_int",
            RuleHandler::transform(|value| match value {
                Value::String(text) => Ok(Value::from(text.parse::<i64>()?)),
                Value::Number(_) => Ok(value.clone()),
                _ => Err("not a number".into()),
            }),
        )
        .rule(
            "double",
            RuleHandler::transform(|value| {
                let n = value.as_i64().ok_or("not an integer")?;
                Ok(Value::from(n * 2))
            }),
        )
        .rule(
            "lower",
            RuleHandler::transform(|value| match value {
                Value::String(text) => Ok(Value::String(text.to_lowercase())),
                _ => Err("not a string".into()),
            }),
        )
}

fn int(document: &Map, field: &str) -> Result<i64, HandlerError> {
    document
        .get(field)
        .and_then(Value::as_i64)
        .ok_or_else(|| format!("'{}' is not set", field).into())
}

#[test]
fn test_default_fills_missing_field() -> TestResult {
    let validator = Validator::new(order_schema())?;
    let normalization = validator.normalized(&valid_order())?;

    assert!(normalization.is_clean());
    assert_eq!(normalization.document["status"], json!("open"));
    assert_eq!(normalization.document["note"], Value::Null);
    Ok(())
}

#[test]
fn test_default_replaces_null_unless_nullable() -> TestResult {
    let validator = Validator::new(json!({
        "status": {"type": "string", "default": "open"},
        "note": {"type": "string", "nullable": true, "default": "none"}
    }))?;

    let normalization = validator.normalized(&json!({"status": null, "note": null}))?;
    assert_eq!(normalization.document, json!({"status": "open", "note": null}));

    let normalization = validator.normalized(&json!({"status": "paid"}))?;
    assert_eq!(normalization.document, json!({"status": "paid", "note": "none"}));
    Ok(())
}

#[test]
fn test_coercion_chain() -> TestResult {
    let validator = with_transforms(Validator::builder())
        .schema(json!({"n": {"type": "integer", "coerce": ["trim", "to_int", "double"]}}))
        .build()?;

    let validation = validator.validate(&json!({"n": " 21 "}))?;
    assert!(validation.is_valid(), "{}", validation.errors());
    assert_eq!(validation.document(), &json!({"n": 42}));
    Ok(())
}

#[test]
fn test_failed_coercion_keeps_the_value() -> TestResult {
    let validator = with_transforms(Validator::builder())
        .schema(json!({"n": {"type": "integer", "coerce": ["trim", "to_int"]}}))
        .build()?;

    let normalization = validator.normalized(&json!({"n": " x "}))?;
    assert_eq!(normalization.document, json!({"n": " x "}));
    assert_eq!(normalization.errors.len(), 1);
    let error = &normalization.errors[0];
    assert_eq!(error.code, ErrorCode::CoercionFailed);
    assert_eq!(error.info[0], json!("to_int"));
    assert!(error.is_normalization_error());

    let validation = validator.validate(&json!({"n": " x "}))?;
    assert_eq!(
        validation.messages(),
        json!({"n": [
            "field 'n' cannot be coerced: invalid digit found in string",
            "must be of integer type"
        ]})
    );
    Ok(())
}

#[test]
fn test_coercion_leaves_null_alone() -> TestResult {
    let validator = with_transforms(Validator::builder())
        .schema(json!({"n": {"type": "integer", "nullable": true, "coerce": "to_int"}}))
        .build()?;

    let validation = validator.validate(&json!({"n": null}))?;
    assert!(validation.is_valid());
    assert_eq!(validation.document(), &json!({"n": null}));
    Ok(())
}

#[test]
fn test_coercion_in_containers() -> TestResult {
    let validator = with_transforms(Validator::builder())
        .schema(json!({
            "numbers": {"type": "list", "schema": {"type": "integer", "coerce": "to_int"}},
            "headers": {"type": "dict", "keysrules": {"type": "string", "coerce": "lower"}},
            "limits": {"type": "dict", "valuesrules": {"coerce": "to_int"}}
        }))
        .build()?;

    let validation = validator.validate(&json!({
        "numbers": ["1", "2", 3],
        "headers": {"Content-Type": "json"},
        "limits": {"cpu": "2"}
    }))?;
    assert!(validation.is_valid(), "{}", validation.errors());
    assert_eq!(
        validation.document(),
        &json!({
            "numbers": [1, 2, 3],
            "headers": {"content-type": "json"},
            "limits": {"cpu": 2}
        })
    );
    Ok(())
}

#[test]
fn test_rename() -> TestResult {
    let validator = Validator::new(json!({
        "old": {"rename": "new"},
        "new": {"type": "integer"}
    }))?;

    let validation = validator.validate(&json!({"old": 1}))?;
    assert!(validation.is_valid());
    assert_eq!(validation.document(), &json!({"new": 1}));
    Ok(())
}

#[test]
fn test_renamed_field_outside_the_schema_is_unknown() -> TestResult {
    let validator = Validator::new(json!({"old": {"rename": "new"}}))?;

    let validation = validator.validate(&json!({"old": 1}))?;
    assert_eq!(validation.errors().len(), 1);
    assert_eq!(validation.errors()[0].code, ErrorCode::UnknownField);
    assert_eq!(validation.messages(), json!({"new": ["unknown field"]}));
    Ok(())
}

#[test]
fn test_rename_handler_for_unknown_fields() -> TestResult {
    let validator = with_transforms(Validator::builder())
        .schema(json!({"name": {"type": "string"}}))
        .allow_unknown(vetter_engine::AllowUnknown::Rules(json!({"rename_handler": "lower"})))
        .build()?;

    let validation = validator.validate(&json!({"NAME": "ada", "Extra": 1}))?;
    assert!(validation.is_valid());
    assert_eq!(validation.document(), &json!({"name": "ada", "extra": 1}));
    Ok(())
}

#[test]
fn test_default_setters_run_in_dependency_order() -> TestResult {
    let validator = Validator::builder()
        .schema(json!({
            "a": {"type": "integer", "default_setter": "from_b_and_c"},
            "b": {"type": "integer", "default_setter": "from_c"},
            "c": {"type": "integer", "default_setter": "one"}
        }))
        .rule("one", RuleHandler::default_setter(Vec::<String>::new(), |_| Ok(json!(1))))
        .rule(
            "from_c",
            RuleHandler::default_setter(["c"], |document| Ok(json!(int(document, "c")? * 2))),
        )
        .rule(
            "from_b_and_c",
            RuleHandler::default_setter(["b", "c"], |document| {
                Ok(json!(int(document, "b")? + int(document, "c")?))
            }),
        )
        .build()?;

    let validation = validator.validate(&json!({}))?;
    assert!(validation.is_valid(), "{}", validation.errors());
    assert_eq!(validation.document(), &json!({"a": 3, "b": 2, "c": 1}));

    // Present values are read as they are.
    let validation = validator.validate(&json!({"c": 5}))?;
    assert_eq!(validation.document(), &json!({"a": 15, "b": 10, "c": 5}));
    Ok(())
}

#[test]
fn test_default_setter_chain_from_a_present_field() -> TestResult {
    let validator = Validator::builder()
        .schema(json!({
            "a": {"type": "integer"},
            "b": {"type": "integer", "default_setter": "a_plus_one"},
            "c": {"type": "integer", "default_setter": "b_doubled"},
            "d": {"type": "integer", "default_setter": "b_plus_c"}
        }))
        .rule(
            "a_plus_one",
            RuleHandler::default_setter(["a"], |document| Ok(json!(int(document, "a")? + 1))),
        )
        .rule(
            "b_doubled",
            RuleHandler::default_setter(["b"], |document| Ok(json!(int(document, "b")? * 2))),
        )
        .rule(
            "b_plus_c",
            RuleHandler::default_setter(["b", "c"], |document| {
                Ok(json!(int(document, "b")? + int(document, "c")?))
            }),
        )
        .build()?;

    let normalization = validator.normalized(&json!({"a": 1}))?;
    assert!(normalization.is_clean());
    assert_eq!(normalization.document, json!({"a": 1, "b": 2, "c": 4, "d": 6}));
    Ok(())
}

#[test]
fn test_circular_default_setters() -> TestResult {
    let validator = Validator::builder()
        .schema(json!({
            "a": {"default_setter": "from_b"},
            "b": {"default_setter": "from_a"},
            "c": {"default": 0}
        }))
        .rule(
            "from_a",
            RuleHandler::default_setter(["a"], |document| Ok(json!(int(document, "a")?))),
        )
        .rule(
            "from_b",
            RuleHandler::default_setter(["b"], |document| Ok(json!(int(document, "b")?))),
        )
        .build()?;

    let normalization = validator.normalized(&json!({}))?;
    assert_eq!(normalization.document, json!({"c": 0}));
    let codes: Vec<ErrorCode> = normalization.errors.iter().map(|error| error.code).collect();
    assert_eq!(
        codes,
        vec![ErrorCode::SettingDefaultFailed, ErrorCode::SettingDefaultFailed]
    );
    Ok(())
}

#[test]
fn test_failing_default_setter_blocks_its_readers() -> TestResult {
    let validator = Validator::builder()
        .schema(json!({
            "token": {"default_setter": "broken"},
            "header": {"default_setter": "bearer"}
        }))
        .rule(
            "broken",
            RuleHandler::default_setter(Vec::<String>::new(), |_| Err("no entropy".into())),
        )
        .rule(
            "bearer",
            RuleHandler::default_setter(["token"], |document| {
                Ok(json!(format!("Bearer {}", document["token"])))
            }),
        )
        .build()?;

    let validation = validator.validate(&json!({}))?;
    assert_eq!(validation.document(), &json!({}));
    assert_eq!(
        validation.messages(),
        json!({
            "header": ["default value for 'header' cannot be set: depends on 'token', which has no default"],
            "token": ["default value for 'token' cannot be set: no entropy"]
        })
    );
    Ok(())
}

#[test]
fn test_purge_unknown() -> TestResult {
    let validator = Validator::builder()
        .schema(json!({"name": {"type": "string"}}))
        .purge_unknown(true)
        .build()?;

    let validation = validator.validate(&json!({"name": "ada", "extra": 1}))?;
    assert!(validation.is_valid());
    assert_eq!(validation.document(), &json!({"name": "ada"}));
    Ok(())
}

#[test]
fn test_purge_unknown_in_a_nested_rule_set() -> TestResult {
    let validator = Validator::new(json!({
        "settings": {
            "type": "dict",
            "purge_unknown": true,
            "schema": {"level": {"type": "integer"}}
        }
    }))?;

    let validation = validator.validate(&json!({"settings": {"level": 1, "colour": "red"}}))?;
    assert!(validation.is_valid());
    assert_eq!(validation.document(), &json!({"settings": {"level": 1}}));
    Ok(())
}

#[test]
fn test_config_from_file() -> TestResult {
    let mut fixtures = TestFixtures::new();
    let dir = fixtures.setup(FixtureType::Config)?;
    let config = ValidatorConfig::from_path(&dir.join("config.yaml"))?;
    assert!(config.purge_unknown);
    assert!(config.normalize);

    let validator = Validator::builder()
        .schema(order_schema())
        .config(config)
        .build()?;
    let mut document = valid_order();
    document["coupon"] = json!("SPRING");

    let validation = validator.validate(&document)?;
    assert!(validation.is_valid(), "{}", validation.errors());
    assert!(validation.document().get("coupon").is_none());
    Ok(())
}

#[test]
fn test_normalization_leaves_the_input_untouched() -> TestResult {
    let validator = Validator::new(order_schema())?;
    let document = valid_order();

    validator.validate(&document)?;
    assert_eq!(document, valid_order());
    Ok(())
}
