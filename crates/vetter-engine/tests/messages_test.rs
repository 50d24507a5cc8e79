//! Rendered error messages

use insta::assert_snapshot;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use vetter_engine::{format_path, BasicErrorHandler, ErrorHandler, ErrorList, Validator};
use vetter_test_fixtures::{invalid_order, order_schema};

type TestResult = Result<(), Box<dyn std::error::Error>>;

/// One `path: message` line per root cause.
struct FlatHandler;

impl ErrorHandler for FlatHandler {
    fn render(&self, errors: &ErrorList) -> Value {
        let lines = errors
            .iter()
            .flat_map(|error| error.descendants())
            .filter(|error| !error.is_group_error())
            .map(|error| {
                format!(
                    "{}: {}",
                    format_path(&error.document_path),
                    BasicErrorHandler.message(error)
                )
            })
            .map(Value::String)
            .collect();
        Value::Array(lines)
    }
}

#[test]
fn test_order_messages() -> TestResult {
    let validation = Validator::new(order_schema())?.validate(&invalid_order())?;
    let rendered = serde_json::to_string_pretty(&validation.messages())?;

    assert_snapshot!(rendered, @r###"
    {
      "coupon": [
        "unknown field"
      ],
      "customer": [
        {
          "email": [
            "value does not match regex '[^@]+@[^@]+'"
          ],
          "name": [
            "required field"
          ]
        }
      ],
      "id": [
        "min value is 1"
      ],
      "items": [
        {
          "0": [
            {
              "quantity": [
                "min value is 1"
              ],
              "sku": [
                "required field"
              ]
            }
          ]
        }
      ],
      "status": [
        "unallowed value lost"
      ]
    }
    "###);
    Ok(())
}

#[test]
fn test_leaf_rule_messages() -> TestResult {
    let validator = Validator::new(json!({
        "address": {"type": "string"},
        "alias": {"type": "string", "maxlength": 3},
        "code": {"type": "string", "regex": "[A-Z]{3}"},
        "flags": {"type": "list", "forbidden": ["x"]},
        "nickname": {"type": "string", "empty": false},
        "parent": {"type": "string", "nullable": false},
        "pickup": {"type": "boolean", "excludes": "shipping"},
        "shipping": {"type": "string", "dependencies": "address"}
    }))?;
    let validation = validator.validate(&json!({
        "alias": "abcd",
        "code": "ab",
        "flags": ["x", "y"],
        "nickname": "",
        "parent": null,
        "pickup": true,
        "shipping": "fast"
    }))?;
    let rendered = serde_json::to_string_pretty(&validation.messages())?;

    assert_snapshot!(rendered, @r###"
    {
      "alias": [
        "max length is 3"
      ],
      "code": [
        "value does not match regex '[A-Z]{3}'"
      ],
      "flags": [
        "unallowed values ['x']"
      ],
      "nickname": [
        "empty values not allowed"
      ],
      "parent": [
        "null value not allowed"
      ],
      "pickup": [
        "'shipping' must not be present with 'pickup'"
      ],
      "shipping": [
        "field 'address' is required"
      ]
    }
    "###);
    Ok(())
}

#[test]
fn test_nested_combinator_messages() -> TestResult {
    let validator = Validator::new(json!({
        "shape": {
            "type": "dict",
            "oneof": [
                {"schema": {"radius": {"type": "number", "required": true}}},
                {"schema": {
                    "width": {"type": "number", "required": true},
                    "height": {"type": "number", "required": true}
                }}
            ]
        }
    }))?;
    let validation = validator.validate(&json!({"shape": {"width": 1}}))?;
    let rendered = serde_json::to_string_pretty(&validation.messages())?;

    assert_snapshot!(rendered, @r###"
    {
      "shape": [
        "none or more than one rule validate",
        {
          "oneof definition 0": [
            {
              "radius": [
                "required field"
              ],
              "width": [
                "unknown field"
              ]
            }
          ],
          "oneof definition 1": [
            {
              "height": [
                "required field"
              ]
            }
          ]
        }
      ]
    }
    "###);
    Ok(())
}

#[test]
fn test_custom_handler() -> TestResult {
    let validation = Validator::new(order_schema())?.validate(&invalid_order())?;

    assert_eq!(
        validation.messages_with(&FlatHandler),
        json!([
            "customer.email: value does not match regex '[^@]+@[^@]+'",
            "customer.name: required field",
            "id: min value is 1",
            "items[0].quantity: min value is 1",
            "items[0].sku: required field",
            "status: unallowed value lost",
            "coupon: unknown field"
        ])
    );
    Ok(())
}

#[test]
fn test_error_list_display() -> TestResult {
    let validation = Validator::new(order_schema())?.validate(&invalid_order())?;

    assert_eq!(
        validation.errors().to_string(),
        "5 validation errors:\n  \
         1. customer: 0x81 [schema] (2 child errors)\n  \
         2. id: 0x42 [min]\n  \
         3. items: 0x82 [schema] (1 child errors)\n  \
         4. status: 0x44 [allowed]\n  \
         5. coupon: 0x03\n"
    );
    Ok(())
}
