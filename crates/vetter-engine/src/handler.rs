//! Rendering errors for people.
//!
//! [`BasicErrorHandler`] turns an [`ErrorList`] into a JSON mapping of
//! field names to message lists. Errors below a field (nested schemas,
//! sequence items) appear as a mapping at the end of that field's list;
//! combinator errors list their own message followed by a mapping of
//! `"<rule> definition <n>"` to what each operand reported.

use serde_json::{Map as JsonMap, Value};
use std::collections::BTreeMap;
use vetter_core::{ErrorCode, ErrorList, PathSegment, ValidationError};

/// Renders an error list into a user-facing value.
pub trait ErrorHandler {
    fn render(&self, errors: &ErrorList) -> Value;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BasicErrorHandler;

impl BasicErrorHandler {
    pub fn new() -> Self {
        Self
    }

    /// The message for a single error.
    pub fn message(&self, error: &ValidationError) -> String {
        let field = error
            .document_path
            .last()
            .map(PathSegment::as_key)
            .unwrap_or_default();
        let constraint = || error.constraint.as_ref().map(py_str).unwrap_or_default();
        let info = |index: usize| error.info.get(index).map(py_str).unwrap_or_default();
        let value = || error.value.as_ref().map(py_str).unwrap_or_default();

        match error.code {
            ErrorCode::Custom => info(0),
            ErrorCode::DocumentMissing => "document is missing".to_string(),
            ErrorCode::RequiredField => "required field".to_string(),
            ErrorCode::UnknownField => "unknown field".to_string(),
            ErrorCode::DependenciesField => format!("field '{}' is required", info(0)),
            ErrorCode::DependenciesFieldValue => {
                format!("depends on these values: {}", constraint())
            }
            ErrorCode::ExcludesField => {
                let excluded: Vec<String> =
                    error.info.iter().map(|name| format!("'{}'", py_str(name))).collect();
                format!("{} must not be present with '{}'", excluded.join(", "), field)
            }
            ErrorCode::DocumentFormat => format!("'{}' is not a document, must be a dict", value()),
            ErrorCode::EmptyNotAllowed => "empty values not allowed".to_string(),
            ErrorCode::NotNullable => "null value not allowed".to_string(),
            ErrorCode::BadType => format!("must be of {} type", constraint()),
            ErrorCode::BadTypeForSchema => match error.value {
                Some(Value::Object(_)) => "must be of list type".to_string(),
                _ => "must be of dict type".to_string(),
            },
            ErrorCode::ItemsLength => {
                format!("length of list should be {}, it is {}", info(0), info(1))
            }
            ErrorCode::MinLength => format!("min length is {}", constraint()),
            ErrorCode::MaxLength => format!("max length is {}", constraint()),
            ErrorCode::RegexMismatch => format!("value does not match regex '{}'", constraint()),
            ErrorCode::MinValue => format!("min value is {}", constraint()),
            ErrorCode::MaxValue => format!("max value is {}", constraint()),
            ErrorCode::UnallowedValue | ErrorCode::ForbiddenValue => {
                format!("unallowed value {}", value())
            }
            ErrorCode::UnallowedValues | ErrorCode::ForbiddenValues => {
                format!("unallowed values {}", info(0))
            }
            ErrorCode::MissingMembers => format!("missing members {}", info(0)),
            ErrorCode::CoercionFailed => {
                format!("field '{}' cannot be coerced: {}", field, info(1))
            }
            ErrorCode::RenamingFailed => {
                format!("field '{}' cannot be renamed: {}", field, info(1))
            }
            ErrorCode::ReadonlyField => "field is read-only".to_string(),
            ErrorCode::SettingDefaultFailed => {
                format!("default value for '{}' cannot be set: {}", field, info(0))
            }
            ErrorCode::MappingSchema => "mapping doesn't validate subschema".to_string(),
            ErrorCode::SequenceSchema | ErrorCode::BadItems => {
                "one or more sequence-items don't validate".to_string()
            }
            ErrorCode::Keysrules => "one or more keys of a mapping don't validate".to_string(),
            ErrorCode::Valuesrules => "one or more values in a mapping don't validate".to_string(),
            ErrorCode::Noneof => "one or more definitions validate".to_string(),
            ErrorCode::Oneof => "none or more than one rule validate".to_string(),
            ErrorCode::Anyof => "no definitions validate".to_string(),
            ErrorCode::Allof => "one or more definitions don't validate".to_string(),
        }
    }

    fn insert(&self, root: &mut Node, error: &ValidationError, prefix: &[String], offset: usize) {
        let mut path = prefix.to_vec();
        path.extend(
            error
                .document_path
                .iter()
                .skip(offset)
                .map(PathSegment::as_key),
        );

        if error.is_logical_error() {
            root.at(&path).messages.push(self.message(error));
            let rule = error
                .rule
                .as_deref()
                .or_else(|| error.code.rule())
                .unwrap_or_default();
            let depth = error.schema_path.len();
            for child in &error.child_errors {
                let operand = match child.schema_path.get(depth) {
                    Some(PathSegment::Index(index)) => *index,
                    _ => 0,
                };
                let mut operand_path = path.clone();
                operand_path.push(format!("{} definition {}", rule, operand));
                self.insert(root, child, &operand_path, error.document_path.len());
            }
        } else if error.is_group_error() {
            for child in &error.child_errors {
                self.insert(root, child, prefix, offset);
            }
        } else {
            root.at(&path).messages.push(self.message(error));
        }
    }
}

impl ErrorHandler for BasicErrorHandler {
    fn render(&self, errors: &ErrorList) -> Value {
        let mut root = Node::default();
        for error in errors {
            self.insert(&mut root, error, &[], 0);
        }
        Value::Object(root.children_value())
    }
}

#[derive(Debug, Default)]
struct Node {
    messages: Vec<String>,
    children: BTreeMap<String, Node>,
}

impl Node {
    fn at(&mut self, path: &[String]) -> &mut Node {
        path.iter().fold(self, |node, key| {
            node.children.entry(key.clone()).or_default()
        })
    }

    fn children_value(&self) -> JsonMap<String, Value> {
        self.children
            .iter()
            .map(|(key, child)| (key.clone(), child.to_value()))
            .collect()
    }

    fn to_value(&self) -> Value {
        let mut items: Vec<Value> = self
            .messages
            .iter()
            .cloned()
            .map(Value::String)
            .collect();
        if !self.children.is_empty() {
            items.push(Value::Object(self.children_value()));
        }
        Value::Array(items)
    }
}

/// A value as it reads inside a message: strings bare, everything else in
/// the classic literal notation (`None`, `True`, `['a', 1]`, `{'k': 'v'}`).
pub fn py_str(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => py_repr(other),
    }
}

/// A value in literal notation, strings quoted.
pub fn py_repr(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(number) => number.to_string(),
        Value::String(text) => quote(text),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(py_repr).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Object(map) => {
            let entries: Vec<String> = map
                .iter()
                .map(|(key, value)| format!("{}: {}", quote(key), py_repr(value)))
                .collect();
            format!("{{{}}}", entries.join(", "))
        }
    }
}

fn quote(text: &str) -> String {
    if text.contains('\'') && !text.contains('"') {
        format!("\"{}\"", text)
    } else {
        format!("'{}'", text.replace('\'', "\\'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn leaf(path: &[&str], code: ErrorCode) -> ValidationError {
        ValidationError::new(
            path.iter().map(|key| PathSegment::from(*key)).collect(),
            Vec::new(),
            code,
        )
    }

    #[test]
    fn test_repr() {
        assert_eq!(py_repr(&json!(["dict", "string"])), "['dict', 'string']");
        assert_eq!(py_repr(&json!({"a": null, "b": true})), "{'a': None, 'b': True}");
        assert_eq!(py_repr(&json!(1.5)), "1.5");
        assert_eq!(py_repr(&json!("it's")), "\"it's\"");
        assert_eq!(py_str(&json!("plain")), "plain");
    }

    #[test]
    fn test_messages() {
        let handler = BasicErrorHandler::new();

        let bad_type = leaf(&["age"], ErrorCode::BadType).with_constraint(json!("integer"));
        assert_eq!(handler.message(&bad_type), "must be of integer type");

        let bad_types =
            leaf(&["age"], ErrorCode::BadType).with_constraint(json!(["dict", "string"]));
        assert_eq!(handler.message(&bad_types), "must be of ['dict', 'string'] type");

        let excludes = leaf(&["this"], ErrorCode::ExcludesField)
            .with_info(vec![json!("that"), json!("other")]);
        assert_eq!(
            handler.message(&excludes),
            "'that', 'other' must not be present with 'this'"
        );

        let coercion = leaf(&["amount"], ErrorCode::CoercionFailed)
            .with_info(vec![json!("to_int"), json!("invalid digit found in string")]);
        assert_eq!(
            handler.message(&coercion),
            "field 'amount' cannot be coerced: invalid digit found in string"
        );

        let custom = leaf(&["x"], ErrorCode::Custom).with_info(vec![json!("must be odd")]);
        assert_eq!(handler.message(&custom), "must be odd");
    }

    #[test]
    fn test_group_errors_nest_under_their_field() {
        let child = leaf(&["address", "city"], ErrorCode::RequiredField);
        let group = ValidationError::new(
            vec!["address".into()],
            vec!["address".into(), "schema".into()],
            ErrorCode::MappingSchema,
        )
        .with_children(vec![child]);
        let errors = ErrorList::from(vec![group, leaf(&["name"], ErrorCode::UnknownField)]);

        assert_eq!(
            BasicErrorHandler.render(&errors),
            json!({
                "address": [{"city": ["required field"]}],
                "name": ["unknown field"]
            })
        );
    }
}
