//! Schema well-formedness check.
//!
//! Walks everything reachable from a schema, registry references included,
//! and rejects unknown rules, unknown handlers and badly shaped constraints
//! before any document is looked at. Each registry entry is visited once,
//! so self-referencing definitions terminate.

use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use tracing::trace;
use vetter_core::schema::split_of_rule;
use vetter_core::{format_path, Map, PathSegment, RuleSet, SchemaError};

use crate::context::join;
use crate::engine::Engine;

const BOOLEAN_RULES: [&str; 6] = [
    "empty",
    "nullable",
    "purge_unknown",
    "readonly",
    "require_all",
    "required",
];

impl Engine<'_> {
    /// Check a schema literal or schema reference.
    pub(crate) fn check_schema(&self, schema: &Value) -> Result<(), SchemaError> {
        let mut checker = Checker {
            engine: self,
            schemas: HashSet::new(),
            rules_sets: HashSet::new(),
        };
        checker.check_schema(schema, &[])
    }
}

struct Checker<'e, 'v> {
    engine: &'e Engine<'v>,
    schemas: HashSet<String>,
    rules_sets: HashSet<String>,
}

impl Checker<'_, '_> {
    fn check_schema(
        &mut self,
        definition: &Value,
        path: &[PathSegment],
    ) -> Result<(), SchemaError> {
        match definition {
            Value::String(name) => {
                if !self.schemas.insert(name.clone()) {
                    return Ok(());
                }
                trace!("Checking schema '{}'", name);
                let schema = self.engine.resolver.resolve_schema(definition)?;
                self.check_fields(&schema, &[PathSegment::from(name.as_str())])
            }
            Value::Object(schema) => self.check_fields(schema, path),
            other => Err(SchemaError::NotAMapping(other.to_string())),
        }
    }

    fn check_fields(&mut self, schema: &Map, path: &[PathSegment]) -> Result<(), SchemaError> {
        for (field, definition) in schema {
            self.check_rule_set(definition, &join(path, [PathSegment::from(field.as_str())]))?;
        }
        Ok(())
    }

    fn check_rule_set(
        &mut self,
        definition: &Value,
        path: &[PathSegment],
    ) -> Result<(), SchemaError> {
        match definition {
            Value::String(name) => {
                if !self.rules_sets.insert(name.clone()) {
                    return Ok(());
                }
                trace!("Checking rules set '{}'", name);
                let rules = self.engine.resolver.resolve_rule_set(definition)?;
                self.check_rules(&rules, &[PathSegment::from(name.as_str())])
            }
            Value::Object(rules) => self.check_rules(&RuleSet::new(rules), path),
            other => Err(SchemaError::NotARulesSet(other.to_string())),
        }
    }

    fn check_rules(&mut self, rules: &RuleSet, path: &[PathSegment]) -> Result<(), SchemaError> {
        for (rule, constraint) in rules.iter() {
            self.check_rule(rule, constraint, &join(path, [PathSegment::from(rule.as_str())]))?;
        }
        Ok(())
    }

    fn check_rule(
        &mut self,
        rule: &str,
        constraint: &Value,
        path: &[PathSegment],
    ) -> Result<(), SchemaError> {
        match rule {
            _ if BOOLEAN_RULES.contains(&rule) => {
                expect(constraint.is_boolean(), rule, path, "must be a boolean")
            }
            "default" | "meta" => Ok(()),
            "rename" => expect(constraint.is_string(), rule, path, "must be a string"),
            "type" => self.check_types(constraint, path),
            "coerce" | "rename_handler" => {
                self.check_handlers(rule, constraint, path, "transform", |engine, name| {
                    engine.rules.transform(name).is_some()
                })
            }
            "check_with" => {
                self.check_handlers(rule, constraint, path, "predicate", |engine, name| {
                    engine.rules.predicate(name).is_some()
                })
            }
            "default_setter" => {
                expect(constraint.is_string(), rule, path, "must be a handler name")?;
                self.check_handlers(rule, constraint, path, "default setter", |engine, name| {
                    engine.rules.default_setter(name).is_some()
                })
            }
            "allow_unknown" => match constraint {
                Value::Bool(_) => Ok(()),
                rules => self.check_rule_set(rules, path),
            },
            "schema" => self.check_nested_schema(constraint, path),
            "items" => {
                let Value::Array(definitions) = constraint else {
                    return Err(invalid(rule, path, "must be a list of rule sets"));
                };
                for (index, definition) in definitions.iter().enumerate() {
                    self.check_rule_set(definition, &join(path, [PathSegment::Index(index)]))?;
                }
                Ok(())
            }
            "keysrules" | "valuesrules" => self.check_rule_set(constraint, path),
            "allof" | "anyof" | "noneof" | "oneof" => {
                let Value::Array(operands) = constraint else {
                    return Err(invalid(rule, path, "must be a list of rule sets"));
                };
                for (index, operand) in operands.iter().enumerate() {
                    self.check_rule_set(operand, &join(path, [PathSegment::Index(index)]))?;
                }
                Ok(())
            }
            "dependencies" => match constraint {
                Value::String(_) | Value::Object(_) => Ok(()),
                Value::Array(paths) => expect(
                    paths.iter().all(Value::is_string),
                    rule,
                    path,
                    "must list field names",
                ),
                _ => Err(invalid(rule, path, "must be a field name, a list or a mapping")),
            },
            "excludes" => match constraint {
                Value::String(_) => Ok(()),
                Value::Array(fields) => expect(
                    fields.iter().all(Value::is_string),
                    rule,
                    path,
                    "must list field names",
                ),
                _ => Err(invalid(rule, path, "must be a field name or a list")),
            },
            _ if split_of_rule(rule).is_some() => {
                Err(invalid(rule, path, "must be a list of constraints"))
            }
            _ => match self.engine.rules.predicate(rule) {
                Some(predicate) => match predicate.check_constraint {
                    Some(check) => {
                        check(constraint).map_err(|reason| invalid(rule, path, &reason))
                    }
                    None => Ok(()),
                },
                None => Err(SchemaError::UnknownRule {
                    rule: rule.to_string(),
                    path: format_path(path),
                }),
            },
        }
    }

    fn check_types(&self, constraint: &Value, path: &[PathSegment]) -> Result<(), SchemaError> {
        let names: Vec<&str> = match constraint {
            Value::String(name) => vec![name.as_str()],
            Value::Array(names) => names
                .iter()
                .map(|name| {
                    name.as_str()
                        .ok_or_else(|| invalid("type", path, "must list type names"))
                })
                .collect::<Result<_, _>>()?,
            _ => return Err(invalid("type", path, "must be a type name or a list")),
        };

        for name in names {
            let known = self.engine.types.contains(name)
                || self.engine.rules.type_test(name).is_some();
            if !known {
                return Err(SchemaError::UnknownType {
                    type_name: name.to_string(),
                    path: format_path(path),
                });
            }
        }
        Ok(())
    }

    fn check_handlers<F>(
        &self,
        rule: &str,
        constraint: &Value,
        path: &[PathSegment],
        kind: &'static str,
        registered: F,
    ) -> Result<(), SchemaError>
    where
        F: Fn(&Engine<'_>, &str) -> bool,
    {
        let names: Vec<&str> = match constraint {
            Value::String(name) => vec![name.as_str()],
            Value::Array(names) if names.iter().all(Value::is_string) => {
                names.iter().filter_map(Value::as_str).collect()
            }
            _ => return Err(invalid(rule, path, "must be a handler name or a list of names")),
        };

        match names.into_iter().find(|name| !registered(self.engine, *name)) {
            Some(name) => Err(SchemaError::UnknownHandler {
                kind,
                name: name.to_string(),
                path: format_path(path),
            }),
            None => Ok(()),
        }
    }

    /// `schema` holds either rules for sequence items or a mapping schema.
    fn check_nested_schema(
        &mut self,
        constraint: &Value,
        path: &[PathSegment],
    ) -> Result<(), SchemaError> {
        match constraint {
            Value::String(name) => {
                let resolver = self.engine.resolver;
                if resolver.schemas().contains(name) {
                    self.check_schema(constraint, path)
                } else if resolver.rules_sets().contains(name) {
                    self.check_rule_set(constraint, path)
                } else {
                    Err(SchemaError::UnknownSchema(name.clone()))
                }
            }
            Value::Object(definition) => {
                let looks_like_rules = definition.keys().all(|rule| {
                    self.engine.is_known_rule(rule) || split_of_rule(rule).is_some()
                });
                if !looks_like_rules {
                    return self.check_fields(definition, path);
                }
                // Field names may collide with rule names; accept either reading.
                let as_rules = self.check_rules(&RuleSet::new(definition), path);
                match as_rules {
                    Ok(()) => Ok(()),
                    Err(err) => self.check_fields(definition, path).map_err(|_| err),
                }
            }
            _ => Err(invalid("schema", path, "must be a schema or a rule set")),
        }
    }
}

fn invalid(rule: &str, path: &[PathSegment], reason: &str) -> SchemaError {
    SchemaError::InvalidConstraint {
        rule: rule.to_string(),
        path: format_path(path),
        reason: reason.to_string(),
    }
}

fn expect(holds: bool, rule: &str, path: &[PathSegment], reason: &str) -> Result<(), SchemaError> {
    if holds {
        Ok(())
    } else {
        Err(invalid(rule, path, reason))
    }
}

/// Fingerprints of schemas that passed the check.
#[derive(Debug, Default)]
pub(crate) struct SchemaCache {
    checked: Mutex<HashSet<String>>,
}

impl SchemaCache {
    pub fn contains(&self, fingerprint: &str) -> bool {
        self.checked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(fingerprint)
    }

    pub fn insert(&self, fingerprint: String) {
        self.checked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(fingerprint);
    }

    pub fn clear(&self) {
        self.checked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.checked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
