//! The normalization pass.
//!
//! Works on a copy of the document. Per mapping: rename fields, handle
//! read-only fields, normalize nested containers and coerce values, fill
//! defaults, then purge unknown fields. Failures become errors and the
//! pass carries on with the next field.

use serde_json::Value;
use std::collections::HashSet;
use tracing::{trace, warn};
use vetter_core::{
    format_path, ErrorCode, Map, PathSegment, RuleSet, Schema, SchemaError, ValidationError,
};

use crate::config::AllowUnknown;
use crate::context::{join, Location, Settings};
use crate::defaults::{self, DefaultStep};
use crate::engine::{rule_error, Engine};
use crate::rules::DefaultSetter;

/// A transform of a chain that returned an error.
struct TransformFailure {
    transform: String,
    message: String,
}

/// A pending `default_setter`.
struct PendingSetter<'r> {
    field: String,
    name: String,
    setter: &'r DefaultSetter,
    rules: RuleSet,
}

impl Engine<'_> {
    /// Normalize a copy of `document`, returning it with the errors found.
    pub(crate) fn normalize_document(
        &self,
        document: &Map,
        schema: &Schema,
        settings: &Settings,
    ) -> Result<(Map, Vec<ValidationError>), SchemaError> {
        let mut normalized = document.clone();
        let mut errors = Vec::new();
        self.normalize_mapping(
            &mut normalized,
            schema,
            settings,
            &Location::default(),
            &mut errors,
        )?;
        Ok((normalized, errors))
    }

    fn normalize_mapping(
        &self,
        mapping: &mut Map,
        schema: &Schema,
        settings: &Settings,
        location: &Location,
        errors: &mut Vec<ValidationError>,
    ) -> Result<(), SchemaError> {
        let unknown_rules = self.unknown_rules(settings)?;

        self.rename_fields(mapping, schema, unknown_rules.as_ref(), location, errors)?;
        self.handle_readonly(mapping, schema, settings, location, errors)?;

        for (field, definition) in schema {
            if let Some(value) = mapping.get_mut(field) {
                let rules = self.resolver.resolve_rule_set(definition)?;
                self.normalize_value(value, &rules, settings, &location.field(field), errors)?;
            }
        }
        if let Some(rules) = &unknown_rules {
            for (field, value) in mapping.iter_mut() {
                if !schema.contains_key(field) {
                    let unknown_location = unknown_location(location, field);
                    self.normalize_value(value, rules, settings, &unknown_location, errors)?;
                }
            }
        }

        if !settings.update {
            self.fill_defaults(mapping, schema, settings, location, errors)?;
        }

        if settings.purge_unknown && settings.allow_unknown.is_forbidden() {
            mapping.retain(|field, _| {
                let known = schema.contains_key(field);
                if !known {
                    trace!("Purging unknown field '{}'", field);
                }
                known
            });
        }
        Ok(())
    }

    /// Rules for unknown fields, when `allow_unknown` names some.
    fn unknown_rules(&self, settings: &Settings) -> Result<Option<RuleSet>, SchemaError> {
        match &settings.allow_unknown {
            AllowUnknown::Rules(definition) => {
                self.resolver.resolve_rule_set(definition).map(Some)
            }
            AllowUnknown::Flag(_) => Ok(None),
        }
    }

    fn rename_fields(
        &self,
        mapping: &mut Map,
        schema: &Schema,
        unknown_rules: Option<&RuleSet>,
        location: &Location,
        errors: &mut Vec<ValidationError>,
    ) -> Result<(), SchemaError> {
        let fields: Vec<String> = mapping.keys().cloned().collect();

        for field in fields {
            let (rules, field_location) = match schema.get(&field) {
                Some(definition) => (
                    self.resolver.resolve_rule_set(definition)?,
                    location.field(&field),
                ),
                None => match unknown_rules {
                    Some(rules) => (rules.clone(), unknown_location(location, &field)),
                    None => continue,
                },
            };

            let target = if let Some(Value::String(target)) = rules.get("rename") {
                target.clone()
            } else if rules.contains("rename_handler") {
                let chain = rules.names("rename_handler");
                match self.apply_chain(&chain, &Value::String(field.clone()), &field_location)? {
                    Ok(Value::String(renamed)) => renamed,
                    Ok(other) => other.to_string(),
                    Err(failure) => {
                        errors.push(
                            rule_error(&field_location, "rename_handler", ErrorCode::RenamingFailed)
                                .with_constraint(
                                    rules.get("rename_handler").cloned().unwrap_or(Value::Null),
                                )
                                .with_value(mapping.get(&field).cloned().unwrap_or(Value::Null))
                                .with_info(vec![
                                    Value::String(failure.transform),
                                    Value::String(failure.message),
                                ]),
                        );
                        continue;
                    }
                }
            } else {
                continue;
            };

            if target != field {
                if let Some(value) = mapping.remove(&field) {
                    trace!("Renaming '{}' to '{}'", field, target);
                    mapping.insert(target, value);
                }
            }
        }
        Ok(())
    }

    fn handle_readonly(
        &self,
        mapping: &mut Map,
        schema: &Schema,
        settings: &Settings,
        location: &Location,
        errors: &mut Vec<ValidationError>,
    ) -> Result<(), SchemaError> {
        for (field, definition) in schema {
            if !mapping.contains_key(field) {
                continue;
            }
            let rules = self.resolver.resolve_rule_set(definition)?;
            if !rules.is_readonly() {
                continue;
            }
            if settings.purge_readonly {
                trace!("Purging read-only field '{}'", field);
                mapping.remove(field);
            } else if let Some(value) = mapping.get(field) {
                errors.push(
                    rule_error(&location.field(field), "readonly", ErrorCode::ReadonlyField)
                        .with_constraint(Value::Bool(true))
                        .with_value(value.clone()),
                );
            }
        }
        Ok(())
    }

    /// Normalize a value's nested containers, then coerce the value itself.
    fn normalize_value(
        &self,
        value: &mut Value,
        rules: &RuleSet,
        settings: &Settings,
        location: &Location,
        errors: &mut Vec<ValidationError>,
    ) -> Result<(), SchemaError> {
        self.normalize_containers(value, rules, settings, location, errors)?;
        self.coerce(value, rules, location, errors)
    }

    fn normalize_containers(
        &self,
        value: &mut Value,
        rules: &RuleSet,
        settings: &Settings,
        location: &Location,
        errors: &mut Vec<ValidationError>,
    ) -> Result<(), SchemaError> {
        let nested = settings.nested(rules);

        if let Some(constraint) = rules.get("schema") {
            match value {
                Value::Object(mapping) => {
                    if let Some(schema) = self.mapping_schema(constraint)? {
                        let schema_location = location.rules([PathSegment::from("schema")]);
                        self.normalize_mapping(
                            mapping,
                            &schema,
                            &nested,
                            &schema_location,
                            errors,
                        )?;
                    }
                }
                Value::Array(items) => {
                    if let Some(item_rules) = self.sequence_rules(constraint)? {
                        for (index, item) in items.iter_mut().enumerate() {
                            let item_location = location
                                .member(PathSegment::Index(index), [PathSegment::from("schema")]);
                            self.normalize_value(
                                item,
                                &item_rules,
                                &nested,
                                &item_location,
                                errors,
                            )?;
                        }
                    }
                }
                _ => {}
            }
        }

        if let (Some(Value::Array(definitions)), Value::Array(items)) =
            (rules.get("items"), &mut *value)
        {
            // A length mismatch is left for validation to report.
            if definitions.len() == items.len() {
                for (index, (definition, item)) in definitions.iter().zip(items).enumerate() {
                    let item_rules = self.resolver.resolve_rule_set(definition)?;
                    let item_location = location.member(
                        PathSegment::Index(index),
                        [PathSegment::from("items"), PathSegment::Index(index)],
                    );
                    self.normalize_value(item, &item_rules, &nested, &item_location, errors)?;
                }
            }
        }

        if let (Some(definition), Value::Object(mapping)) =
            (rules.get("valuesrules"), &mut *value)
        {
            let member_rules = self.resolver.resolve_rule_set(definition)?;
            for (key, member) in mapping.iter_mut() {
                let member_location = location.member(
                    PathSegment::from(key.as_str()),
                    [PathSegment::from("valuesrules")],
                );
                self.normalize_value(member, &member_rules, &nested, &member_location, errors)?;
            }
        }

        if let (Some(definition), Value::Object(mapping)) = (rules.get("keysrules"), &mut *value) {
            let key_rules = self.resolver.resolve_rule_set(definition)?;
            for (key, member) in std::mem::take(mapping) {
                let key_location = location.member(
                    PathSegment::from(key.as_str()),
                    [PathSegment::from("keysrules")],
                );
                let mut normalized_key = Value::String(key);
                self.normalize_value(
                    &mut normalized_key,
                    &key_rules,
                    &nested,
                    &key_location,
                    errors,
                )?;
                let key = match normalized_key {
                    Value::String(key) => key,
                    other => other.to_string(),
                };
                mapping.insert(key, member);
            }
        }

        Ok(())
    }

    /// Run the `coerce` chain. A failed chain leaves the value as it was.
    fn coerce(
        &self,
        value: &mut Value,
        rules: &RuleSet,
        location: &Location,
        errors: &mut Vec<ValidationError>,
    ) -> Result<(), SchemaError> {
        let chain = rules.names("coerce");
        if chain.is_empty() {
            return Ok(());
        }

        match self.apply_chain(&chain, value, location)? {
            Ok(coerced) => *value = coerced,
            // Transforms rejecting null leave it alone.
            Err(_) if value.is_null() => {}
            Err(failure) => {
                trace!(
                    "Coercion of {} failed in '{}'",
                    format_path(&location.document_path),
                    failure.transform
                );
                errors.push(
                    rule_error(location, "coerce", ErrorCode::CoercionFailed)
                        .with_constraint(rules.get("coerce").cloned().unwrap_or(Value::Null))
                        .with_value(value.clone())
                        .with_info(vec![
                            Value::String(failure.transform),
                            Value::String(failure.message),
                        ]),
                );
            }
        }
        Ok(())
    }

    /// Feed `value` through the named transforms in order, stopping at the
    /// first failure.
    fn apply_chain(
        &self,
        chain: &[String],
        value: &Value,
        location: &Location,
    ) -> Result<Result<Value, TransformFailure>, SchemaError> {
        let mut current = value.clone();
        for name in chain {
            let transform = self
                .rules
                .transform(name)
                .ok_or_else(|| SchemaError::UnknownHandler {
                    kind: "transform",
                    name: name.clone(),
                    path: format_path(&location.schema_path),
                })?;
            match transform(&current) {
                Ok(next) => current = next,
                Err(err) => {
                    return Ok(Err(TransformFailure {
                        transform: name.clone(),
                        message: err.to_string(),
                    }))
                }
            }
        }
        Ok(Ok(current))
    }

    fn fill_defaults(
        &self,
        mapping: &mut Map,
        schema: &Schema,
        settings: &Settings,
        location: &Location,
        errors: &mut Vec<ValidationError>,
    ) -> Result<(), SchemaError> {
        let mut pending = Vec::new();

        for (field, definition) in schema {
            let rules = self.resolver.resolve_rule_set(definition)?;
            let needs_default = match mapping.get(field) {
                None => true,
                Some(Value::Null) => !rules.is_nullable(),
                Some(_) => false,
            };
            if !needs_default {
                continue;
            }

            let field_location = location.field(field);
            if let Some(default) = rules.get("default") {
                trace!("Filling default for '{}'", field);
                let mut filled = default.clone();
                self.normalize_value(&mut filled, &rules, settings, &field_location, errors)?;
                mapping.insert(field.clone(), filled);
                continue;
            }

            let Some(name) = rules
                .get("default_setter")
                .and_then(Value::as_str)
                .map(str::to_string)
            else {
                continue;
            };
            let setter =
                self.rules
                    .default_setter(&name)
                    .ok_or_else(|| SchemaError::UnknownHandler {
                        kind: "default setter",
                        name: name.clone(),
                        path: format_path(&field_location.rule_path("default_setter")),
                    })?;
            pending.push(PendingSetter {
                field: field.clone(),
                name,
                setter,
                rules,
            });
        }

        if pending.is_empty() {
            return Ok(());
        }
        self.run_default_setters(mapping, pending, settings, location, errors)
    }

    fn run_default_setters(
        &self,
        mapping: &mut Map,
        pending: Vec<PendingSetter<'_>>,
        settings: &Settings,
        location: &Location,
        errors: &mut Vec<ValidationError>,
    ) -> Result<(), SchemaError> {
        let steps = defaults::plan(pending.iter().map(|setter| {
            (
                setter.field.as_str(),
                setter.setter.reads.iter().map(String::as_str),
            )
        }));
        let find = |field: &str| pending.iter().find(|setter| setter.field == field);
        let mut failed: HashSet<String> = HashSet::new();

        for step in steps {
            match step {
                DefaultStep::Cycle(fields) => {
                    warn!(
                        "Default setters at {} read each other: {}",
                        format_path(&location.schema_path),
                        fields.join(", ")
                    );
                    let message = format!(
                        "circular dependency between default setters of {}",
                        fields.join(", ")
                    );
                    for field in fields {
                        if let Some(setter) = find(&field) {
                            errors.push(setter_error(location, setter, message.clone()));
                        }
                        failed.insert(field);
                    }
                }
                DefaultStep::Resolve(field) => {
                    let Some(setter) = find(&field) else {
                        continue;
                    };
                    if let Some(blocked) =
                        setter.setter.reads.iter().find(|read| failed.contains(*read))
                    {
                        let message = format!("depends on '{}', which has no default", blocked);
                        errors.push(setter_error(location, setter, message));
                        failed.insert(field);
                        continue;
                    }

                    match setter.setter.call(mapping) {
                        Ok(mut value) => {
                            trace!("Default setter '{}' filled '{}'", setter.name, field);
                            let field_location = location.field(&field);
                            self.normalize_value(
                                &mut value,
                                &setter.rules,
                                settings,
                                &field_location,
                                errors,
                            )?;
                            mapping.insert(field, value);
                        }
                        Err(err) => {
                            errors.push(setter_error(location, setter, err.to_string()));
                            failed.insert(field);
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

fn unknown_location(location: &Location, field: &str) -> Location {
    Location::new(
        join(&location.document_path, [PathSegment::from(field)]),
        join(&location.schema_path, [PathSegment::from("allow_unknown")]),
    )
}

fn setter_error(
    location: &Location,
    setter: &PendingSetter<'_>,
    message: String,
) -> ValidationError {
    rule_error(
        &location.field(&setter.field),
        "default_setter",
        ErrorCode::SettingDefaultFailed,
    )
    .with_constraint(Value::String(setter.name.clone()))
    .with_info(vec![Value::String(message)])
}
