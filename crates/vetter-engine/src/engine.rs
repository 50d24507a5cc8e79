//! The validation engine.
//!
//! Every check returns the errors it found instead of writing into shared
//! state; a parent decides whether its children's errors become a group
//! error, are discarded, or are merged as they are.

use serde_json::Value;
use tracing::trace;
use vetter_core::schema::is_core_rule;
use vetter_core::{
    ErrorCode, Map, PathSegment, RuleSet, Schema, SchemaError, TypeRegistry, ValidationError,
};
use vetter_registry::Resolver;

use crate::config::AllowUnknown;
use crate::context::{join, Location, Scope};
use crate::rules::{
    contains_value, values_equal, Emitted, Emitter, PredicateRule, RegexCache, RuleCall,
    RuleRegistry,
};

/// Rules an empty value skips when the rule set declares `empty`.
const SKIPPED_WHEN_EMPTY: [&str; 6] = [
    "allowed",
    "contains",
    "forbidden",
    "items",
    "minlength",
    "regex",
];

/// Everything a validation or normalization pass looks things up in.
pub(crate) struct Engine<'v> {
    pub types: &'v TypeRegistry,
    pub rules: &'v RuleRegistry,
    pub resolver: &'v Resolver,
    pub regexes: &'v RegexCache,
}

/// A leaf error raised by `rule` of the rule set at `location`.
pub(crate) fn rule_error(location: &Location, rule: &str, code: ErrorCode) -> ValidationError {
    ValidationError::new(location.document_path.clone(), location.rule_path(rule), code)
        .with_rule(rule)
}

impl Engine<'_> {
    /// Validate the fields of `scope.mapping` against `schema`.
    pub(crate) fn validate_mapping(
        &self,
        scope: &Scope<'_>,
        schema: &Schema,
        location: &Location,
    ) -> Result<Vec<ValidationError>, SchemaError> {
        let mut errors = Vec::new();

        for (field, definition) in schema {
            let rules = self.resolver.resolve_rule_set(definition)?;
            let field_location = location.field(field);
            let value = scope
                .mapping
                .get(field)
                .filter(|value| !(value.is_null() && scope.settings.ignore_none_values));

            match value {
                Some(value) => errors.extend(self.validate_value(
                    scope,
                    field,
                    value,
                    &rules,
                    &field_location,
                )?),
                None => errors.extend(self.check_required(scope, schema, field, &rules, location)?),
            }
        }

        errors.extend(self.validate_unknown_fields(scope, schema, location)?);
        Ok(errors)
    }

    fn validate_unknown_fields(
        &self,
        scope: &Scope<'_>,
        schema: &Schema,
        location: &Location,
    ) -> Result<Vec<ValidationError>, SchemaError> {
        let mut errors = Vec::new();
        let unknown = scope
            .mapping
            .iter()
            .filter(|(field, _)| !schema.contains_key(field.as_str()));

        for (field, value) in unknown {
            match &scope.settings.allow_unknown {
                AllowUnknown::Flag(true) => {}
                AllowUnknown::Flag(false) => {
                    trace!("Unknown field '{}'", field);
                    errors.push(
                        ValidationError::new(
                            join(&location.document_path, [PathSegment::from(field.as_str())]),
                            location.schema_path.clone(),
                            ErrorCode::UnknownField,
                        )
                        .with_value(value.clone()),
                    );
                }
                AllowUnknown::Rules(definition) => {
                    let rules = self.resolver.resolve_rule_set(definition)?;
                    let unknown_location = Location::new(
                        join(&location.document_path, [PathSegment::from(field.as_str())]),
                        join(&location.schema_path, [PathSegment::from("allow_unknown")]),
                    );
                    errors.extend(self.validate_value(
                        scope,
                        field,
                        value,
                        &rules,
                        &unknown_location,
                    )?);
                }
            }
        }
        Ok(errors)
    }

    /// A required field is missing unless an excluding field is present.
    fn check_required(
        &self,
        scope: &Scope<'_>,
        schema: &Schema,
        field: &str,
        rules: &RuleSet,
        location: &Location,
    ) -> Result<Option<ValidationError>, SchemaError> {
        if scope.settings.update {
            return Ok(None);
        }

        let (required, schema_path) = match rules.flag("required") {
            Some(required) => (required, location.field(field).rule_path("required")),
            None => (
                scope.settings.require_all,
                location.rule_path("require_all"),
            ),
        };
        if !required || self.excluded_by_present_field(scope, schema, field, rules)? {
            return Ok(None);
        }

        trace!("Required field '{}' is missing", field);
        Ok(Some(
            ValidationError::new(
                join(&location.document_path, [PathSegment::from(field)]),
                schema_path,
                ErrorCode::RequiredField,
            )
            .with_constraint(Value::Bool(true)),
        ))
    }

    fn excluded_by_present_field(
        &self,
        scope: &Scope<'_>,
        schema: &Schema,
        field: &str,
        rules: &RuleSet,
    ) -> Result<bool, SchemaError> {
        if rules
            .names("excludes")
            .iter()
            .any(|other| is_present(scope.mapping, other))
        {
            return Ok(true);
        }
        for (other, definition) in schema {
            if other == field || !is_present(scope.mapping, other) {
                continue;
            }
            let other_rules = self.resolver.resolve_rule_set(definition)?;
            if other_rules.names("excludes").iter().any(|name| name == field) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Validate one present value against its rule set.
    pub(crate) fn validate_value(
        &self,
        scope: &Scope<'_>,
        field: &str,
        value: &Value,
        rules: &RuleSet,
        location: &Location,
    ) -> Result<Vec<ValidationError>, SchemaError> {
        trace!("Validating '{}' against {} rules", field, rules.as_map().len());
        let mut errors = Vec::new();

        if rules.is_readonly() {
            // Flagged paths were reported by normalization. Unflagged fields
            // with a default may have been filled in by it.
            let defaulted = scope.normalized
                && (rules.contains("default") || rules.contains("default_setter"));
            if !defaulted && !scope.flagged_readonly.contains(&location.document_path) {
                errors.push(
                    rule_error(location, "readonly", ErrorCode::ReadonlyField)
                        .with_constraint(Value::Bool(true))
                        .with_value(value.clone()),
                );
            }
            return Ok(errors);
        }

        if value.is_null() {
            if !rules.is_nullable() {
                errors.push(
                    rule_error(location, "nullable", ErrorCode::NotNullable)
                        .with_constraint(
                            rules.get("nullable").cloned().unwrap_or(Value::Bool(false)),
                        )
                        .with_value(Value::Null),
                );
            }
            errors.extend(self.check_relations(scope, rules, location, value));
            return Ok(errors);
        }

        let type_names = rules.type_names();
        if !type_names.is_empty() && !type_names.iter().any(|name| self.matches_type(name, value)) {
            errors.push(
                rule_error(location, "type", ErrorCode::BadType)
                    .with_constraint(rules.get("type").cloned().unwrap_or(Value::Null))
                    .with_value(value.clone()),
            );
            errors.extend(self.check_relations(scope, rules, location, value));
            return Ok(errors);
        }

        let empty = is_empty(value) && rules.contains("empty");
        if empty && rules.flag("empty") == Some(false) {
            errors.push(
                rule_error(location, "empty", ErrorCode::EmptyNotAllowed)
                    .with_constraint(Value::Bool(false))
                    .with_value(value.clone()),
            );
        }
        let skipped: &[&str] = if empty { &SKIPPED_WHEN_EMPTY } else { &[] };

        for (rule, constraint) in rules.iter() {
            if is_core_rule(rule) || skipped.contains(&rule.as_str()) {
                continue;
            }
            let Some(predicate) = self.rules.predicate(rule) else {
                continue;
            };
            if !self.implied_types_hold(predicate, value) {
                trace!("Skipping '{}' for '{}', implied type does not hold", rule, field);
                continue;
            }
            let emitted = self.call_predicate(scope, field, value, rule, predicate, constraint);
            errors.extend(emitted_errors(location, rule, constraint, value, emitted));
        }

        errors.extend(self.check_with(scope, field, value, rules, location)?);
        errors.extend(self.check_relations(scope, rules, location, value));
        errors.extend(self.validate_containers(scope, value, rules, location, empty)?);
        errors.extend(self.validate_combinators(scope, field, value, rules, location)?);
        Ok(errors)
    }

    pub(crate) fn matches_type(&self, name: &str, value: &Value) -> bool {
        if let Some(definition) = self.types.get(name) {
            return definition.matches(value);
        }
        self.rules.type_test(name).is_some_and(|test| test(value))
    }

    fn implied_types_hold(&self, predicate: &PredicateRule, value: &Value) -> bool {
        predicate.implied_types.is_empty()
            || predicate
                .implied_types
                .iter()
                .any(|name| self.matches_type(name, value))
    }

    fn call_predicate(
        &self,
        scope: &Scope<'_>,
        field: &str,
        value: &Value,
        rule: &str,
        predicate: &PredicateRule,
        constraint: &Value,
    ) -> Vec<Emitted> {
        trace!("Dispatching rule '{}' for '{}'", rule, field);
        let call = RuleCall {
            rule,
            field,
            constraint,
            value,
            document: scope.mapping,
            root: scope.root,
            regexes: self.regexes,
        };
        let mut emitter = Emitter::new();
        predicate.call(&call, &mut emitter);
        emitter.into_emitted()
    }

    /// `check_with` names one or more predicates, called without a constraint.
    fn check_with(
        &self,
        scope: &Scope<'_>,
        field: &str,
        value: &Value,
        rules: &RuleSet,
        location: &Location,
    ) -> Result<Vec<ValidationError>, SchemaError> {
        let Some(constraint) = rules.get("check_with") else {
            return Ok(Vec::new());
        };

        let mut errors = Vec::new();
        for name in rules.names("check_with") {
            let predicate =
                self.rules
                    .predicate(&name)
                    .ok_or_else(|| SchemaError::UnknownHandler {
                        kind: "predicate",
                        name: name.clone(),
                        path: vetter_core::format_path(&location.rule_path("check_with")),
                    })?;
            let emitted = self.call_predicate(scope, field, value, &name, predicate, &Value::Null);
            errors.extend(emitted_errors(location, "check_with", constraint, value, emitted));
        }
        Ok(errors)
    }

    /// `dependencies` and `excludes`; both hold for absent-shaped values too.
    fn check_relations(
        &self,
        scope: &Scope<'_>,
        rules: &RuleSet,
        location: &Location,
        value: &Value,
    ) -> Vec<ValidationError> {
        let mut errors = check_dependencies(scope, rules, location, value);
        errors.extend(check_excludes(scope, rules, location, value));
        errors
    }

    fn validate_containers(
        &self,
        scope: &Scope<'_>,
        value: &Value,
        rules: &RuleSet,
        location: &Location,
        empty: bool,
    ) -> Result<Vec<ValidationError>, SchemaError> {
        let mut errors = Vec::new();

        if let Some(constraint) = rules.get("schema") {
            match value {
                Value::Object(mapping) => {
                    errors.extend(self.validate_mapping_schema(
                        scope, mapping, value, constraint, rules, location,
                    )?);
                }
                Value::Array(items) => {
                    errors.extend(self.validate_sequence_schema(
                        scope, items, value, constraint, rules, location,
                    )?);
                }
                _ => {}
            }
        }

        if let (Some(Value::Array(definitions)), Value::Array(items), false) =
            (rules.get("items"), value, empty)
        {
            errors.extend(self.validate_items(scope, items, value, definitions, rules, location)?);
        }

        if let (Some(definition), Value::Object(mapping)) = (rules.get("valuesrules"), value) {
            let member_rules = self.resolver.resolve_rule_set(definition)?;
            let inner = scope.enter(mapping, rules);
            let mut children = Vec::new();
            for (key, member) in mapping {
                let member_location = location.member(
                    PathSegment::from(key.as_str()),
                    [PathSegment::from("valuesrules")],
                );
                children.extend(self.validate_value(
                    &inner,
                    key,
                    member,
                    &member_rules,
                    &member_location,
                )?);
            }
            if !children.is_empty() {
                errors.push(group_error(
                    location,
                    "valuesrules",
                    ErrorCode::Valuesrules,
                    definition,
                    value,
                    children,
                ));
            }
        }

        if let (Some(definition), Value::Object(mapping)) = (rules.get("keysrules"), value) {
            let key_rules = self.resolver.resolve_rule_set(definition)?;
            let inner = scope.enter(mapping, rules);
            let mut children = Vec::new();
            for key in mapping.keys() {
                let key_location = location.member(
                    PathSegment::from(key.as_str()),
                    [PathSegment::from("keysrules")],
                );
                children.extend(self.validate_value(
                    &inner,
                    key,
                    &Value::String(key.clone()),
                    &key_rules,
                    &key_location,
                )?);
            }
            if !children.is_empty() {
                errors.push(group_error(
                    location,
                    "keysrules",
                    ErrorCode::Keysrules,
                    definition,
                    value,
                    children,
                ));
            }
        }

        Ok(errors)
    }

    fn validate_mapping_schema(
        &self,
        scope: &Scope<'_>,
        mapping: &Map,
        value: &Value,
        constraint: &Value,
        rules: &RuleSet,
        location: &Location,
    ) -> Result<Vec<ValidationError>, SchemaError> {
        let Some(schema) = self.mapping_schema(constraint)? else {
            return Ok(vec![bad_type_for_schema(location, constraint, value)]);
        };

        let inner = scope.enter(mapping, rules);
        let children =
            self.validate_mapping(&inner, &schema, &location.rules([PathSegment::from("schema")]))?;
        if children.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![group_error(
            location,
            "schema",
            ErrorCode::MappingSchema,
            constraint,
            value,
            children,
        )])
    }

    fn validate_sequence_schema(
        &self,
        scope: &Scope<'_>,
        items: &[Value],
        value: &Value,
        constraint: &Value,
        rules: &RuleSet,
        location: &Location,
    ) -> Result<Vec<ValidationError>, SchemaError> {
        let Some(item_rules) = self.sequence_rules(constraint)? else {
            return Ok(vec![bad_type_for_schema(location, constraint, value)]);
        };

        let inner = scope.within(rules);
        let mut children = Vec::new();
        for (index, item) in items.iter().enumerate() {
            let item_location =
                location.member(PathSegment::Index(index), [PathSegment::from("schema")]);
            children.extend(self.validate_value(
                &inner,
                &index.to_string(),
                item,
                &item_rules,
                &item_location,
            )?);
        }
        if children.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![group_error(
            location,
            "schema",
            ErrorCode::SequenceSchema,
            constraint,
            value,
            children,
        )])
    }

    fn validate_items(
        &self,
        scope: &Scope<'_>,
        items: &[Value],
        value: &Value,
        definitions: &[Value],
        rules: &RuleSet,
        location: &Location,
    ) -> Result<Vec<ValidationError>, SchemaError> {
        let constraint = Value::Array(definitions.to_vec());
        if definitions.len() != items.len() {
            return Ok(vec![rule_error(location, "items", ErrorCode::ItemsLength)
                .with_constraint(constraint)
                .with_value(value.clone())
                .with_info(vec![
                    Value::from(definitions.len()),
                    Value::from(items.len()),
                ])]);
        }

        let inner = scope.within(rules);
        let mut children = Vec::new();
        for (index, (definition, item)) in definitions.iter().zip(items).enumerate() {
            let item_rules = self.resolver.resolve_rule_set(definition)?;
            let item_location = location.member(
                PathSegment::Index(index),
                [PathSegment::from("items"), PathSegment::Index(index)],
            );
            children.extend(self.validate_value(
                &inner,
                &index.to_string(),
                item,
                &item_rules,
                &item_location,
            )?);
        }
        if children.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![group_error(
            location,
            "items",
            ErrorCode::BadItems,
            &constraint,
            value,
            children,
        )])
    }

    /// The schema a `schema` constraint describes for a mapping value, or
    /// `None` when it describes rules for sequence items instead.
    pub(crate) fn mapping_schema(&self, constraint: &Value) -> Result<Option<Schema>, SchemaError> {
        match constraint {
            Value::String(name) => match self.resolver.schemas().get(name) {
                Some(schema) => Ok(Some(schema)),
                None if self.resolver.rules_sets().contains(name) => Ok(None),
                None => Err(SchemaError::UnknownSchema(name.clone())),
            },
            Value::Object(schema) => {
                let fits = schema.values().all(|definition| match definition {
                    Value::Object(_) => true,
                    Value::String(name) => self.resolver.rules_sets().contains(name),
                    _ => false,
                });
                Ok(fits.then(|| schema.clone()))
            }
            _ => Ok(None),
        }
    }

    /// The rule set a `schema` constraint describes for sequence items, or
    /// `None` when it describes a mapping schema instead.
    pub(crate) fn sequence_rules(
        &self,
        constraint: &Value,
    ) -> Result<Option<RuleSet>, SchemaError> {
        match constraint {
            Value::String(name) => match self.resolver.rules_sets().get(name) {
                Some(rules) => Ok(Some(RuleSet::from(rules))),
                None if self.resolver.schemas().contains(name) => Ok(None),
                None => Err(SchemaError::UnknownRulesSet(name.clone())),
            },
            Value::Object(rules) => {
                let rules = RuleSet::new(rules);
                let fits = rules.rule_names().all(|rule| self.is_known_rule(rule));
                Ok(fits.then_some(rules))
            }
            _ => Ok(None),
        }
    }

    pub(crate) fn is_known_rule(&self, rule: &str) -> bool {
        is_core_rule(rule) || self.rules.predicate(rule).is_some()
    }
}

/// Errors for what a predicate reported; free-form messages become custom
/// errors carrying the message as their only info.
fn emitted_errors(
    location: &Location,
    rule: &str,
    constraint: &Value,
    value: &Value,
    emitted: Vec<Emitted>,
) -> Vec<ValidationError> {
    emitted
        .into_iter()
        .map(|emitted| {
            let (code, info) = match emitted {
                Emitted::Message(message) => (ErrorCode::Custom, vec![Value::String(message)]),
                Emitted::Error { code, info } => (code, info),
            };
            rule_error(location, rule, code)
                .with_constraint(constraint.clone())
                .with_value(value.clone())
                .with_info(info)
        })
        .collect()
}

pub(crate) fn group_error(
    location: &Location,
    rule: &str,
    code: ErrorCode,
    constraint: &Value,
    value: &Value,
    children: Vec<ValidationError>,
) -> ValidationError {
    rule_error(location, rule, code)
        .with_constraint(constraint.clone())
        .with_value(value.clone())
        .with_children(children)
}

fn bad_type_for_schema(location: &Location, constraint: &Value, value: &Value) -> ValidationError {
    rule_error(location, "schema", ErrorCode::BadTypeForSchema)
        .with_constraint(constraint.clone())
        .with_value(value.clone())
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(mapping) => mapping.is_empty(),
        _ => false,
    }
}

fn is_present(mapping: &Map, field: &str) -> bool {
    mapping.get(field).is_some_and(|value| !value.is_null())
}

/// Look up a dotted path; a leading `^` starts from the root document.
fn lookup<'a>(scope: &Scope<'a>, path: &str) -> Option<&'a Value> {
    let (base, path) = match path.strip_prefix('^') {
        Some(rest) => (scope.root, rest),
        None => (scope.mapping, path),
    };
    let mut parts = path.split('.');
    let mut current = base.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

fn check_dependencies(
    scope: &Scope<'_>,
    rules: &RuleSet,
    location: &Location,
    value: &Value,
) -> Vec<ValidationError> {
    let Some(constraint) = rules.get("dependencies") else {
        return Vec::new();
    };
    let error = |code: ErrorCode, info: Vec<Value>| {
        rule_error(location, "dependencies", code)
            .with_constraint(constraint.clone())
            .with_value(value.clone())
            .with_info(info)
    };

    match constraint {
        Value::Object(expected) => {
            let mut failed = Map::new();
            for (path, allowed) in expected {
                let found = lookup(scope, path);
                let satisfied = found.is_some_and(|found| match allowed {
                    Value::Array(allowed) => contains_value(allowed, found),
                    allowed => values_equal(allowed, found),
                });
                if !satisfied {
                    failed.insert(path.clone(), found.cloned().unwrap_or(Value::Null));
                }
            }
            if failed.is_empty() {
                return Vec::new();
            }
            vec![error(
                ErrorCode::DependenciesFieldValue,
                vec![Value::Object(failed)],
            )]
        }
        _ => rules
            .names("dependencies")
            .into_iter()
            .filter(|path| lookup(scope, path).is_none())
            .map(|path| error(ErrorCode::DependenciesField, vec![Value::String(path)]))
            .collect(),
    }
}

fn check_excludes(
    scope: &Scope<'_>,
    rules: &RuleSet,
    location: &Location,
    value: &Value,
) -> Vec<ValidationError> {
    let Some(constraint) = rules.get("excludes") else {
        return Vec::new();
    };
    let excluded = rules.names("excludes");
    if !excluded.iter().any(|field| is_present(scope.mapping, field)) {
        return Vec::new();
    }
    vec![rule_error(location, "excludes", ErrorCode::ExcludesField)
        .with_constraint(constraint.clone())
        .with_value(value.clone())
        .with_info(excluded.into_iter().map(Value::String).collect())]
}
