//! `allof`, `anyof`, `noneof` and `oneof`.
//!
//! Each operand is an independent validation of the same value: it gets its
//! own copy of the rule set, with the parent's `type` and `allow_unknown`
//! filled in, and its own error list.

use serde_json::Value;
use tracing::trace;
use vetter_core::schema::COMBINATORS;
use vetter_core::{ErrorCode, PathSegment, RuleSet, SchemaError, ValidationError};

use crate::context::{Location, Scope};
use crate::engine::{group_error, Engine};

impl Engine<'_> {
    pub(crate) fn validate_combinators(
        &self,
        scope: &Scope<'_>,
        field: &str,
        value: &Value,
        rules: &RuleSet,
        location: &Location,
    ) -> Result<Vec<ValidationError>, SchemaError> {
        let mut errors = Vec::new();

        for op in COMBINATORS {
            let Some(Value::Array(operands)) = rules.get(op) else {
                continue;
            };

            // Normalization never looks inside operands.
            let operand_scope = Scope {
                normalized: false,
                ..scope.clone()
            };
            let mut outcomes = Vec::with_capacity(operands.len());
            for (index, operand) in operands.iter().enumerate() {
                let operand_rules = match operand {
                    Value::Object(operand) => RuleSet::operand(rules, operand),
                    reference => {
                        let resolved = self.resolver.resolve_rule_set(reference)?;
                        RuleSet::operand(rules, resolved.as_map())
                    }
                };
                let operand_location =
                    location.rules([PathSegment::from(op), PathSegment::Index(index)]);
                outcomes.push(self.validate_value(
                    &operand_scope,
                    field,
                    value,
                    &operand_rules,
                    &operand_location,
                )?);
            }

            if let Some((code, children)) = combine(op, outcomes) {
                trace!("'{}' failed for '{}'", op, field);
                let constraint = Value::Array(operands.clone());
                errors.push(group_error(location, op, code, &constraint, value, children));
            }
        }

        Ok(errors)
    }
}

/// Decide a combinator from its operands' error lists. `None` means it
/// holds; otherwise the error code and the child errors to report.
fn combine(
    op: &str,
    outcomes: Vec<Vec<ValidationError>>,
) -> Option<(ErrorCode, Vec<ValidationError>)> {
    let total = outcomes.len();
    let passed = outcomes.iter().filter(|errors| errors.is_empty()).count();
    let all_errors = || outcomes.into_iter().flatten().collect::<Vec<_>>();

    match op {
        "allof" if passed < total => Some((ErrorCode::Allof, all_errors())),
        "anyof" if passed == 0 && total > 0 => Some((ErrorCode::Anyof, all_errors())),
        // With several matches there is no failing operand to point at.
        "oneof" if passed == 0 && total > 0 => Some((ErrorCode::Oneof, all_errors())),
        "oneof" if passed > 1 => Some((ErrorCode::Oneof, Vec::new())),
        "noneof" if passed > 0 => Some((ErrorCode::Noneof, all_errors())),
        _ => None,
    }
}
