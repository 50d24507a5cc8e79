//! Reference resolution.

use serde_json::Value;
use tracing::trace;
use vetter_core::{FingerprintBuilder, RuleSet, Schema, SchemaError};

use crate::store::{RulesSetRegistry, SchemaRegistry};

/// Turns schema and rule-set references into literal mappings.
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    schemas: SchemaRegistry,
    rules_sets: RulesSetRegistry,
}

impl Resolver {
    pub fn new(schemas: SchemaRegistry, rules_sets: RulesSetRegistry) -> Self {
        Self {
            schemas,
            rules_sets,
        }
    }

    pub fn schemas(&self) -> &SchemaRegistry {
        &self.schemas
    }

    pub fn rules_sets(&self) -> &RulesSetRegistry {
        &self.rules_sets
    }

    /// A literal schema, or the registered schema a string names.
    pub fn resolve_schema(&self, definition: &Value) -> Result<Schema, SchemaError> {
        match definition {
            Value::Object(schema) => Ok(schema.clone()),
            Value::String(name) => {
                trace!("Resolving schema reference '{}'", name);
                self.schemas
                    .get(name)
                    .ok_or_else(|| SchemaError::UnknownSchema(name.clone()))
            }
            other => Err(SchemaError::NotAMapping(other.to_string())),
        }
    }

    /// A literal rule set, or the registered rule set a string names.
    pub fn resolve_rule_set(&self, definition: &Value) -> Result<RuleSet, SchemaError> {
        match definition {
            Value::Object(rules) => Ok(RuleSet::new(rules)),
            Value::String(name) => {
                trace!("Resolving rules set reference '{}'", name);
                self.rules_sets
                    .get(name)
                    .map(RuleSet::from)
                    .ok_or_else(|| SchemaError::UnknownRulesSet(name.clone()))
            }
            other => Err(SchemaError::NotARulesSet(other.to_string())),
        }
    }

    /// Record both registries' generations in a fingerprint, so cached
    /// results go stale when either registry changes.
    pub fn add_generations(&self, builder: &mut FingerprintBuilder) {
        builder
            .add_metadata("schema_registry", self.schemas.generation())
            .add_metadata("rules_set_registry", self.rules_sets.generation());
    }
}
