//! The public validator.

use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, trace};
use vetter_core::{
    DocumentError, ErrorCode, ErrorList, ErrorTree, FingerprintBuilder, Map, Path, Result,
    Schema, SchemaError, TypeDefinition, TypeRegistry,
};
use vetter_registry::{Resolver, RulesSetRegistry, SchemaRegistry};

use crate::config::{AllowUnknown, ValidatorConfig};
use crate::context::{Location, Scope, Settings};
use crate::engine::Engine;
use crate::handler::{BasicErrorHandler, ErrorHandler};
use crate::rules::{RegexCache, RuleHandler, RuleRegistry};
use crate::schema_check::SchemaCache;

/// Validates and normalizes documents against a schema.
///
/// A validator is immutable during a run, so one instance can serve many
/// documents, from several threads if need be. Registries are shared
/// handles: definitions added after the validator was built are visible to
/// it.
#[derive(Debug)]
pub struct Validator {
    schema: Option<Value>,
    config: ValidatorConfig,
    types: TypeRegistry,
    rules: RuleRegistry,
    resolver: Resolver,
    regexes: RegexCache,
    checked: SchemaCache,
}

#[derive(Debug, Default)]
pub struct ValidatorBuilder {
    schema: Option<Value>,
    config: ValidatorConfig,
    schemas: Option<SchemaRegistry>,
    rules_sets: Option<RulesSetRegistry>,
    types: TypeRegistry,
    rules: RuleRegistry,
}

impl ValidatorBuilder {
    /// A schema literal, or the name of a registered schema.
    pub fn schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn config(mut self, config: ValidatorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn allow_unknown(mut self, allow_unknown: impl Into<AllowUnknown>) -> Self {
        self.config.allow_unknown = allow_unknown.into();
        self
    }

    pub fn purge_unknown(mut self, purge: bool) -> Self {
        self.config.purge_unknown = purge;
        self
    }

    pub fn purge_readonly(mut self, purge: bool) -> Self {
        self.config.purge_readonly = purge;
        self
    }

    pub fn require_all(mut self, require_all: bool) -> Self {
        self.config.require_all = require_all;
        self
    }

    pub fn ignore_none_values(mut self, ignore: bool) -> Self {
        self.config.ignore_none_values = ignore;
        self
    }

    pub fn normalize(mut self, normalize: bool) -> Self {
        self.config.normalize = normalize;
        self
    }

    /// Share a schema registry instead of using a private one.
    pub fn schema_registry(mut self, registry: SchemaRegistry) -> Self {
        self.schemas = Some(registry);
        self
    }

    /// Share a rules-set registry instead of using a private one.
    pub fn rules_set_registry(mut self, registry: RulesSetRegistry) -> Self {
        self.rules_sets = Some(registry);
        self
    }

    pub fn type_definition(mut self, definition: TypeDefinition) -> Self {
        self.types.insert(definition);
        self
    }

    /// Register a handler; built-in rules of the same name are replaced.
    pub fn rule(mut self, name: impl Into<String>, handler: impl Into<RuleHandler>) -> Self {
        self.rules.insert(name, handler);
        self
    }

    /// Build the validator, checking the schema if one was given.
    pub fn build(self) -> Result<Validator> {
        let validator = Validator {
            schema: self.schema,
            config: self.config,
            types: self.types,
            rules: self.rules,
            resolver: Resolver::new(
                self.schemas.unwrap_or_default(),
                self.rules_sets.unwrap_or_default(),
            ),
            regexes: RegexCache::default(),
            checked: SchemaCache::default(),
        };
        if let Some(schema) = &validator.schema {
            validator.check_schema(schema)?;
        }
        Ok(validator)
    }
}

impl Validator {
    pub fn builder() -> ValidatorBuilder {
        ValidatorBuilder::default()
    }

    /// A validator with default settings and private registries.
    pub fn new(schema: Value) -> Result<Self> {
        Self::builder().schema(schema).build()
    }

    pub fn schema(&self) -> Option<&Value> {
        self.schema.as_ref()
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    pub fn schema_registry(&self) -> &SchemaRegistry {
        self.resolver.schemas()
    }

    pub fn rules_set_registry(&self) -> &RulesSetRegistry {
        self.resolver.rules_sets()
    }

    /// Replace the schema. The new schema is checked right away.
    pub fn set_schema(&mut self, schema: Value) -> Result<()> {
        self.checked.clear();
        self.check_schema(&schema)?;
        self.schema = Some(schema);
        Ok(())
    }

    /// Forget which schemas passed the check and every compiled pattern.
    pub fn clear_caches(&self) {
        self.checked.clear();
        self.regexes.clear();
    }

    /// Number of schema checks currently remembered.
    pub fn cached_schema_count(&self) -> usize {
        self.checked.len()
    }

    /// Normalize (unless disabled) and validate a document.
    pub fn validate(&self, document: &Value) -> Result<Validation> {
        self.run(document, self.current_schema()?, false)
    }

    /// Validate against a schema other than the validator's own.
    pub fn validate_with(&self, document: &Value, schema: &Value) -> Result<Validation> {
        self.run(document, schema, false)
    }

    /// Validate a partial document: missing required fields are fine and
    /// no defaults are filled.
    pub fn validate_update(&self, document: &Value) -> Result<Validation> {
        self.run(document, self.current_schema()?, true)
    }

    /// The normalized document if it is valid.
    pub fn validated(&self, document: &Value) -> Result<Option<Value>> {
        let validation = self.validate(document)?;
        Ok(validation.is_valid().then(|| validation.into_document()))
    }

    /// Run only the normalization pass.
    pub fn normalized(&self, document: &Value) -> Result<Normalization> {
        let schema = self.current_schema()?;
        let mapping = check_document(document)?;
        let resolved = self.prepare(schema)?;
        let settings = Settings::root(&self.config, false);

        debug!("Normalizing document with {} fields", mapping.len());
        let (normalized, errors) = self.engine().normalize_document(mapping, &resolved, &settings)?;
        debug!("Normalization finished with {} errors", errors.len());

        Ok(Normalization {
            document: Value::Object(normalized),
            errors: ErrorList::from(errors),
        })
    }

    fn run(&self, document: &Value, schema: &Value, update: bool) -> Result<Validation> {
        let mapping = check_document(document)?;
        let resolved = self.prepare(schema)?;
        let engine = self.engine();
        let settings = Settings::root(&self.config, update);

        debug!(
            "Validating document with {} fields against {} schema fields",
            mapping.len(),
            resolved.len()
        );

        let (normalized, mut errors) = if self.config.normalize {
            engine.normalize_document(mapping, &resolved, &settings)?
        } else {
            (mapping.clone(), Vec::new())
        };
        let flagged_readonly: HashSet<Path> = errors
            .iter()
            .filter(|error| error.code == ErrorCode::ReadonlyField)
            .map(|error| error.document_path.clone())
            .collect();

        let scope = Scope {
            root: &normalized,
            mapping: &normalized,
            settings,
            flagged_readonly: &flagged_readonly,
            normalized: self.config.normalize,
        };
        errors.extend(engine.validate_mapping(&scope, &resolved, &Location::default())?);

        debug!("Validation finished with {} errors", errors.len());
        Ok(Validation {
            document: Value::Object(normalized),
            errors: ErrorList::from(errors),
        })
    }

    fn current_schema(&self) -> Result<&Value> {
        self.schema
            .as_ref()
            .ok_or_else(|| SchemaError::MissingSchema.into())
    }

    /// Check a schema (once per fingerprint) and resolve it to a literal.
    fn prepare(&self, schema: &Value) -> Result<Schema> {
        self.check_schema(schema)?;
        Ok(self.resolver.resolve_schema(schema)?)
    }

    fn check_schema(&self, schema: &Value) -> Result<(), SchemaError> {
        let mut builder = FingerprintBuilder::new();
        builder.add_value(schema);
        self.resolver.add_generations(&mut builder);
        let fingerprint = builder.build();

        if self.checked.contains(&fingerprint.combined_hash) {
            trace!("Schema {} already checked", fingerprint.short());
            return Ok(());
        }
        self.engine().check_schema(schema)?;
        debug!("Schema {} checked", fingerprint.short());
        self.checked.insert(fingerprint.combined_hash);
        Ok(())
    }

    fn engine(&self) -> Engine<'_> {
        Engine {
            types: &self.types,
            rules: &self.rules,
            resolver: &self.resolver,
            regexes: &self.regexes,
        }
    }
}

fn check_document(document: &Value) -> Result<&Map, DocumentError> {
    match document {
        Value::Null => Err(DocumentError::Missing),
        Value::Object(mapping) => Ok(mapping),
        other => Err(DocumentError::WrongFormat(other.to_string())),
    }
}

/// Outcome of [`Validator::validate`].
#[derive(Debug, Clone, PartialEq)]
pub struct Validation {
    document: Value,
    errors: ErrorList,
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &ErrorList {
        &self.errors
    }

    /// The document after normalization.
    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn into_document(self) -> Value {
        self.document
    }

    pub fn document_error_tree(&self) -> ErrorTree<'_> {
        ErrorTree::by_document(&self.errors)
    }

    pub fn schema_error_tree(&self) -> ErrorTree<'_> {
        ErrorTree::by_schema(&self.errors)
    }

    /// Errors rendered by [`BasicErrorHandler`].
    pub fn messages(&self) -> Value {
        self.messages_with(&BasicErrorHandler)
    }

    pub fn messages_with(&self, handler: &dyn ErrorHandler) -> Value {
        handler.render(&self.errors)
    }
}

/// Outcome of [`Validator::normalized`].
#[derive(Debug, Clone, PartialEq)]
pub struct Normalization {
    pub document: Value,
    pub errors: ErrorList,
}

impl Normalization {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}
