//! Evaluation context threaded through every recursive call.
//!
//! Nothing here is mutated during a run: nested calls build a new context
//! from the enclosing one, so sibling branches never see each other's state.

use std::collections::HashSet;
use vetter_core::{Map, Path, PathSegment, RuleSet};

use crate::config::{AllowUnknown, ValidatorConfig};

/// Settings of one mapping scope.
#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub allow_unknown: AllowUnknown,
    pub purge_unknown: bool,
    pub purge_readonly: bool,
    pub require_all: bool,
    pub ignore_none_values: bool,
    pub update: bool,
}

impl Settings {
    pub fn root(config: &ValidatorConfig, update: bool) -> Self {
        Self {
            allow_unknown: config.allow_unknown.clone(),
            purge_unknown: config.purge_unknown,
            purge_readonly: config.purge_readonly,
            require_all: config.require_all,
            ignore_none_values: config.ignore_none_values,
            update,
        }
    }

    /// Settings for the values nested under a field with these rules.
    pub fn nested(&self, rules: &RuleSet) -> Self {
        Self {
            allow_unknown: rules
                .get("allow_unknown")
                .map(AllowUnknown::from_constraint)
                .unwrap_or_else(|| self.allow_unknown.clone()),
            purge_unknown: rules.flag("purge_unknown").unwrap_or(self.purge_unknown),
            require_all: rules.flag("require_all").unwrap_or(self.require_all),
            ..self.clone()
        }
    }
}

/// Where a value or mapping sits: its document path and the schema path of
/// the rules governing it.
#[derive(Debug, Clone, Default)]
pub(crate) struct Location {
    pub document_path: Path,
    pub schema_path: Path,
}

impl Location {
    pub fn new(document_path: Path, schema_path: Path) -> Self {
        Self {
            document_path,
            schema_path,
        }
    }

    /// A field of the mapping at this location.
    pub fn field(&self, field: &str) -> Self {
        Self {
            document_path: join(&self.document_path, [PathSegment::from(field)]),
            schema_path: join(&self.schema_path, [PathSegment::from(field)]),
        }
    }

    /// Same value, rules found under `segments` of the current rule set.
    pub fn rules<I>(&self, segments: I) -> Self
    where
        I: IntoIterator<Item = PathSegment>,
    {
        Self {
            document_path: self.document_path.clone(),
            schema_path: join(&self.schema_path, segments),
        }
    }

    /// A member of the container at this location, governed by the rules
    /// found under `segments`.
    pub fn member<I>(&self, member: PathSegment, segments: I) -> Self
    where
        I: IntoIterator<Item = PathSegment>,
    {
        Self {
            document_path: join(&self.document_path, [member]),
            schema_path: join(&self.schema_path, segments),
        }
    }

    /// Schema path of a rule of the current rule set.
    pub fn rule_path(&self, rule: &str) -> Path {
        join(&self.schema_path, [PathSegment::from(rule)])
    }
}

pub(crate) fn join<I>(path: &[PathSegment], segments: I) -> Path
where
    I: IntoIterator<Item = PathSegment>,
{
    let mut joined = path.to_vec();
    joined.extend(segments);
    joined
}

/// Read-only state for one validation pass.
#[derive(Debug, Clone)]
pub(crate) struct Scope<'a> {
    /// The document handed to the validator.
    pub root: &'a Map,
    /// The mapping the current field belongs to.
    pub mapping: &'a Map,
    pub settings: Settings,
    /// Document paths whose read-only violation the normalization pass
    /// already reported.
    pub flagged_readonly: &'a HashSet<Path>,
    /// Whether the document went through normalization.
    pub normalized: bool,
}

impl<'a> Scope<'a> {
    /// Scope for the mapping nested under a field with these rules.
    pub fn enter<'b>(&self, mapping: &'b Map, rules: &RuleSet) -> Scope<'b>
    where
        'a: 'b,
    {
        Scope {
            root: self.root,
            mapping,
            settings: self.settings.nested(rules),
            flagged_readonly: self.flagged_readonly,
            normalized: self.normalized,
        }
    }

    /// Same mapping, settings adjusted for a field's nested values.
    pub fn within(&self, rules: &RuleSet) -> Scope<'a> {
        Scope {
            settings: self.settings.nested(rules),
            ..self.clone()
        }
    }
}
