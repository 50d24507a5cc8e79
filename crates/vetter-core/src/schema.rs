//! Rule sets and schemas.
//!
//! A schema maps field names to rule sets; a rule set maps rule names to
//! constraints. Either may also be a string naming a registry entry, which
//! the resolver turns into a literal mapping.

use serde_json::Value;

pub type Map = serde_json::Map<String, Value>;

/// A schema in literal form: field name to rule set (or rule-set reference).
pub type Schema = Map;

pub const COMBINATORS: [&str; 4] = ["allof", "anyof", "noneof", "oneof"];

/// Rules interpreted by the engine itself. Any other name must be registered
/// as a predicate rule.
pub const CORE_RULES: &[&str] = &[
    "allof",
    "allow_unknown",
    "anyof",
    "check_with",
    "coerce",
    "default",
    "default_setter",
    "dependencies",
    "empty",
    "excludes",
    "items",
    "keysrules",
    "meta",
    "noneof",
    "nullable",
    "oneof",
    "purge_unknown",
    "readonly",
    "rename",
    "rename_handler",
    "require_all",
    "required",
    "schema",
    "type",
    "valuesrules",
];

/// Rules that only affect normalization or scoping; validation never
/// dispatches them.
pub const NORMALIZATION_RULES: &[&str] = &[
    "allow_unknown",
    "coerce",
    "default",
    "default_setter",
    "meta",
    "purge_unknown",
    "rename",
    "rename_handler",
    "require_all",
];

pub fn is_core_rule(rule: &str) -> bool {
    CORE_RULES.contains(&rule)
}

/// Split `anyof_type` into `("anyof", "type")`.
pub fn split_of_rule(rule: &str) -> Option<(&'static str, &str)> {
    COMBINATORS.iter().find_map(|op| {
        rule.strip_prefix(op)
            .and_then(|rest| rest.strip_prefix('_'))
            .filter(|inner| !inner.is_empty())
            .map(|inner| (*op, inner))
    })
}

/// Expand `<op>_<rule>: [c0, c1]` shorthands into `<op>: [{<rule>: c0}, {<rule>: c1}]`.
///
/// Operands from a shorthand are appended after any operands the rule set
/// already lists under `<op>`. Values that are not lists are left alone so
/// the schema check can reject them.
pub fn expand_of_rules(rules: &Map) -> Map {
    let mut expanded = Map::new();
    let mut extra: Vec<(&'static str, Vec<Value>)> = Vec::new();

    for (rule, constraint) in rules {
        match (split_of_rule(rule), constraint) {
            (Some((op, inner)), Value::Array(constraints)) => {
                let operands = constraints
                    .iter()
                    .map(|c| {
                        let mut operand = Map::new();
                        operand.insert(inner.to_string(), c.clone());
                        Value::Object(operand)
                    })
                    .collect();
                extra.push((op, operands));
            }
            _ => {
                expanded.insert(rule.clone(), constraint.clone());
            }
        }
    }

    for (op, operands) in extra {
        match expanded.get_mut(op) {
            Some(Value::Array(existing)) => existing.extend(operands),
            _ => {
                expanded.insert(op.to_string(), Value::Array(operands));
            }
        }
    }

    expanded
}

/// The constraints applying to one field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    rules: Map,
}

impl RuleSet {
    /// Wrap a literal mapping, expanding `*of_*` shorthands.
    pub fn new(rules: &Map) -> Self {
        Self {
            rules: expand_of_rules(rules),
        }
    }

    /// Wrap a mapping value; `None` for anything else.
    pub fn from_value(value: &Value) -> Option<Self> {
        value.as_object().map(Self::new)
    }

    pub fn get(&self, rule: &str) -> Option<&Value> {
        self.rules.get(rule)
    }

    pub fn contains(&self, rule: &str) -> bool {
        self.rules.contains_key(rule)
    }

    /// A boolean rule; `None` if absent or not a boolean.
    pub fn flag(&self, rule: &str) -> Option<bool> {
        self.rules.get(rule).and_then(Value::as_bool)
    }

    pub fn is_nullable(&self) -> bool {
        self.flag("nullable").unwrap_or(false)
    }

    pub fn is_readonly(&self) -> bool {
        self.flag("readonly").unwrap_or(false)
    }

    /// Declared type names; a single name or a list of names.
    pub fn type_names(&self) -> Vec<String> {
        self.names("type")
    }

    /// A rule whose constraint is one name or an ordered list of names.
    pub fn names(&self, rule: &str) -> Vec<String> {
        match self.rules.get(rule) {
            Some(Value::String(name)) => vec![name.clone()],
            Some(Value::Array(names)) => names
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn insert(&mut self, rule: impl Into<String>, constraint: Value) {
        self.rules.insert(rule.into(), constraint);
    }

    pub fn remove(&mut self, rule: &str) -> Option<Value> {
        self.rules.remove(rule)
    }

    pub fn iter(&self) -> serde_json::map::Iter<'_> {
        self.rules.iter()
    }

    pub fn rule_names(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    pub fn as_map(&self) -> &Map {
        &self.rules
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.rules.clone())
    }

    /// A combinator operand as evaluated: the operand's own rules plus the
    /// parent's `type` and `allow_unknown` where the operand lacks them.
    pub fn operand(parent: &RuleSet, operand: &Map) -> RuleSet {
        let mut rules = RuleSet::new(operand);
        for inherited in ["type", "allow_unknown"] {
            if !rules.contains(inherited) {
                if let Some(constraint) = parent.get(inherited) {
                    rules.insert(inherited, constraint.clone());
                }
            }
        }
        rules
    }
}

impl From<Map> for RuleSet {
    fn from(rules: Map) -> Self {
        Self::new(&rules)
    }
}
