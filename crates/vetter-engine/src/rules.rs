//! Rule handlers and the built-in leaf rules.
//!
//! Schemas refer to handlers by name. A [`RuleRegistry`] maps each name to
//! one of four kinds of handler: predicates report violations of a rule,
//! type tests back custom type names, transforms serve `coerce` and
//! `rename_handler`, and default setters compute `default_setter` values.

use regex::Regex;
use serde_json::{Number, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use vetter_core::{ErrorCode, Map};

/// Failure reported by a transform or default setter.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

pub type PredicateFn = Arc<dyn Fn(&RuleCall<'_>, &mut Emitter) + Send + Sync>;
pub type TypeTestFn = Arc<dyn Fn(&Value) -> bool + Send + Sync>;
pub type TransformFn = Arc<dyn Fn(&Value) -> Result<Value, HandlerError> + Send + Sync>;
pub type SetterFn = Arc<dyn Fn(&Map) -> Result<Value, HandlerError> + Send + Sync>;

/// Checks a constraint while the schema is checked; `Err` carries the reason.
pub type ConstraintCheck = fn(&Value) -> Result<(), String>;

/// The arguments of one predicate invocation.
pub struct RuleCall<'a> {
    /// Name under which the rule was dispatched.
    pub rule: &'a str,
    pub field: &'a str,
    pub constraint: &'a Value,
    pub value: &'a Value,
    /// The mapping the field belongs to.
    pub document: &'a Map,
    /// The whole document under validation.
    pub root: &'a Map,
    pub(crate) regexes: &'a RegexCache,
}

impl RuleCall<'_> {
    /// A compiled, fully anchored pattern from the validator's cache.
    pub fn regex(&self, pattern: &str) -> Result<Arc<Regex>, regex::Error> {
        self.regexes.get(pattern)
    }
}

/// A violation reported by a predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Emitted {
    /// A free-form message; recorded as a custom error.
    Message(String),
    /// A standard error kind with its auxiliary info.
    Error { code: ErrorCode, info: Vec<Value> },
}

/// Collects the violations a predicate reports.
#[derive(Debug, Default)]
pub struct Emitter {
    emitted: Vec<Emitted>,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.emitted.push(Emitted::Message(message.into()));
    }

    pub fn error_code(&mut self, code: ErrorCode, info: Vec<Value>) {
        self.emitted.push(Emitted::Error { code, info });
    }

    pub fn is_empty(&self) -> bool {
        self.emitted.is_empty()
    }

    pub fn into_emitted(self) -> Vec<Emitted> {
        self.emitted
    }
}

/// A rule that inspects a value and reports violations.
#[derive(Clone)]
pub struct PredicateRule {
    /// Type names of which the value must match one for the rule to run.
    pub implied_types: Vec<String>,
    pub check_constraint: Option<ConstraintCheck>,
    func: PredicateFn,
}

impl PredicateRule {
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&RuleCall<'_>, &mut Emitter) + Send + Sync + 'static,
    {
        Self {
            implied_types: Vec::new(),
            check_constraint: None,
            func: Arc::new(func),
        }
    }

    pub fn with_implied_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.implied_types = types.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_constraint_check(mut self, check: ConstraintCheck) -> Self {
        self.check_constraint = Some(check);
        self
    }

    pub fn call(&self, call: &RuleCall<'_>, emitter: &mut Emitter) {
        (self.func)(call, emitter)
    }
}

/// Computes a field's default from the mapping it belongs to.
#[derive(Clone)]
pub struct DefaultSetter {
    /// Sibling fields the setter reads; they are filled first.
    pub reads: Vec<String>,
    func: SetterFn,
}

impl DefaultSetter {
    pub fn call(&self, document: &Map) -> Result<Value, HandlerError> {
        (self.func)(document)
    }
}

#[derive(Clone)]
pub enum RuleHandler {
    Predicate(PredicateRule),
    TypeTest(TypeTestFn),
    Transform(TransformFn),
    DefaultSetter(DefaultSetter),
}

impl RuleHandler {
    pub fn predicate<F>(func: F) -> Self
    where
        F: Fn(&RuleCall<'_>, &mut Emitter) + Send + Sync + 'static,
    {
        RuleHandler::Predicate(PredicateRule::new(func))
    }

    pub fn type_test<F>(func: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        RuleHandler::TypeTest(Arc::new(func))
    }

    pub fn transform<F>(func: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, HandlerError> + Send + Sync + 'static,
    {
        RuleHandler::Transform(Arc::new(func))
    }

    pub fn default_setter<I, S, F>(reads: I, func: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&Map) -> Result<Value, HandlerError> + Send + Sync + 'static,
    {
        RuleHandler::DefaultSetter(DefaultSetter {
            reads: reads.into_iter().map(Into::into).collect(),
            func: Arc::new(func),
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RuleHandler::Predicate(_) => "predicate",
            RuleHandler::TypeTest(_) => "type test",
            RuleHandler::Transform(_) => "transform",
            RuleHandler::DefaultSetter(_) => "default setter",
        }
    }
}

impl From<PredicateRule> for RuleHandler {
    fn from(rule: PredicateRule) -> Self {
        RuleHandler::Predicate(rule)
    }
}

impl fmt::Debug for RuleHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleHandler::Predicate(rule) => f
                .debug_struct("Predicate")
                .field("implied_types", &rule.implied_types)
                .finish_non_exhaustive(),
            RuleHandler::DefaultSetter(setter) => f
                .debug_struct("DefaultSetter")
                .field("reads", &setter.reads)
                .finish_non_exhaustive(),
            other => write!(f, "{}", other.kind()),
        }
    }
}

/// Compiled patterns of the `regex` rule, shared by all runs of a validator.
#[derive(Debug, Default)]
pub struct RegexCache {
    compiled: Mutex<HashMap<String, Arc<Regex>>>,
}

impl RegexCache {
    pub fn get(&self, pattern: &str) -> Result<Arc<Regex>, regex::Error> {
        let mut compiled = self.compiled.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(regex) = compiled.get(pattern) {
            return Ok(Arc::clone(regex));
        }
        let regex = Arc::new(Regex::new(&anchored(pattern))?);
        compiled.insert(pattern.to_string(), Arc::clone(&regex));
        Ok(regex)
    }

    pub fn len(&self) -> usize {
        self.compiled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.compiled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

// Patterns must match the whole string.
fn anchored(pattern: &str) -> String {
    format!("^(?:{})$", pattern)
}

/// Handlers available to a validator, by name.
#[derive(Debug, Clone)]
pub struct RuleRegistry {
    handlers: HashMap<String, RuleHandler>,
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl RuleRegistry {
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// The built-in leaf rules.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.insert(
            "allowed",
            PredicateRule::new(rule_allowed).with_constraint_check(expect_list),
        );
        registry.insert(
            "forbidden",
            PredicateRule::new(rule_forbidden).with_constraint_check(expect_list),
        );
        registry.insert(
            "contains",
            PredicateRule::new(rule_contains).with_implied_types(["list"]),
        );
        registry.insert(
            "min",
            PredicateRule::new(rule_min).with_constraint_check(expect_comparable),
        );
        registry.insert(
            "max",
            PredicateRule::new(rule_max).with_constraint_check(expect_comparable),
        );
        registry.insert(
            "minlength",
            PredicateRule::new(rule_minlength)
                .with_implied_types(["string", "list", "dict"])
                .with_constraint_check(expect_length),
        );
        registry.insert(
            "maxlength",
            PredicateRule::new(rule_maxlength)
                .with_implied_types(["string", "list", "dict"])
                .with_constraint_check(expect_length),
        );
        registry.insert(
            "regex",
            PredicateRule::new(rule_regex)
                .with_implied_types(["string"])
                .with_constraint_check(expect_pattern),
        );
        registry
    }

    pub fn insert(&mut self, name: impl Into<String>, handler: impl Into<RuleHandler>) {
        self.handlers.insert(name.into(), handler.into());
    }

    pub fn get(&self, name: &str) -> Option<&RuleHandler> {
        self.handlers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn predicate(&self, name: &str) -> Option<&PredicateRule> {
        match self.handlers.get(name) {
            Some(RuleHandler::Predicate(rule)) => Some(rule),
            _ => None,
        }
    }

    pub fn type_test(&self, name: &str) -> Option<&TypeTestFn> {
        match self.handlers.get(name) {
            Some(RuleHandler::TypeTest(test)) => Some(test),
            _ => None,
        }
    }

    pub fn transform(&self, name: &str) -> Option<&TransformFn> {
        match self.handlers.get(name) {
            Some(RuleHandler::Transform(transform)) => Some(transform),
            _ => None,
        }
    }

    pub fn default_setter(&self, name: &str) -> Option<&DefaultSetter> {
        match self.handlers.get(name) {
            Some(RuleHandler::DefaultSetter(setter)) => Some(setter),
            _ => None,
        }
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Equality that treats `1` and `1.0` as the same value.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y) == Some(Ordering::Equal),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| values_equal(a, b))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(key, a)| y.get(key).is_some_and(|b| values_equal(a, b)))
        }
        _ => a == b,
    }
}

pub(crate) fn contains_value(haystack: &[Value], needle: &Value) -> bool {
    haystack.iter().any(|candidate| values_equal(candidate, needle))
}

/// Order numbers with numbers and strings with strings; anything else is
/// incomparable.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn compare_numbers(x: &Number, y: &Number) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (x.as_i64(), y.as_i64()) {
        return Some(a.cmp(&b));
    }
    if let (Some(a), Some(b)) = (x.as_u64(), y.as_u64()) {
        return Some(a.cmp(&b));
    }
    x.as_f64()?.partial_cmp(&y.as_f64()?)
}

/// Length of a string (in characters), sequence or mapping.
pub(crate) fn value_len(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        Value::Object(map) => Some(map.len()),
        _ => None,
    }
}

fn as_list(constraint: &Value) -> Vec<Value> {
    match constraint {
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    }
}

fn rule_allowed(call: &RuleCall<'_>, emitter: &mut Emitter) {
    let allowed = as_list(call.constraint);
    match call.value {
        Value::Array(items) => {
            let unallowed: Vec<Value> = items
                .iter()
                .filter(|item| !contains_value(&allowed, item))
                .cloned()
                .collect();
            if !unallowed.is_empty() {
                emitter.error_code(ErrorCode::UnallowedValues, vec![Value::Array(unallowed)]);
            }
        }
        value => {
            if !contains_value(&allowed, value) {
                emitter.error_code(ErrorCode::UnallowedValue, vec![value.clone()]);
            }
        }
    }
}

fn rule_forbidden(call: &RuleCall<'_>, emitter: &mut Emitter) {
    let forbidden = as_list(call.constraint);
    match call.value {
        Value::Array(items) => {
            let found: Vec<Value> = items
                .iter()
                .filter(|item| contains_value(&forbidden, item))
                .cloned()
                .collect();
            if !found.is_empty() {
                emitter.error_code(ErrorCode::ForbiddenValues, vec![Value::Array(found)]);
            }
        }
        value => {
            if contains_value(&forbidden, value) {
                emitter.error_code(ErrorCode::ForbiddenValue, vec![value.clone()]);
            }
        }
    }
}

fn rule_contains(call: &RuleCall<'_>, emitter: &mut Emitter) {
    let Value::Array(items) = call.value else {
        return;
    };
    let missing: Vec<Value> = as_list(call.constraint)
        .into_iter()
        .filter(|member| !contains_value(items, member))
        .collect();
    if !missing.is_empty() {
        emitter.error_code(ErrorCode::MissingMembers, vec![Value::Array(missing)]);
    }
}

fn rule_min(call: &RuleCall<'_>, emitter: &mut Emitter) {
    if compare_values(call.value, call.constraint) == Some(Ordering::Less) {
        emitter.error_code(ErrorCode::MinValue, Vec::new());
    }
}

fn rule_max(call: &RuleCall<'_>, emitter: &mut Emitter) {
    if compare_values(call.value, call.constraint) == Some(Ordering::Greater) {
        emitter.error_code(ErrorCode::MaxValue, Vec::new());
    }
}

fn rule_minlength(call: &RuleCall<'_>, emitter: &mut Emitter) {
    if let (Some(len), Some(min)) = (value_len(call.value), call.constraint.as_u64()) {
        if (len as u64) < min {
            emitter.error_code(ErrorCode::MinLength, vec![Value::from(len)]);
        }
    }
}

fn rule_maxlength(call: &RuleCall<'_>, emitter: &mut Emitter) {
    if let (Some(len), Some(max)) = (value_len(call.value), call.constraint.as_u64()) {
        if (len as u64) > max {
            emitter.error_code(ErrorCode::MaxLength, vec![Value::from(len)]);
        }
    }
}

fn rule_regex(call: &RuleCall<'_>, emitter: &mut Emitter) {
    let (Value::String(text), Some(pattern)) = (call.value, call.constraint.as_str()) else {
        return;
    };
    // Invalid patterns never get past the schema check.
    if let Ok(regex) = call.regex(pattern) {
        if !regex.is_match(text) {
            emitter.error_code(ErrorCode::RegexMismatch, Vec::new());
        }
    }
}

fn expect_list(constraint: &Value) -> Result<(), String> {
    if constraint.is_array() {
        Ok(())
    } else {
        Err("must be a list".to_string())
    }
}

fn expect_comparable(constraint: &Value) -> Result<(), String> {
    match constraint {
        Value::Number(_) | Value::String(_) => Ok(()),
        _ => Err("must be a number or a string".to_string()),
    }
}

fn expect_length(constraint: &Value) -> Result<(), String> {
    if constraint.is_u64() {
        Ok(())
    } else {
        Err("must be a non-negative integer".to_string())
    }
}

fn expect_pattern(constraint: &Value) -> Result<(), String> {
    let pattern = constraint.as_str().ok_or("must be a string")?;
    Regex::new(&anchored(pattern))
        .map(|_| ())
        .map_err(|err| err.to_string())
}
