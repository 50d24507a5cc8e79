//! Validation error types.
//!
//! A [`ValidationError`] records one violated rule at a location in the
//! document and in the schema. Group errors (nested schemas, sequences,
//! combinators) carry their root causes as `child_errors`; everything else
//! is a leaf. An [`ErrorList`] is the ordered outcome of one validation run.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::codes::ErrorCode;

/// One step of a document or schema path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Index(usize),
    Key(String),
}

impl PathSegment {
    /// The segment as a mapping key, as used by rendered error mappings.
    pub fn as_key(&self) -> String {
        match self {
            PathSegment::Index(index) => index.to_string(),
            PathSegment::Key(key) => key.clone(),
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Index(index) => write!(f, "[{}]", index),
            PathSegment::Key(key) => write!(f, "{}", key),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        PathSegment::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

pub type Path = Vec<PathSegment>;

/// Render a path the way it reads in messages: `a.b[0].c`.
pub fn format_path(path: &[PathSegment]) -> String {
    let mut rendered = String::new();
    for segment in path {
        match segment {
            PathSegment::Index(_) => rendered.push_str(&segment.to_string()),
            PathSegment::Key(key) => {
                if !rendered.is_empty() {
                    rendered.push('.');
                }
                rendered.push_str(key);
            }
        }
    }
    rendered
}

/// A single rule violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    /// Location of the offending field within the validated document.
    pub document_path: Path,

    /// Location of the violated rule within the schema.
    pub schema_path: Path,

    pub code: ErrorCode,

    /// Name of the violated rule, `None` for unknown fields.
    pub rule: Option<String>,

    /// The rule's constraint as declared in the schema.
    pub constraint: Option<Value>,

    /// The offending value, when there is one.
    pub value: Option<Value>,

    /// Auxiliary data; not meaningful for group errors.
    pub info: Vec<Value>,

    /// Root causes of a group error; empty for leaf errors.
    pub child_errors: Vec<ValidationError>,
}

impl ValidationError {
    /// Create a leaf error without rule metadata.
    pub fn new(document_path: Path, schema_path: Path, code: ErrorCode) -> Self {
        Self {
            document_path,
            schema_path,
            code,
            rule: code.rule().map(str::to_string),
            constraint: None,
            value: None,
            info: Vec::new(),
            child_errors: Vec::new(),
        }
    }

    /// Set the violated rule.
    pub fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.rule = Some(rule.into());
        self
    }

    pub fn with_constraint(mut self, constraint: Value) -> Self {
        self.constraint = Some(constraint);
        self
    }

    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_info(mut self, info: Vec<Value>) -> Self {
        self.info = info;
        self
    }

    pub fn with_children(mut self, children: Vec<ValidationError>) -> Self {
        self.child_errors = children;
        self
    }

    pub fn is_group_error(&self) -> bool {
        self.code.is_group()
    }

    pub fn is_logical_error(&self) -> bool {
        self.code.is_logical()
    }

    pub fn is_normalization_error(&self) -> bool {
        self.code.is_normalization()
    }

    /// The field name this error is attached to, if any.
    pub fn field(&self) -> Option<&PathSegment> {
        self.document_path.last()
    }

    /// Depth-first iteration over this error and every nested child.
    pub fn descendants(&self) -> Vec<&ValidationError> {
        let mut stack = vec![self];
        let mut all = Vec::new();
        while let Some(error) = stack.pop() {
            all.push(error);
            stack.extend(error.child_errors.iter().rev());
        }
        all
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let location = format_path(&self.document_path);
        if location.is_empty() {
            write!(f, "{}", self.code)?;
        } else {
            write!(f, "{}: {}", location, self.code)?;
        }

        if let Some(rule) = &self.rule {
            write!(f, " [{}]", rule)?;
        }
        if !self.child_errors.is_empty() {
            write!(f, " ({} child errors)", self.child_errors.len())?;
        }

        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// The ordered top-level errors of one validation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorList {
    errors: Vec<ValidationError>,
}

impl ErrorList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn extend(&mut self, errors: impl IntoIterator<Item = ValidationError>) {
        self.errors.extend(errors);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ValidationError> {
        self.errors.iter()
    }

    pub fn as_slice(&self) -> &[ValidationError] {
        &self.errors
    }

    pub fn into_vec(self) -> Vec<ValidationError> {
        self.errors
    }

    /// Whether an error of this kind occurred anywhere, children included.
    pub fn contains(&self, code: ErrorCode) -> bool {
        self.errors
            .iter()
            .flat_map(|error| error.descendants())
            .any(|error| error.code == code)
    }
}

impl From<Vec<ValidationError>> for ErrorList {
    fn from(errors: Vec<ValidationError>) -> Self {
        Self { errors }
    }
}

impl std::ops::Index<usize> for ErrorList {
    type Output = ValidationError;

    fn index(&self, index: usize) -> &Self::Output {
        &self.errors[index]
    }
}

impl fmt::Display for ErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            write!(f, "No validation errors")
        } else if self.errors.len() == 1 {
            write!(f, "Validation error: {}", self.errors[0])
        } else {
            writeln!(f, "{} validation errors:", self.errors.len())?;
            for (i, error) in self.errors.iter().enumerate() {
                writeln!(f, "  {}. {}", i + 1, error)?;
            }
            Ok(())
        }
    }
}

impl IntoIterator for ErrorList {
    type Item = ValidationError;
    type IntoIter = std::vec::IntoIter<ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl<'a> IntoIterator for &'a ErrorList {
    type Item = &'a ValidationError;
    type IntoIter = std::slice::Iter<'a, ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}
