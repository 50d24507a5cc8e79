//! Read-only projections of an [`ErrorList`] keyed by path.
//!
//! The document tree indexes errors by `document_path`, the schema tree by
//! `schema_path`. Group errors and all of their descendants are indexed, so
//! a lookup at a nested location finds the root causes too.

use std::collections::BTreeMap;

use crate::codes::ErrorCode;
use crate::errors::{ErrorList, PathSegment, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TreeKind {
    Document,
    Schema,
}

/// A node of an error tree.
#[derive(Debug, Default)]
pub struct ErrorTreeNode<'a> {
    errors: Vec<&'a ValidationError>,
    descendants: BTreeMap<PathSegment, ErrorTreeNode<'a>>,
}

impl<'a> ErrorTreeNode<'a> {
    /// Errors recorded exactly at this node.
    pub fn errors(&self) -> &[&'a ValidationError] {
        &self.errors
    }

    pub fn descendants(&self) -> &BTreeMap<PathSegment, ErrorTreeNode<'a>> {
        &self.descendants
    }

    pub fn get(&self, segment: impl Into<PathSegment>) -> Option<&ErrorTreeNode<'a>> {
        self.descendants.get(&segment.into())
    }

    pub fn contains(&self, code: ErrorCode) -> bool {
        self.errors.iter().any(|error| error.code == code)
    }

    /// The first error of the given kind recorded at this node.
    pub fn get_error(&self, code: ErrorCode) -> Option<&'a ValidationError> {
        self.errors.iter().copied().find(|error| error.code == code)
    }

    fn insert(&mut self, path: &[PathSegment], error: &'a ValidationError) {
        match path.split_first() {
            None => self.errors.push(error),
            Some((head, rest)) => self
                .descendants
                .entry(head.clone())
                .or_default()
                .insert(rest, error),
        }
    }
}

/// Errors organised by location.
#[derive(Debug)]
pub struct ErrorTree<'a> {
    root: ErrorTreeNode<'a>,
}

impl<'a> ErrorTree<'a> {
    /// Index errors by their document paths.
    pub fn by_document(errors: &'a ErrorList) -> Self {
        Self::build(errors, TreeKind::Document)
    }

    /// Index errors by their schema paths.
    pub fn by_schema(errors: &'a ErrorList) -> Self {
        Self::build(errors, TreeKind::Schema)
    }

    fn build(errors: &'a ErrorList, kind: TreeKind) -> Self {
        let mut root = ErrorTreeNode::default();
        for error in errors.iter().flat_map(ValidationError::descendants) {
            let path = match kind {
                TreeKind::Document => &error.document_path,
                TreeKind::Schema => &error.schema_path,
            };
            root.insert(path, error);
        }
        Self { root }
    }

    pub fn root(&self) -> &ErrorTreeNode<'a> {
        &self.root
    }

    pub fn get(&self, segment: impl Into<PathSegment>) -> Option<&ErrorTreeNode<'a>> {
        self.root.get(segment)
    }

    /// The node at `path`, if any error was recorded at or below it.
    pub fn node(&self, path: &[PathSegment]) -> Option<&ErrorTreeNode<'a>> {
        path.iter()
            .try_fold(&self.root, |node, segment| node.descendants.get(segment))
    }

    /// All errors recorded at `path` or anywhere below it.
    pub fn fetch_errors_from(&self, path: &[PathSegment]) -> Vec<&'a ValidationError> {
        let mut found = Vec::new();
        if let Some(node) = self.node(path) {
            collect(node, &mut found);
        }
        found
    }
}

fn collect<'a>(node: &ErrorTreeNode<'a>, found: &mut Vec<&'a ValidationError>) {
    found.extend(node.errors.iter().copied());
    for child in node.descendants.values() {
        collect(child, found);
    }
}
