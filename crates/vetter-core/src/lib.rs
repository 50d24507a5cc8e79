//! Value model shared by the vetter crates: error codes, validation errors
//! and their tree projections, type definitions, rule sets and schema
//! fingerprints.

pub mod codes;
pub mod error;
pub mod errors;
pub mod fingerprint;
pub mod schema;
pub mod tree;
pub mod types;

pub use codes::ErrorCode;
pub use error::{DocumentError, Result, SchemaError, VetterError};
pub use errors::{format_path, ErrorList, Path, PathSegment, ValidationError};
pub use fingerprint::{FingerprintBuilder, SchemaFingerprint};
pub use schema::{Map, RuleSet, Schema};
pub use tree::{ErrorTree, ErrorTreeNode};
pub use types::{Representation, TypeDefinition, TypeRegistry};
