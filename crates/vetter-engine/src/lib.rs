//! Vetter validation engine
//!
//! Validates documents (JSON-like mappings) against declarative schemas and
//! normalizes them on the way:
//!
//! - **Normalization**: renaming, coercion chains, defaults (setters run in
//!   dependency order), read-only and unknown-field purging
//! - **Validation**: types, required fields, dependencies, nested schemas,
//!   sequences and the `anyof`/`allof`/`oneof`/`noneof` combinators
//! - **Errors**: every violation is collected into an [`ErrorList`] with
//!   document and schema paths, and can be rendered for people
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use vetter_engine::Validator;
//!
//! let validator = Validator::new(json!({
//!     "name": {"type": "string", "required": true},
//!     "age": {"type": "integer", "min": 0},
//! }))?;
//!
//! let validation = validator.validate(&json!({"name": "ada", "age": -1}))?;
//! assert!(!validation.is_valid());
//! assert_eq!(validation.messages(), json!({"age": ["min value is 0"]}));
//! # Ok::<(), vetter_engine::VetterError>(())
//! ```

mod combinators;
mod config;
mod context;
mod defaults;
mod engine;
mod handler;
mod normalize;
mod rules;
mod schema_check;
mod validator;

pub use config::{AllowUnknown, ConfigError, ValidatorConfig};
pub use handler::{py_repr, py_str, BasicErrorHandler, ErrorHandler};
pub use rules::{
    compare_values, values_equal, ConstraintCheck, DefaultSetter, Emitted, Emitter,
    HandlerError, PredicateRule, RegexCache, RuleCall, RuleHandler, RuleRegistry,
};
pub use validator::{Normalization, Validation, Validator, ValidatorBuilder};

pub use vetter_core::{
    format_path, DocumentError, ErrorCode, ErrorList, ErrorTree, ErrorTreeNode, Map, PathSegment,
    Representation, SchemaError, TypeDefinition, TypeRegistry, ValidationError, VetterError,
};
pub use vetter_registry::{RegistryFile, Resolver, RulesSetRegistry, SchemaRegistry};
