use thiserror::Error;

/// A schema that cannot be evaluated. Raised, never collected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("unknown schema reference '{0}'")]
    UnknownSchema(String),

    #[error("unknown rules set reference '{0}'")]
    UnknownRulesSet(String),

    #[error("unknown rule '{rule}' at {path}")]
    UnknownRule { rule: String, path: String },

    #[error("unknown type '{type_name}' at {path}")]
    UnknownType { type_name: String, path: String },

    #[error("no {kind} handler named '{name}' at {path}")]
    UnknownHandler {
        kind: &'static str,
        name: String,
        path: String,
    },

    #[error("invalid constraint for rule '{rule}' at {path}: {reason}")]
    InvalidConstraint {
        rule: String,
        path: String,
        reason: String,
    },

    #[error("schema definition must be a mapping or a reference, got {0}")]
    NotAMapping(String),

    #[error("rules set definition must be a mapping or a reference, got {0}")]
    NotARulesSet(String),

    #[error("no schema has been set")]
    MissingSchema,
}

/// A document that cannot be validated at all.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DocumentError {
    #[error("document is missing")]
    Missing,

    #[error("'{0}' is not a document, must be a dict")]
    WrongFormat(String),
}

/// Anything that aborts a validation or normalization call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VetterError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Document(#[from] DocumentError),
}

pub type Result<T, E = VetterError> = std::result::Result<T, E>;
