//! Named schema and rule-set registries for vetter.
//!
//! Registries are shared handles: every clone sees the same definitions, and
//! every mutation bumps a generation counter so validators can tell when a
//! cached schema check went stale.

pub mod file;
pub mod resolver;
pub mod store;

pub use file::RegistryFile;
pub use resolver::Resolver;
pub use store::{Registry, RegistryKind, RulesSetRegistry, RulesSets, SchemaRegistry, Schemas};
