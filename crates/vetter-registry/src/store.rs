//! Named definition stores.
//!
//! A [`Registry`] is a cheap handle onto a shared map of name to
//! definition. Clones share the same storage, so a definition added through
//! one handle is visible to every validator holding another. Each mutation
//! bumps a generation counter that caches key on.

use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use tracing::debug;
use vetter_core::{Map, SchemaError};

/// What a registry stores.
pub trait RegistryKind {
    /// Label used in log lines.
    const LABEL: &'static str;

    /// Error for a definition that is not a mapping.
    fn not_a_mapping(description: String) -> SchemaError;
}

/// Marker for stores of whole schemas.
#[derive(Debug, Clone, Copy, Default)]
pub struct Schemas;

/// Marker for stores of single-field rule sets.
#[derive(Debug, Clone, Copy, Default)]
pub struct RulesSets;

impl RegistryKind for Schemas {
    const LABEL: &'static str = "schema";

    fn not_a_mapping(description: String) -> SchemaError {
        SchemaError::NotAMapping(description)
    }
}

impl RegistryKind for RulesSets {
    const LABEL: &'static str = "rules set";

    fn not_a_mapping(description: String) -> SchemaError {
        SchemaError::NotARulesSet(description)
    }
}

pub type SchemaRegistry = Registry<Schemas>;
pub type RulesSetRegistry = Registry<RulesSets>;

#[derive(Default)]
struct Shared {
    definitions: RwLock<IndexMap<String, Map>>,
    generation: AtomicU64,
}

/// Shared keyed store of definitions.
pub struct Registry<K> {
    shared: Arc<Shared>,
    _kind: PhantomData<K>,
}

impl<K> Clone for Registry<K> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            _kind: PhantomData,
        }
    }
}

impl<K> Default for Registry<K> {
    fn default() -> Self {
        Self {
            shared: Arc::new(Shared::default()),
            _kind: PhantomData,
        }
    }
}

impl<K: RegistryKind> fmt::Debug for Registry<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("kind", &K::LABEL)
            .field("names", &self.names())
            .field("generation", &self.generation())
            .finish()
    }
}

impl<K: RegistryKind> Registry<K> {
    /// Create an isolated, empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition under `name`, replacing any previous one.
    pub fn add(&self, name: impl Into<String>, definition: Value) -> Result<(), SchemaError> {
        let name = name.into();
        let definition = match definition {
            Value::Object(definition) => definition,
            other => return Err(K::not_a_mapping(format!("{} for '{}'", other, name))),
        };

        debug!("Registering {} '{}'", K::LABEL, name);
        self.write().insert(name, definition);
        self.bump();
        Ok(())
    }

    /// Register several definitions. Stops at the first one that is not a
    /// mapping; the ones before it stay registered.
    pub fn extend<I, S>(&self, definitions: I) -> Result<(), SchemaError>
    where
        I: IntoIterator<Item = (S, Value)>,
        S: Into<String>,
    {
        for (name, definition) in definitions {
            self.add(name, definition)?;
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Map> {
        self.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    pub fn remove(&self, name: &str) -> Option<Map> {
        let removed = self.write().shift_remove(name);
        if removed.is_some() {
            debug!("Removed {} '{}'", K::LABEL, name);
            self.bump();
        }
        removed
    }

    pub fn clear(&self) {
        self.write().clear();
        self.bump();
    }

    /// A snapshot of every definition, in registration order.
    pub fn all(&self) -> IndexMap<String, Map> {
        self.read().clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Incremented by every mutation.
    pub fn generation(&self) -> u64 {
        self.shared.generation.load(Ordering::Acquire)
    }

    /// Whether two handles share storage.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    fn bump(&self) {
        self.shared.generation.fetch_add(1, Ordering::AcqRel);
    }

    // A panic while holding the lock cannot leave the map half-written, so a
    // poisoned lock is still safe to use.
    fn read(&self) -> std::sync::RwLockReadGuard<'_, IndexMap<String, Map>> {
        self.shared
            .definitions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, IndexMap<String, Map>> {
        self.shared
            .definitions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl SchemaRegistry {
    /// The process-wide schema registry.
    pub fn global() -> &'static SchemaRegistry {
        static GLOBAL: OnceLock<SchemaRegistry> = OnceLock::new();
        GLOBAL.get_or_init(SchemaRegistry::new)
    }
}

impl RulesSetRegistry {
    /// The process-wide rules-set registry.
    pub fn global() -> &'static RulesSetRegistry {
        static GLOBAL: OnceLock<RulesSetRegistry> = OnceLock::new();
        GLOBAL.get_or_init(RulesSetRegistry::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_add_and_get() {
        let registry = RulesSetRegistry::new();
        registry.add("boolean", json!({"type": "boolean"})).unwrap();

        assert!(registry.contains("boolean"));
        assert_eq!(
            Value::Object(registry.get("boolean").unwrap()),
            json!({"type": "boolean"})
        );
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_clones_share_storage() {
        let registry = SchemaRegistry::new();
        let other = registry.clone();
        other.add("user", json!({"name": {"type": "string"}})).unwrap();

        assert!(registry.contains("user"));
        assert!(registry.ptr_eq(&other));
        assert!(!registry.ptr_eq(&SchemaRegistry::new()));
    }

    #[test]
    fn test_mutations_bump_generation() {
        let registry = RulesSetRegistry::new();
        let start = registry.generation();

        registry.add("a", json!({})).unwrap();
        registry
            .extend([("b", json!({})), ("c", json!({"type": "string"}))])
            .unwrap();
        assert_eq!(registry.generation(), start + 3);

        registry.remove("a");
        assert_eq!(registry.generation(), start + 4);
        registry.remove("a");
        assert_eq!(registry.generation(), start + 4);

        registry.clear();
        assert!(registry.is_empty());
        assert_eq!(registry.generation(), start + 5);
    }

    #[test]
    fn test_rejects_non_mappings() {
        let schemas = SchemaRegistry::new();
        let err = schemas.add("broken", json!(["a"])).unwrap_err();
        assert!(matches!(err, SchemaError::NotAMapping(_)));

        let rules = RulesSetRegistry::new();
        let err = rules.add("broken", json!("string")).unwrap_err();
        assert!(matches!(err, SchemaError::NotARulesSet(_)));
    }

    #[test]
    fn test_names_keep_registration_order() {
        let registry = RulesSetRegistry::new();
        registry
            .extend([("zeta", json!({})), ("alpha", json!({})), ("mid", json!({}))])
            .unwrap();
        insta::assert_debug_snapshot!(registry.names(), @r#"
        [
            "zeta",
            "alpha",
            "mid",
        ]
        "#);
    }
}
