//! Type names and the native representations they accept.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// The runtime shape of a document value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Representation {
    Null,
    Boolean,
    /// A number stored as a signed or unsigned integer.
    Integer,
    /// A number stored as a float, `1.0` included.
    Float,
    String,
    Sequence,
    Mapping,
}

impl Representation {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => Representation::Null,
            Value::Bool(_) => Representation::Boolean,
            Value::Number(number) if number.is_f64() => Representation::Float,
            Value::Number(_) => Representation::Integer,
            Value::String(_) => Representation::String,
            Value::Array(_) => Representation::Sequence,
            Value::Object(_) => Representation::Mapping,
        }
    }
}

impl fmt::Display for Representation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Representation::Null => "null",
            Representation::Boolean => "boolean",
            Representation::Integer => "integer",
            Representation::Float => "float",
            Representation::String => "string",
            Representation::Sequence => "sequence",
            Representation::Mapping => "mapping",
        };
        f.write_str(name)
    }
}

/// A named type: a value matches if its representation is included and not
/// excluded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDefinition {
    pub name: String,
    pub included: Vec<Representation>,
    #[serde(default)]
    pub excluded: Vec<Representation>,
}

impl TypeDefinition {
    pub fn new(
        name: impl Into<String>,
        included: impl IntoIterator<Item = Representation>,
        excluded: impl IntoIterator<Item = Representation>,
    ) -> Self {
        Self {
            name: name.into(),
            included: included.into_iter().collect(),
            excluded: excluded.into_iter().collect(),
        }
    }

    pub fn matches(&self, value: &Value) -> bool {
        let representation = Representation::of(value);
        self.included.contains(&representation) && !self.excluded.contains(&representation)
    }
}

/// Type names known to a validator.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    definitions: HashMap<String, TypeDefinition>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TypeRegistry {
    /// An empty registry.
    pub fn empty() -> Self {
        Self {
            definitions: HashMap::new(),
        }
    }

    /// The standard type names.
    ///
    /// Booleans never satisfy `integer` or `number`, whatever the host's
    /// notion of numeric booleans.
    pub fn builtin() -> Self {
        use Representation::*;

        let mut registry = Self::empty();
        registry.insert(TypeDefinition::new("boolean", [Boolean], []));
        registry.insert(TypeDefinition::new("integer", [Integer], [Boolean]));
        registry.insert(TypeDefinition::new("float", [Float, Integer], [Boolean]));
        registry.insert(TypeDefinition::new("number", [Integer, Float], [Boolean]));
        registry.insert(TypeDefinition::new("string", [String], []));
        registry.insert(TypeDefinition::new("list", [Sequence], []));
        registry.insert(TypeDefinition::new("dict", [Mapping], []));
        registry
    }

    /// Add or replace a definition.
    pub fn insert(&mut self, definition: TypeDefinition) {
        self.definitions.insert(definition.name.clone(), definition);
    }

    pub fn get(&self, name: &str) -> Option<&TypeDefinition> {
        self.definitions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.definitions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_representation_of_numbers() {
        assert_eq!(Representation::of(&json!(1)), Representation::Integer);
        assert_eq!(Representation::of(&json!(-1)), Representation::Integer);
        assert_eq!(Representation::of(&json!(1.5)), Representation::Float);
        assert_eq!(Representation::of(&json!(true)), Representation::Boolean);
    }

    #[test]
    fn test_boolean_is_not_a_number() {
        let types = TypeRegistry::builtin();
        assert!(!types.get("number").unwrap().matches(&json!(true)));
        assert!(!types.get("integer").unwrap().matches(&json!(false)));
        assert!(types.get("boolean").unwrap().matches(&json!(true)));
    }

    #[test]
    fn test_float_accepts_integers() {
        let types = TypeRegistry::builtin();
        let float = types.get("float").unwrap();
        assert!(float.matches(&json!(1)));
        assert!(float.matches(&json!(3.5)));
        assert!(!types.get("integer").unwrap().matches(&json!(3.5)));
    }

    #[test]
    fn test_custom_definition() {
        let mut types = TypeRegistry::builtin();
        types.insert(TypeDefinition::new(
            "scalar",
            [
                Representation::Boolean,
                Representation::Integer,
                Representation::Float,
                Representation::String,
            ],
            [],
        ));
        let scalar = types.get("scalar").unwrap();
        assert!(scalar.matches(&json!("x")));
        assert!(!scalar.matches(&json!([])));
    }
}
