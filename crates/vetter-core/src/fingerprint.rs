//! Content fingerprints for schema caches.
//!
//! A fingerprint combines the serialized schema with metadata that changes
//! what the schema means, such as registry generations. Two equal
//! fingerprints describe schemas that check out identically.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;

/// SHA-256 digest of a schema and the context it was checked in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaFingerprint {
    pub content_hash: String,
    pub metadata_hash: String,
    pub combined_hash: String,
}

impl SchemaFingerprint {
    /// Fingerprint a schema on its own.
    pub fn of(schema: &Value) -> Self {
        FingerprintBuilder::new().add_value(schema).build()
    }

    /// Short form for log lines.
    pub fn short(&self) -> &str {
        &self.combined_hash[..12.min(self.combined_hash.len())]
    }
}

impl fmt::Display for SchemaFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.combined_hash)
    }
}

/// Builder for [`SchemaFingerprint`].
#[derive(Debug, Default)]
pub struct FingerprintBuilder {
    content_parts: Vec<Vec<u8>>,
    metadata_parts: Vec<String>,
}

impl FingerprintBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a JSON value. Object keys serialize sorted, so equal values
    /// always produce equal bytes.
    pub fn add_value(&mut self, value: &Value) -> &mut Self {
        self.content_parts.push(value.to_string().into_bytes());
        self
    }

    pub fn add_metadata(&mut self, key: &str, value: impl fmt::Display) -> &mut Self {
        self.metadata_parts.push(format!("{}={}", key, value));
        self
    }

    pub fn build(&self) -> SchemaFingerprint {
        let content_hash = self.hash_content();
        let metadata_hash = self.hash_metadata();

        let mut hasher = Sha256::new();
        hasher.update(content_hash.as_bytes());
        hasher.update(metadata_hash.as_bytes());
        let combined_hash = format!("{:x}", hasher.finalize());

        SchemaFingerprint {
            content_hash,
            metadata_hash,
            combined_hash,
        }
    }

    // Content order matters: the first part is the schema, later parts are
    // whatever the caller layers on top.
    fn hash_content(&self) -> String {
        let mut hasher = Sha256::new();
        for content in &self.content_parts {
            hasher.update((content.len() as u64).to_le_bytes());
            hasher.update(content);
        }
        format!("{:x}", hasher.finalize())
    }

    fn hash_metadata(&self) -> String {
        let mut sorted_metadata = self.metadata_parts.clone();
        sorted_metadata.sort();

        let mut hasher = Sha256::new();
        for metadata in &sorted_metadata {
            hasher.update(metadata.as_bytes());
            hasher.update(b"\n");
        }
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_equal_schemas_share_fingerprint() {
        let a = json!({"name": {"type": "string"}, "age": {"type": "integer"}});
        let b = json!({"age": {"type": "integer"}, "name": {"type": "string"}});
        assert_eq!(SchemaFingerprint::of(&a), SchemaFingerprint::of(&b));
    }

    #[test]
    fn test_metadata_changes_fingerprint() {
        let schema = json!({"name": {"type": "string"}});
        let first = FingerprintBuilder::new()
            .add_value(&schema)
            .add_metadata("schema_registry", 1)
            .build();
        let second = FingerprintBuilder::new()
            .add_value(&schema)
            .add_metadata("schema_registry", 2)
            .build();

        assert_eq!(first.content_hash, second.content_hash);
        assert_ne!(first.combined_hash, second.combined_hash);
    }

    #[test]
    fn test_metadata_order_is_irrelevant() {
        let schema = json!({});
        let first = FingerprintBuilder::new()
            .add_value(&schema)
            .add_metadata("a", 1)
            .add_metadata("b", 2)
            .build();
        let second = FingerprintBuilder::new()
            .add_value(&schema)
            .add_metadata("b", 2)
            .add_metadata("a", 1)
            .build();
        assert_eq!(first, second);
        assert_eq!(first.short().len(), 12);
    }
}
