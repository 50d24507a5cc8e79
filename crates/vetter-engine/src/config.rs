//! Validator settings.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid validator config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// How fields without a schema entry are treated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AllowUnknown {
    /// Accept (`true`) or reject (`false`) unknown fields.
    Flag(bool),
    /// Validate unknown fields against this rule set or rules-set reference.
    Rules(Value),
}

impl Default for AllowUnknown {
    fn default() -> Self {
        AllowUnknown::Flag(false)
    }
}

impl From<bool> for AllowUnknown {
    fn from(flag: bool) -> Self {
        AllowUnknown::Flag(flag)
    }
}

impl AllowUnknown {
    /// Read an `allow_unknown` constraint from a rule set.
    pub fn from_constraint(constraint: &Value) -> Self {
        match constraint {
            Value::Bool(flag) => AllowUnknown::Flag(*flag),
            other => AllowUnknown::Rules(other.clone()),
        }
    }

    /// Unknown fields are rejected outright.
    pub fn is_forbidden(&self) -> bool {
        matches!(self, AllowUnknown::Flag(false))
    }
}

/// Settings applied to every validation run of a [`crate::Validator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    pub allow_unknown: AllowUnknown,

    /// Drop unknown fields during normalization.
    pub purge_unknown: bool,

    /// Drop read-only fields during normalization instead of reporting them.
    pub purge_readonly: bool,

    /// Treat every field as required unless it says `required: false`.
    pub require_all: bool,

    /// Treat null values as absent.
    pub ignore_none_values: bool,

    /// Run the normalization pass before validating.
    pub normalize: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            allow_unknown: AllowUnknown::default(),
            purge_unknown: false,
            purge_readonly: false,
            require_all: false,
            ignore_none_values: false,
            normalize: true,
        }
    }
}

impl ValidatorConfig {
    /// Parse YAML (or JSON) settings. Missing keys keep their defaults.
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = ValidatorConfig::default();
        assert!(config.normalize);
        assert!(config.allow_unknown.is_forbidden());
        assert!(!config.purge_unknown);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = ValidatorConfig::from_yaml_str("purge_unknown: true\n").unwrap();
        assert_eq!(
            config,
            ValidatorConfig {
                purge_unknown: true,
                ..ValidatorConfig::default()
            }
        );
    }

    #[test]
    fn test_allow_unknown_forms() {
        let flag = ValidatorConfig::from_yaml_str("allow_unknown: true").unwrap();
        assert_eq!(flag.allow_unknown, AllowUnknown::Flag(true));

        let rules = ValidatorConfig::from_yaml_str("allow_unknown: {type: string}").unwrap();
        assert_eq!(
            rules.allow_unknown,
            AllowUnknown::Rules(json!({"type": "string"}))
        );

        let reference = ValidatorConfig::from_yaml_str("allow_unknown: plugin").unwrap();
        assert_eq!(reference.allow_unknown, AllowUnknown::Rules(json!("plugin")));
    }

    #[test]
    fn test_from_constraint() {
        assert_eq!(
            AllowUnknown::from_constraint(&json!(false)),
            AllowUnknown::Flag(false)
        );
        assert!(!AllowUnknown::from_constraint(&json!({"coerce": "int"})).is_forbidden());
    }

    #[test]
    fn test_missing_file() {
        let err = ValidatorConfig::from_path(Path::new("/nonexistent/vetter.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
