//! Configuration for the editor service

use ned_merge::MergePolicy;
use serde::{Deserialize, Serialize};

/// Editor service configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Rules applied when merging patches
    pub merge_policy: MergePolicy,

    /// Run read-merge-write sequences for the same ediid one at a time.
    /// When off, concurrent patches race and the last write wins.
    pub serialize_per_record: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            merge_policy: MergePolicy::default(),
            serialize_per_record: true,
        }
    }
}

impl EditorConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the merge policy
    pub fn with_merge_policy(mut self, policy: MergePolicy) -> Self {
        self.merge_policy = policy;
        self
    }

    /// Set top-level fields that patches may not change
    pub fn with_protected_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.merge_policy = self.merge_policy.with_protected_fields(fields);
        self
    }

    /// Enable or disable per-record serialization
    pub fn with_serialize_per_record(mut self, enabled: bool) -> Self {
        self.serialize_per_record = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EditorConfig::default();
        assert!(config.serialize_per_record);
        assert!(config.merge_policy.protected_fields.is_empty());
    }

    #[test]
    fn test_config_builder() {
        let config = EditorConfig::new()
            .with_protected_fields(["@id", "ediid"])
            .with_serialize_per_record(false);

        assert!(!config.serialize_per_record);
        assert!(config.merge_policy.is_protected("@id"));
        assert!(config.merge_policy.is_protected("ediid"));
        assert!(!config.merge_policy.is_protected("title"));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: EditorConfig =
            serde_json::from_str(r#"{"merge_policy": {"protected_fields": ["@id"]}}"#).unwrap();
        assert!(config.serialize_per_record);
        assert_eq!(config.merge_policy.max_depth, ned_merge::DEFAULT_MAX_DEPTH);
        assert!(config.merge_policy.is_protected("@id"));
    }
}
