//! Field-level recursive merge engine
//!
//! For every field of the patch: when the field holds an object in both the
//! base and the patch the two are merged recursively, otherwise the patch
//! value replaces the base value wholesale. Arrays are never concatenated and
//! `null` is an ordinary value. Fields the patch does not mention are kept.

use crate::types::{MergeError, MergeOutcome, MergePolicy};
use ned_core::NerdRecord;
use serde_json::{Map, Value};

/// Merge engine bound to a [`MergePolicy`]
///
/// Holds no mutable state; merging the same inputs always gives the same
/// output.
#[derive(Debug, Clone, Default)]
pub struct MergeEngine {
    policy: MergePolicy,
}

impl MergeEngine {
    pub fn new(policy: MergePolicy) -> Self {
        Self { policy }
    }

    /// Merge `patch` onto `base`, producing a new record
    pub fn merge(&self, base: &NerdRecord, patch: &NerdRecord) -> Result<NerdRecord, MergeError> {
        self.merge_with_report(base, patch).map(|outcome| outcome.record)
    }

    /// Merge and report which field paths changed
    pub fn merge_with_report(
        &self,
        base: &NerdRecord,
        patch: &NerdRecord,
    ) -> Result<MergeOutcome, MergeError> {
        let depth = map_depth(patch.as_map());
        if depth > self.policy.max_depth {
            return Err(MergeError::TooDeep {
                depth,
                limit: self.policy.max_depth,
            });
        }

        let mut merged = base.as_map().clone();
        let mut changed_paths = Vec::new();
        merge_maps(&mut merged, patch.as_map(), "", &mut changed_paths);

        for field in &self.policy.protected_fields {
            if merged.get(field) != base.get(field) {
                return Err(MergeError::ProtectedField(field.clone()));
            }
        }

        changed_paths.sort();
        Ok(MergeOutcome {
            record: NerdRecord::from_map(merged),
            changed_paths,
        })
    }
}

/// Merge with the default policy
pub fn merge(base: &NerdRecord, patch: &NerdRecord) -> Result<NerdRecord, MergeError> {
    MergeEngine::default().merge(base, patch)
}

fn merge_maps(
    target: &mut Map<String, Value>,
    patch: &Map<String, Value>,
    prefix: &str,
    changed: &mut Vec<String>,
) {
    for (key, patch_value) in patch {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };

        match (target.get_mut(key), patch_value) {
            (Some(Value::Object(existing)), Value::Object(nested)) => {
                merge_maps(existing, nested, &path, changed);
            }
            (Some(existing), _) => {
                if *existing != *patch_value {
                    *existing = patch_value.clone();
                    changed.push(path);
                }
            }
            (None, _) => {
                target.insert(key.clone(), patch_value.clone());
                changed.push(path);
            }
        }
    }
}

/// Nesting depth counting objects and arrays; a flat object has depth 1
fn map_depth(map: &Map<String, Value>) -> usize {
    1 + map.values().map(value_depth).max().unwrap_or(0)
}

fn value_depth(value: &Value) -> usize {
    match value {
        Value::Object(map) => map_depth(map),
        Value::Array(items) => 1 + items.iter().map(value_depth).max().unwrap_or(0),
        _ => 0,
    }
}
