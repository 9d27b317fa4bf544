//! Property-based tests for the merge engine.
//!
//! - Idempotence: merge(merge(R, P), P) == merge(R, P)
//! - Field preservation: fields absent from P keep their value
//! - Patch dominance: every scalar or array leaf of P appears in the result
//! - Determinism: the same inputs always give the same output

use ned_core::NerdRecord;
use ned_merge::{merge, parse_patch, MergeEngine, MergePolicy};
use proptest::prelude::*;
use serde_json::{Map, Value};

// =============================================================================
// HELPER STRATEGIES
// =============================================================================

fn key_strategy() -> impl Strategy<Value = String> {
    // Small alphabet so base and patch keys collide often
    prop::sample::select(vec!["title", "version", "keyword", "contactPoint", "fn", "a", "b"])
        .prop_map(str::to_string)
}

fn leaf_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (-1000i64..1000).prop_map(Value::from),
        prop::string::string_regex("[a-zA-Z0-9 ]{0,12}")
            .unwrap()
            .prop_map(Value::String),
    ]
}

fn value_strategy() -> impl Strategy<Value = Value> {
    leaf_strategy().prop_recursive(4, 32, 5, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map(key_strategy(), inner, 0..5)
                .prop_map(|m| Value::Object(m.into_iter().collect::<Map<String, Value>>())),
        ]
    })
}

fn record_strategy() -> impl Strategy<Value = NerdRecord> {
    prop::collection::btree_map(key_strategy(), value_strategy(), 0..6)
        .prop_map(|m| NerdRecord::from_map(m.into_iter().collect()))
}

/// Every non-object leaf of `patch` must be present, unchanged, in `merged`
fn assert_patch_leaves_present(merged: &Map<String, Value>, patch: &Map<String, Value>) {
    for (key, patch_value) in patch {
        let merged_value = merged.get(key).expect("patched field missing from result");
        match (merged_value, patch_value) {
            (Value::Object(m), Value::Object(p)) => assert_patch_leaves_present(m, p),
            _ => assert_eq!(merged_value, patch_value),
        }
    }
}

// =============================================================================
// PROPERTIES
// =============================================================================

proptest! {
    /// Applying the same patch twice is the same as applying it once
    #[test]
    fn merge_is_idempotent(base in record_strategy(), patch in record_strategy()) {
        let once = merge(&base, &patch).unwrap();
        let twice = merge(&once, &patch).unwrap();
        prop_assert_eq!(once, twice);
    }

    /// Fields the patch does not mention are untouched
    #[test]
    fn merge_preserves_unpatched_fields(base in record_strategy(), patch in record_strategy()) {
        let merged = merge(&base, &patch).unwrap();
        for (field, value) in base.fields() {
            if !patch.contains_field(field) {
                prop_assert_eq!(merged.get(field), Some(value));
            }
        }
    }

    /// The result never loses a field of either input
    #[test]
    fn merge_keeps_union_of_fields(base in record_strategy(), patch in record_strategy()) {
        let merged = merge(&base, &patch).unwrap();
        for (field, _) in base.fields().chain(patch.fields()) {
            prop_assert!(merged.contains_field(field));
        }
        prop_assert!(merged.len() <= base.len() + patch.len());
    }

    /// Scalars and arrays from the patch win
    #[test]
    fn merge_applies_patch_leaves(base in record_strategy(), patch in record_strategy()) {
        let merged = merge(&base, &patch).unwrap();
        assert_patch_leaves_present(merged.as_map(), patch.as_map());
    }

    /// Identical inputs give identical outputs
    #[test]
    fn merge_is_deterministic(base in record_strategy(), patch in record_strategy()) {
        let engine = MergeEngine::new(MergePolicy::default());
        prop_assert_eq!(engine.merge(&base, &patch).unwrap(), engine.merge(&base, &patch).unwrap());
    }

    /// An empty patch is the identity
    #[test]
    fn empty_patch_is_identity(base in record_strategy()) {
        let merged = merge(&base, &NerdRecord::new()).unwrap();
        prop_assert_eq!(merged, base);
    }

    /// Serialized records parse back as patches unchanged
    #[test]
    fn serialized_record_parses_as_patch(record in record_strategy()) {
        let text = serde_json::to_string(&record).unwrap();
        prop_assert_eq!(parse_patch(text).unwrap(), record);
    }

    /// Rejected merges never produce a partial result
    #[test]
    fn protected_violation_is_all_or_nothing(base in record_strategy(), patch in record_strategy()) {
        let engine = MergeEngine::new(MergePolicy::new().with_protected_fields(["title"]));
        match engine.merge(&base, &patch) {
            Ok(merged) => prop_assert_eq!(merged.get("title"), base.get("title")),
            Err(_) => {
                let unprotected = merge(&base, &patch).unwrap();
                prop_assert_ne!(unprotected.get("title"), base.get("title"));
            }
        }
    }
}
