//! Deep merge for configuration trees.
//!
//! Implements deep-extend semantics: later sources override earlier ones at
//! the leaf level. Mappings merge recursively; sequences and scalars are
//! replaced wholesale, never concatenated or element-merged.

use serde_json::{Map, Value};

/// Deep merge two trees, with `overlay` taking precedence over `base`.
///
/// - Mappings are merged recursively: keys in overlay override keys in base
/// - Sequences, strings, numbers, booleans, and nulls replace entirely
///
/// # Example
/// ```
/// use serde_json::json;
/// use strata_config::merge::deep_merge;
///
/// let base = json!({
///     "server": { "port": 25, "debug": false }
/// });
/// let overlay = json!({
///     "server": { "port": 587 }
/// });
/// let result = deep_merge(base, overlay);
/// assert_eq!(result, json!({ "server": { "port": 587, "debug": false } }));
/// ```
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged_value = if let Some(base_value) = base_map.remove(&key) {
                    deep_merge(base_value, overlay_value)
                } else {
                    overlay_value
                };
                base_map.insert(key, merged_value);
            }
            Value::Object(base_map)
        }
        // Any other combination: overlay replaces base entirely
        (_, overlay) => overlay,
    }
}

/// Merge sources in order, with later sources taking precedence.
///
/// The empty mapping is the identity element, so merging no sources yields
/// an empty tree.
pub fn deep_merge_all(sources: impl IntoIterator<Item = Value>) -> Value {
    sources
        .into_iter()
        .fold(Value::Object(Map::new()), deep_merge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_simple_mappings() {
        let base = json!({"a": 1, "b": 2});
        let overlay = json!({"b": 3, "c": 4});
        let result = deep_merge(base, overlay);
        assert_eq!(result, json!({"a": 1, "b": 3, "c": 4}));
    }

    #[test]
    fn test_merge_nested_mappings() {
        let base = json!({
            "server": {"host": "localhost", "port": 25},
            "debug": true
        });
        let overlay = json!({
            "server": {"port": 587}
        });
        let result = deep_merge(base, overlay);
        assert_eq!(
            result,
            json!({
                "server": {"host": "localhost", "port": 587},
                "debug": true
            })
        );
    }

    #[test]
    fn test_sequences_replaced_not_merged() {
        let base = json!({"items": [1, 2, 3]});
        let overlay = json!({"items": [4, 5]});
        let result = deep_merge(base, overlay);
        assert_eq!(result, json!({"items": [4, 5]}));
    }

    #[test]
    fn test_null_replaces_base() {
        let base = json!({"a": 1, "b": {"c": 2}});
        let overlay = json!({"a": null});
        let result = deep_merge(base, overlay);
        assert_eq!(result, json!({"a": null, "b": {"c": 2}}));
    }

    #[test]
    fn test_keys_unique_to_one_source_survive() {
        let sources = vec![
            json!({"a": 1}),
            json!({"b": 2}),
            json!({"c": {"d": 3}}),
        ];
        let result = deep_merge_all(sources);
        assert_eq!(result, json!({"a": 1, "b": 2, "c": {"d": 3}}));
    }

    #[test]
    fn test_last_writer_wins() {
        let sources = vec![json!({"a": 1}), json!({"a": 2}), json!({"a": 3, "b": 4})];
        let result = deep_merge_all(sources);
        assert_eq!(result, json!({"a": 3, "b": 4}));
    }

    #[test]
    fn test_merge_all_empty_is_empty_mapping() {
        let result = deep_merge_all(Vec::new());
        assert_eq!(result, json!({}));
    }

    #[test]
    fn test_overlay_replaces_scalar_with_mapping() {
        let base = json!({"value": 42});
        let overlay = json!({"value": {"nested": true}});
        let result = deep_merge(base, overlay);
        assert_eq!(result, json!({"value": {"nested": true}}));
    }

    #[test]
    fn test_overlay_replaces_mapping_with_scalar() {
        let base = json!({"value": {"nested": true}});
        let overlay = json!({"value": 42});
        let result = deep_merge(base, overlay);
        assert_eq!(result, json!({"value": 42}));
    }
}
