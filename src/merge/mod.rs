//! Fragment merge logic
//!
//! Folds fragments left to right with type-aware rules:
//! - Opaque values: never entered, incoming wins
//! - Arrays: CONCATENATE (accumulated first, then incoming)
//! - Objects: deep-merge by key
//! - Scalars and mismatched shapes: incoming wins

use crate::error::{ConsolidateError, MERGE_CONFIGS_ARGUMENT};
use crate::value::{ConfigMap, ConfigValue, OpaqueRegistry};

/// Deep merge two values.
///
/// Merge semantics, in priority order:
/// - Either side opaque: incoming replaces accumulated as an atomic unit
/// - Both arrays: accumulated items followed by incoming items
/// - Both objects: deep-merge by key (recursive)
/// - Anything else: incoming replaces accumulated
pub fn deep_merge(acc: ConfigValue, incoming: ConfigValue) -> ConfigValue {
    match (acc, incoming) {
        // Opaque values are never merged field by field
        (acc, incoming) if acc.is_opaque() || incoming.is_opaque() => incoming,

        // Arrays: CONCATENATE (no deduplication)
        (ConfigValue::Array(mut acc_items), ConfigValue::Array(incoming_items)) => {
            acc_items.extend(incoming_items);
            ConfigValue::Array(acc_items)
        }

        // Both objects: deep merge
        (ConfigValue::Object(acc_map), ConfigValue::Object(incoming_map)) => {
            ConfigValue::Object(merge_maps(acc_map, incoming_map))
        }

        // Scalars and any other case: incoming wins
        (_, incoming) => incoming,
    }
}

fn merge_maps(mut acc: ConfigMap, incoming: ConfigMap) -> ConfigMap {
    for (key, incoming_value) in incoming {
        let merged = match acc.get_mut(&key) {
            Some(slot) => deep_merge(std::mem::replace(slot, ConfigValue::Null), incoming_value),
            None => incoming_value,
        };
        // existing keys keep their position
        acc.insert(key, merged);
    }
    acc
}

/// Merge fragments in order (first is base, last has highest precedence).
///
/// Starts from an empty object, so merging no fragments yields `{}`.
pub fn merge_configs<I>(fragments: I) -> ConfigValue
where
    I: IntoIterator<Item = ConfigValue>,
{
    fragments
        .into_iter()
        .fold(ConfigValue::empty_object(), deep_merge)
}

/// [`merge_configs`] over a dynamically shaped argument that must be an array
/// of fragments.
pub fn merge_configs_value(
    fragments: serde_json::Value,
    registry: &OpaqueRegistry,
) -> Result<ConfigValue, ConsolidateError> {
    let serde_json::Value::Array(items) = fragments else {
        return Err(ConsolidateError::argument(MERGE_CONFIGS_ARGUMENT));
    };
    let fragments = items
        .into_iter()
        .map(|item| {
            ConfigValue::from_json(item, registry)
                .map_err(|e| ConsolidateError::argument(e.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(merge_configs(fragments))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Color;
    use serde_json::json;

    fn v(value: serde_json::Value) -> ConfigValue {
        ConfigValue::from(value)
    }

    #[test]
    fn test_scalar_override() {
        let result = merge_configs(vec![v(json!({"clash": "A"})), v(json!({"clash": "B"}))]);
        assert_eq!(result, v(json!({"clash": "B"})));
    }

    #[test]
    fn test_object_deep_merge() {
        let result = merge_configs(vec![v(json!({"a": {"x": 1}})), v(json!({"a": {"y": 2}}))]);
        assert_eq!(result, v(json!({"a": {"x": 1, "y": 2}})));
    }

    #[test]
    fn test_array_concatenate() {
        let first = v(json!({"objects": [{"id": 1}, {"id": 2}, {"id": 3}]}));
        let second = v(json!({"objects": [{"id": 4}, {"id": 5}, {"id": 6}, {"id": 7}]}));
        let result = merge_configs(vec![first, second]);

        let objects = result["objects"].as_array().unwrap();
        assert_eq!(objects.len(), 7);
        for (i, object) in objects.iter().enumerate() {
            assert_eq!(object["id"], ConfigValue::from(i as i64 + 1));
        }
    }

    #[test]
    fn test_array_concatenate_keeps_duplicates() {
        let result = merge_configs(vec![v(json!({"tags": ["a"]})), v(json!({"tags": ["a"]}))]);
        assert_eq!(result["tags"], v(json!(["a", "a"])));
    }

    #[test]
    fn test_opaque_value_is_never_field_merged() {
        let mut first = ConfigMap::new();
        first.insert("color".into(), Color::rgb(255, 0, 0).into());
        let mut second = ConfigMap::new();
        second.insert("color".into(), Color::rgb(0, 0, 255).into());

        let result = merge_configs(vec![ConfigValue::Object(first), ConfigValue::Object(second)]);
        assert_eq!(result["color"].as_color(), Some(&Color::rgb(0, 0, 255)));
    }

    #[test]
    fn test_opaque_replaces_and_is_replaced_by_plain_values() {
        let mut with_color = ConfigMap::new();
        with_color.insert("brand".into(), Color::rgb(1, 2, 3).into());
        let with_color = ConfigValue::Object(with_color);
        let plain = v(json!({"brand": {"red": 9}}));

        let result = merge_configs(vec![plain.clone(), with_color.clone()]);
        assert!(result["brand"].is_opaque());

        let result = merge_configs(vec![with_color, plain]);
        assert_eq!(result["brand"], v(json!({"red": 9})));
    }

    #[test]
    fn test_mismatched_shapes_incoming_wins() {
        let result = merge_configs(vec![v(json!({"a": [1, 2]})), v(json!({"a": {"b": 1}}))]);
        assert_eq!(result["a"], v(json!({"b": 1})));

        let result = merge_configs(vec![v(json!({"a": {"b": 1}})), v(json!({"a": null}))]);
        assert!(result["a"].is_null());
    }

    #[test]
    fn test_add_new_key_and_keep_order() {
        let result = merge_configs(vec![v(json!({"a": 1, "b": 2})), v(json!({"c": 3, "a": 4}))]);
        let keys: Vec<_> = result.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
        assert_eq!(result["a"], ConfigValue::from(4));
    }

    #[test]
    fn test_order_sensitive() {
        let a = v(json!({"k": "A", "list": [1]}));
        let b = v(json!({"k": "B", "list": [2]}));
        let ab = merge_configs(vec![a.clone(), b.clone()]);
        let ba = merge_configs(vec![b, a]);
        assert_ne!(ab, ba);
        assert_eq!(ab["list"], v(json!([1, 2])));
        assert_eq!(ba["list"], v(json!([2, 1])));
    }

    #[test]
    fn test_inputs_untouched() {
        let first = v(json!({"a": {"x": [1]}}));
        let second = v(json!({"a": {"x": [2]}}));
        let snapshot = (first.clone(), second.clone());
        let _ = merge_configs(vec![first.clone(), second.clone()]);
        assert_eq!((first, second), snapshot);
    }

    #[test]
    fn test_nested_deep_merge() {
        let base = v(json!({"level1": {"level2": {"a": 1, "b": 2, "list": ["x"]}}}));
        let overlay = v(json!({"level1": {"level2": {"b": 3, "c": 4, "list": ["y"]}}}));
        let result = deep_merge(base, overlay);

        assert_eq!(result["level1"]["level2"]["a"], ConfigValue::from(1));
        assert_eq!(result["level1"]["level2"]["b"], ConfigValue::from(3));
        assert_eq!(result["level1"]["level2"]["c"], ConfigValue::from(4));
        assert_eq!(result["level1"]["level2"]["list"], v(json!(["x", "y"])));
    }

    #[test]
    fn test_empty_sequence_yields_empty_object() {
        assert_eq!(merge_configs(Vec::new()), ConfigValue::empty_object());
    }

    #[test]
    fn test_merge_configs_value_requires_array() {
        let err = merge_configs_value(json!(null), &OpaqueRegistry::default()).unwrap_err();
        assert_eq!(err.to_string(), MERGE_CONFIGS_ARGUMENT);

        let merged = merge_configs_value(
            json!([{"c": {"$color": "#f00"}}, {"c": {"$color": "#00f"}}]),
            &OpaqueRegistry::default(),
        )
        .unwrap();
        assert_eq!(merged["c"].as_color(), Some(&Color::rgb(0, 0, 255)));
    }
}
