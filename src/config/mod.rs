//! Configuration module: single-run config loading and batch overlay merging.
//!
//! # Module Structure
//!
//! - `loader`: load/save/validate a single [`RunConfig`] from JSON or YAML.
//!
//! Batch config matrices (a base config plus a list of per-run overlays) are
//! merged here at the `serde_json::Value` level so an overlay only needs to
//! name the fields it changes (§4.8/§6).

pub mod loader;

use crate::error::ConfigError;
use crate::models::RunConfig;
use serde_json::Value;

/// Merge `overlay` onto `base` at the JSON-value level: objects merge key by
/// key (recursively), any other value in `overlay` replaces `base` outright.
pub fn deep_merge(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            let mut merged = base_map.clone();
            for (key, overlay_value) in overlay_map {
                let merged_value = match merged.get(key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value.clone(),
                };
                merged.insert(key.clone(), merged_value);
            }
            Value::Object(merged)
        }
        (_, overlay) => overlay.clone(),
    }
}

/// Apply a JSON overlay on top of a base [`RunConfig`], producing a new config.
pub fn apply_overlay(base: &RunConfig, overlay: &Value) -> Result<RunConfig, ConfigError> {
    let base_value = serde_json::to_value(base)?;
    let merged = deep_merge(&base_value, overlay);
    serde_json::from_value(merged).map_err(ConfigError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn overlay_changes_only_named_fields() {
        let base = RunConfig::default();
        let overlay = json!({ "zfs_iterations": 9 });

        let merged = apply_overlay(&base, &overlay).unwrap();
        assert_eq!(merged.zfs_iterations, 9);
        assert_eq!(merged.disk_iterations, base.disk_iterations);
    }

    #[test]
    fn deep_merge_is_recursive_for_nested_objects() {
        let base = json!({ "outer": { "a": 1, "b": 2 } });
        let overlay = json!({ "outer": { "b": 3 } });
        let merged = deep_merge(&base, &overlay);
        assert_eq!(merged, json!({ "outer": { "a": 1, "b": 3 } }));
    }

    #[test]
    fn deep_merge_replaces_non_object_values() {
        let base = json!({ "list": [1, 2, 3] });
        let overlay = json!({ "list": [9] });
        let merged = deep_merge(&base, &overlay);
        assert_eq!(merged, json!({ "list": [9] }));
    }
}
