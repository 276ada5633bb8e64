use serde_json::Value;

/// Shallow merge: every key of `patch` wins over `base`, untouched `base`
/// keys survive. Values are not merged recursively on purpose — an upstream
/// PUT body must carry exactly the nested value the caller supplied, not a
/// blend of old and new.
pub fn overlay(base: &Value, patch: &Value) -> Value {
    match (base.as_object(), patch.as_object()) {
        (Some(base_map), Some(patch_map)) => {
            let mut out = base_map.clone();
            for (key, value) in patch_map {
                out.insert(key.clone(), value.clone());
            }
            Value::Object(out)
        }
        (None, Some(_)) => patch.clone(),
        _ => {
            if patch.is_null() {
                base.clone()
            } else {
                patch.clone()
            }
        }
    }
}
