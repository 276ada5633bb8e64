use serde_json::Value;

/// Resolve a dotted field path (`"address.city"`) against a nested mapping.
/// Traversal through a missing key or a non-mapping yields `None`.
pub fn lookup<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = record;
    for segment in path.split('.') {
        if segment.is_empty() {
            return None;
        }
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_top_level_and_nested_keys() {
        let record = json!({"name_1": "Acme", "address": {"city": "Zürich"}});
        assert_eq!(lookup(&record, "name_1"), Some(&json!("Acme")));
        assert_eq!(lookup(&record, "address.city"), Some(&json!("Zürich")));
    }

    #[test]
    fn traversal_through_non_mappings_yields_none() {
        assert_eq!(lookup(&json!({"address": null}), "address.city"), None);
        assert_eq!(lookup(&json!({"address": "Bahnhofstrasse"}), "address.city"), None);
        assert_eq!(lookup(&json!({}), "address.city"), None);
        assert_eq!(lookup(&json!({"a": {"b": 1}}), "a.b.c"), None);
    }

    #[test]
    fn empty_segments_never_match() {
        let record = json!({"a": 1});
        assert_eq!(lookup(&record, ""), None);
        assert_eq!(lookup(&record, "a."), None);
    }
}
