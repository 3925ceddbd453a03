//! JSON value plumbing shared by the normalizer and the configuration layer

use serde_json::Value;

/// Deep merge `overlay` into `base`.
///
/// Objects merge recursively; scalars and arrays in the overlay replace the
/// base value.
pub fn deep_merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => {
                        base_map.insert(key.clone(), overlay_value.clone());
                    }
                }
            }
        }
        (base, overlay) => {
            *base = overlay.clone();
        }
    }
}

/// Get a nested value by dotted path (e.g. `properties.loggerId`).
pub fn get_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for part in path.split('.') {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// Set a nested value by dotted path, creating intermediate objects.
pub fn set_path(value: &mut Value, path: &str, new_value: Value) {
    let mut current = value;
    let parts: Vec<&str> = path.split('.').collect();
    for part in &parts[..parts.len() - 1] {
        if !current.is_object() {
            *current = Value::Object(serde_json::Map::new());
        }
        current = current
            .as_object_mut()
            .expect("just ensured an object")
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
    }
    if !current.is_object() {
        *current = Value::Object(serde_json::Map::new());
    }
    current
        .as_object_mut()
        .expect("just ensured an object")
        .insert(parts[parts.len() - 1].to_string(), new_value);
}

/// Remove a nested value by dotted path. Missing segments are a no-op.
pub fn remove_path(value: &mut Value, path: &str) {
    let parts: Vec<&str> = path.split('.').collect();
    let mut current = value;
    for part in &parts[..parts.len() - 1] {
        match current.as_object_mut().and_then(|map| map.get_mut(*part)) {
            Some(next) => current = next,
            None => return,
        }
    }
    if let Some(map) = current.as_object_mut() {
        map.remove(parts[parts.len() - 1]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_recurses_into_objects() {
        let mut base = json!({"properties": {"displayName": "a", "state": "published"}});
        deep_merge(&mut base, &json!({"properties": {"state": "notPublished"}}));
        assert_eq!(
            base,
            json!({"properties": {"displayName": "a", "state": "notPublished"}})
        );
    }

    #[test]
    fn merge_replaces_arrays() {
        let mut base = json!({"protocols": ["http", "https"]});
        deep_merge(&mut base, &json!({"protocols": ["wss"]}));
        assert_eq!(base, json!({"protocols": ["wss"]}));
    }

    #[test]
    fn path_accessors() {
        let mut value = json!({"properties": {"loggerId": "/loggers/l1"}});
        assert_eq!(
            get_path(&value, "properties.loggerId"),
            Some(&json!("/loggers/l1"))
        );
        assert_eq!(get_path(&value, "properties.missing"), None);

        set_path(&mut value, "properties.keyVault.secretIdentifier", json!("sid"));
        assert_eq!(
            get_path(&value, "properties.keyVault.secretIdentifier"),
            Some(&json!("sid"))
        );

        remove_path(&mut value, "properties.loggerId");
        assert_eq!(get_path(&value, "properties.loggerId"), None);
        remove_path(&mut value, "properties.absent.deeper");
    }
}
