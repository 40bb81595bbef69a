use serde_json::Value;

/// Merge `incoming` into `target`.
///
/// Objects merge key by key, recursively; any other incoming value replaces
/// what was there. Keys absent from `incoming` are left untouched.
pub(crate) fn deep_merge(target: &mut Value, incoming: Value) {
    match (target, incoming) {
        (Value::Object(target), Value::Object(incoming)) => {
            for (key, value) in incoming {
                match target.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, incoming) => *target = incoming,
    }
}
