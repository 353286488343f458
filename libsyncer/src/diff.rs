//! Structural diff between two snapshots, expressed as a nested patch
//! document. Objects recurse key by key; anything else that changed becomes a
//! replacement leaf. Arrays are replaced wholesale.

use serde_json::{Map, Value, json};

use libtenantdb::meta::BLOCK_META_FIELD;

/// Returns `None` when the documents are equal.
pub fn diff(prev: &Value, next: &Value) -> Option<Value> {
    if prev == next {
        return None;
    }
    match (prev, next) {
        (Value::Object(p), Value::Object(n)) => {
            let mut patch = Map::new();
            for (key, pv) in p {
                match n.get(key) {
                    Some(nv) => {
                        if let Some(child) = diff(pv, nv) {
                            patch.insert(key.clone(), child);
                        }
                    }
                    None => {
                        patch.insert(key.clone(), json!({ "removed": pv }));
                    }
                }
            }
            for (key, nv) in n {
                if !p.contains_key(key) {
                    patch.insert(key.clone(), json!({ "added": nv }));
                }
            }
            if patch.is_empty() {
                None
            } else {
                Some(Value::Object(patch))
            }
        }
        _ => Some(json!({ "old": prev, "new": next })),
    }
}

/// A delta whose only top-level entry is the block metadata is churn from the
/// bookkeeping stamp, not a real change, and must not be uploaded.
pub fn is_meta_only(delta: &Value) -> bool {
    matches!(delta, Value::Object(map) if map.len() == 1 && map.contains_key(BLOCK_META_FIELD))
}
