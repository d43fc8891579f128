//! crates/dedupe_io/src/canonical_json.rs
//! Canonical JSON bytes: recursively sorted object keys, compact
//! separators, UTF-8, no trailing newline (writers add the final LF).
//! Same canonical structure ⇒ same bytes across OS/arch.

use crate::IoError;
use serde::Serialize;
use serde_json::{Map, Value};

/// Recursively sort object keys; arrays keep their order.
pub fn canonicalize_value(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = Map::new();
            for k in keys {
                out.insert(k.clone(), canonicalize_value(&map[k]));
            }
            Value::Object(out)
        }
        Value::Array(a) => Value::Array(a.iter().map(canonicalize_value).collect()),
        _ => v.clone(),
    }
}

/// Serialize any value to canonical bytes (sorted keys, compact, no
/// trailing newline).
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, IoError> {
    let v = serde_json::to_value(value)?;
    let c = canonicalize_value(&v);
    Ok(serde_json::to_string(&c)?.into_bytes())
}

// === Tests ===

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn objects_are_sorted_arrays_preserved() {
        let v = json!({
            "b": 1,
            "a": { "y": 1, "x": 2 },
            "arr": [ {"k":2,"j":1}, 3, "z" ]
        });
        let s = String::from_utf8(to_canonical_bytes(&v).unwrap()).unwrap();
        assert_eq!(s, r#"{"a":{"x":2,"y":1},"arr":[{"j":1,"k":2},3,"z"],"b":1}"#);
    }

    #[test]
    fn no_trailing_newline() {
        let bytes = to_canonical_bytes(&json!({"a":1})).unwrap();
        assert!(!bytes.ends_with(b"\n"), "must not end with newline");
    }

    #[test]
    fn stable_across_insertion_order() {
        let v1 = json!({"x": 1, "y": 2});
        let v2 = json!({"y": 2, "x": 1});
        assert_eq!(to_canonical_bytes(&v1).unwrap(), to_canonical_bytes(&v2).unwrap());
    }
}
