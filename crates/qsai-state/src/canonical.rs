//! Canonical JSON normalization and digest computation (RFC 8785-class).
//!
//! Audit hashing must be byte-stable across processes and backends, so
//! entry content is normalized before digesting:
//! - UTF-16 code unit ordering for object keys (§3.2.3)
//! - Number normalization (integer-valued floats → integers; reject NaN/Infinity)
//! - SHA256 hex digest computation

use crate::audit::ContentDigest;
use crate::error::StorageError;

/// Recursively sort JSON object keys using UTF-16 code unit ordering (RFC 8785 §3.2.3).
fn sort_keys_utf16(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut sorted = serde_json::Map::new();
            let mut keys: Vec<_> = map.keys().collect();

            keys.sort_by(|a, b| {
                let a_utf16: Vec<u16> = a.encode_utf16().collect();
                let b_utf16: Vec<u16> = b.encode_utf16().collect();
                a_utf16.cmp(&b_utf16)
            });

            for key in keys {
                if let Some(v) = map.get(key) {
                    sorted.insert(key.to_string(), sort_keys_utf16(v));
                }
            }
            serde_json::Value::Object(sorted)
        }
        serde_json::Value::Array(arr) => {
            serde_json::Value::Array(arr.iter().map(sort_keys_utf16).collect())
        }
        other => other.clone(),
    }
}

/// Normalize numbers: integer-valued floats → integer repr; reject NaN/Infinity.
fn normalize_value(value: &serde_json::Value) -> Result<serde_json::Value, StorageError> {
    match value {
        serde_json::Value::Object(map) => {
            let mut normalized = serde_json::Map::new();
            for (k, v) in map.iter() {
                normalized.insert(k.clone(), normalize_value(v)?);
            }
            Ok(serde_json::Value::Object(normalized))
        }
        serde_json::Value::Array(arr) => {
            let normalized = arr
                .iter()
                .map(normalize_value)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(serde_json::Value::Array(normalized))
        }
        serde_json::Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                Ok(serde_json::Value::Number(n.clone()))
            } else if let Some(f) = n.as_f64() {
                if !f.is_finite() {
                    return Err(StorageError::NonCanonicalNumber(n.to_string()));
                }
                // Integer-valued floats serialize as integers so 5.0 and 5
                // digest identically.
                if f.fract() == 0.0 && f.abs() < (i64::MAX as f64) {
                    Ok(serde_json::Value::Number(serde_json::Number::from(
                        f as i64,
                    )))
                } else {
                    Ok(serde_json::Value::Number(n.clone()))
                }
            } else {
                Err(StorageError::NonCanonicalNumber(n.to_string()))
            }
        }
        other => Ok(other.clone()),
    }
}

/// Serialize a JSON value to canonical bytes.
pub fn canonical_json_bytes(value: &serde_json::Value) -> Result<Vec<u8>, StorageError> {
    let normalized = normalize_value(value)?;
    let sorted = sort_keys_utf16(&normalized);
    Ok(serde_json::to_vec(&sorted)?)
}

/// Compute the SHA-256 digest of a JSON value's canonical form.
pub fn canonical_digest(value: &serde_json::Value) -> Result<ContentDigest, StorageError> {
    Ok(ContentDigest::from_bytes(&canonical_json_bytes(value)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_affect_digest() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(
            canonical_digest(&a).unwrap(),
            canonical_digest(&b).unwrap()
        );
    }

    #[test]
    fn integer_valued_floats_normalize() {
        let a = json!({"v": 5.0});
        let b = json!({"v": 5});
        assert_eq!(
            canonical_digest(&a).unwrap(),
            canonical_digest(&b).unwrap()
        );
    }

    #[test]
    fn fractional_floats_survive() {
        let a = json!({"v": 0.85});
        let bytes = canonical_json_bytes(&a).unwrap();
        assert_eq!(bytes, br#"{"v":0.85}"#.to_vec());
    }

    #[test]
    fn nested_objects_sorted_recursively() {
        let a = json!({"outer": {"z": 1, "a": 2}});
        let bytes = canonical_json_bytes(&a).unwrap();
        assert_eq!(bytes, br#"{"outer":{"a":2,"z":1}}"#.to_vec());
    }
}
