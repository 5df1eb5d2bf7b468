//! Canonical JSON hashing shared by the chain logs, the redactor, and the
//! spine fold.
//!
//! Every content hash in seshat is a SHA-256 over a canonical serialization:
//! compact JSON with object keys in sorted order. Key sorting comes from the
//! BTree-backed `serde_json::Map` (the `preserve_order` feature is off), which
//! makes the byte form stable across processes and restarts. Hashes are only
//! ever compared within one log, so the digest choice matters less than its
//! determinism.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Length of the short fingerprint used for redaction placeholders.
pub const FINGERPRINT_LEN: usize = 12;

/// Serialize a JSON value into its canonical compact form.
///
/// Objects emit their keys in sorted order, arrays keep element order. The
/// same value always produces the same byte string.
pub fn canonical_string(value: &Value) -> String {
    value.to_string()
}

/// SHA-256 of the canonical serialization of `value`, as 64 lowercase hex chars.
pub fn content_hash(value: &Value) -> String {
    hash_str(&canonical_string(value))
}

/// SHA-256 of a raw string, as 64 lowercase hex chars.
pub fn hash_str(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Short deterministic fingerprint of a string.
///
/// Same input, same fingerprint; used by the redactor to keep redacted values
/// joinable across log entries without exposing the original.
pub fn fingerprint(input: &str) -> String {
    hash_str(input)[..FINGERPRINT_LEN].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, json};

    #[test]
    fn insertion_order_does_not_matter() {
        let mut forward = Map::new();
        forward.insert("alpha".into(), json!(1));
        forward.insert("beta".into(), json!(2));
        forward.insert("gamma".into(), json!(3));

        let mut reverse = Map::new();
        reverse.insert("gamma".into(), json!(3));
        reverse.insert("beta".into(), json!(2));
        reverse.insert("alpha".into(), json!(1));

        assert_eq!(
            content_hash(&Value::Object(forward)),
            content_hash(&Value::Object(reverse))
        );
    }

    #[test]
    fn nested_objects_serialize_with_sorted_keys() {
        let value = json!({"outer": {"zz": 1, "aa": 2}, "list": [3, 1, 2]});
        assert_eq!(
            canonical_string(&value),
            r#"{"list":[3,1,2],"outer":{"aa":2,"zz":1}}"#
        );
    }

    #[test]
    fn content_hash_is_64_hex_chars() {
        let hash = content_hash(&json!({"a": 1}));
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn different_values_hash_differently() {
        assert_ne!(content_hash(&json!({"a": 1})), content_hash(&json!({"a": 2})));
    }

    #[test]
    fn fingerprint_is_stable_prefix() {
        let full = hash_str("jane.doe@example.com");
        let short = fingerprint("jane.doe@example.com");
        assert_eq!(short.len(), FINGERPRINT_LEN);
        assert!(full.starts_with(&short));
        assert_eq!(short, fingerprint("jane.doe@example.com"));
        assert_ne!(short, fingerprint("john.roe@example.com"));
    }
}
