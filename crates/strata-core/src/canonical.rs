//! Canonical JSON encoding for deterministic snapshots and digests.
//!
//! Two things depend on byte-identical encodings of logically equal values:
//! change detection over a dimension record's tracked-attribute subset, and
//! snapshot objects whose digests are compared across runs. Plain
//! `serde_json` output is not canonical (map iteration order is an
//! implementation detail), so this module serializes through
//! [`serde_json::Value`] with recursively sorted object keys and no
//! insignificant whitespace.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::Result;

/// Serializes a value to canonical JSON bytes.
///
/// Object keys are sorted lexicographically at every nesting level; output
/// contains no whitespace. Two logically equal values always produce
/// identical bytes.
///
/// # Errors
///
/// Returns a serialization error if the value cannot be represented as
/// JSON (e.g. a map with non-string keys).
pub fn canonical_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let value = serde_json::to_value(value)?;
    let mut out = Vec::new();
    write_canonical(&value, &mut out)?;
    Ok(out)
}

/// Returns the lowercase hex SHA-256 digest of `bytes`.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Serializes a value canonically and returns its SHA-256 hex digest.
///
/// # Errors
///
/// Returns a serialization error if the value cannot be represented as JSON.
pub fn canonical_digest<T: Serialize>(value: &T) -> Result<String> {
    Ok(sha256_hex(&canonical_json_bytes(value)?))
}

fn write_canonical(value: &Value, out: &mut Vec<u8>) -> Result<()> {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(b) => out.extend_from_slice(if *b { b"true" } else { b"false" }),
        Value::Number(n) => out.extend_from_slice(n.to_string().as_bytes()),
        Value::String(s) => {
            let encoded = serde_json::to_string(s)?;
            out.extend_from_slice(encoded.as_bytes());
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(item, out)?;
            }
            out.push(b']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push(b'{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                let encoded = serde_json::to_string(key)?;
                out.extend_from_slice(encoded.as_bytes());
                out.push(b':');
                write_canonical(&map[key.as_str()], out)?;
            }
            out.push(b'}');
        }
    }
    Ok(())
}
