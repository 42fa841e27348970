//! Stable content hashing over a canonicalized document (`spec.md` §4.1,
//! §9 ambient stack). Grounded on the teacher's `cache::fingerprint::compute_content_hash`
//! SHA-256 primitive, applied to a canonical form instead of raw file bytes
//! so that key order or whitespace differences between two uploads of the
//! "same" spec hash identically.

use sha2::{Digest, Sha256};
use serde_json::Value;

/// Canonicalizes `value` (recursively sorts object keys) and returns its
/// SHA-256 hex digest over compact JSON bytes.
#[must_use]
pub fn content_hash(value: &Value) -> String {
    let canonical = canonicalize(value);
    let bytes = serde_json::to_vec(&canonical).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    format!("{:x}", hasher.finalize())
}

/// Rebuilds `value` with every object's keys in sorted order. Arrays keep
/// their order — position is meaningful there, unlike an object's key
/// order, which `serde_json` otherwise preserves as written.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted: Vec<(&String, &Value)> = map.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            let mut out = serde_json::Map::new();
            for (k, v) in sorted {
                out.insert(k.clone(), canonicalize(v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}
