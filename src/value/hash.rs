//! Canonical recursive hashing of values and manifests.
//!
//! The hash is the cache identity: structurally equal inputs must produce
//! byte-equal digests on every machine and every run. Sorted map keys are
//! the single source of canonicalisation.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

use crate::value::Value;

/// Hashes a single value. Total on the value universe.
pub fn hash_value(value: &Value) -> [u8; 32] {
    match value {
        Value::Null => Sha256::digest(b"None").into(),
        Value::Bool(true) => Sha256::digest(b"true").into(),
        Value::Bool(false) => Sha256::digest(b"false").into(),
        Value::Int(n) => Sha256::digest(n.to_string().as_bytes()).into(),
        Value::Decimal(d) => Sha256::digest(Value::decimal_canonical(d).as_bytes()).into(),
        Value::Str(s) => Sha256::digest(s.as_bytes()).into(),
        Value::List(items) => {
            let mut hasher = Sha256::new();
            for item in items {
                hasher.update(hash_value(item));
            }
            hasher.finalize().into()
        }
        Value::Map(entries) => {
            // BTreeMap iterates in sorted key order.
            let mut hasher = Sha256::new();
            for (key, val) in entries {
                hasher.update(Sha256::digest(key.as_bytes()));
                hasher.update(hash_value(val));
            }
            hasher.finalize().into()
        }
        Value::Domain(artifact) => artifact.stable_hash(),
    }
}

/// Hashes a manifest as the map value it is.
pub fn hash_manifest(manifest: &BTreeMap<String, Value>) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for (key, val) in manifest {
        hasher.update(Sha256::digest(key.as_bytes()));
        hasher.update(hash_value(val));
    }
    hasher.finalize().into()
}

/// The 64-character lowercase hex digest of a manifest.
pub fn digest_hex(manifest: &BTreeMap<String, Value>) -> String {
    hex::encode(hash_manifest(manifest))
}
