//! Content-addressed artifact storage keyed by `(op_name, digest)`.

pub mod chain;
pub mod codec;
pub mod disk;
pub mod memory;
pub mod null;

use std::collections::HashMap;

use thiserror::Error;

use crate::value::{ArtifactHandle, Value};

/// Cache counters. Reset independently of the cached content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct StoreStats {
    pub hits: u64,
    pub misses: u64,
    pub puts: u64,
}

impl StoreStats {
    pub fn aggregate(self, other: StoreStats) -> StoreStats {
        StoreStats {
            hits: self.hits + other.hits,
            misses: self.misses + other.misses,
            puts: self.puts + other.puts,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no artifact stored for ('{op}', '{digest}')")]
    NotFound { op: String, digest: String },

    /// A present artifact that cannot be decoded is fatal, not a miss.
    #[error("corrupt artifact at {at}: {message}")]
    Corrupt { at: String, message: String },

    #[error("no deserializer registered for artifact type '{0}'")]
    UnknownType(String),

    #[error("store i/o failure: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn corrupt(at: impl Into<String>, message: impl Into<String>) -> Self {
        StoreError::Corrupt {
            at: at.into(),
            message: message.into(),
        }
    }
}

/// The cache the executor consults in phase 2.
///
/// The composite key matters: two operations may receive identical
/// manifests and produce different outputs, so the digest alone cannot
/// address an artifact. Implementations take `&self` and lock internally;
/// the executor itself is serial but an embedding may share a store.
pub trait ArtifactStore: Send + Sync {
    fn exists(&self, op: &str, digest: &str) -> Result<bool, StoreError>;

    /// Fails with `NotFound` when absent; a present artifact either decodes
    /// or fails loudly.
    fn get(&self, op: &str, digest: &str) -> Result<Value, StoreError>;

    /// Idempotent: a second write under the same key leaves the same
    /// visible content.
    fn put(&self, op: &str, digest: &str, artifact: &Value) -> Result<(), StoreError>;

    fn stats(&self) -> StoreStats;

    fn reset_stats(&self);

    /// Drops all content and zeroes statistics.
    fn clear(&self) -> Result<(), StoreError>;
}

/// Fixed path encoding for operation names, so independent processes agree
/// on the on-disk layout.
pub fn sanitize_op(op: &str) -> String {
    op.replace([':', '/'], "_")
}

/// Deserializer for one artifact type, keyed by its fully-qualified name.
pub type DeserializeFn = fn(&[u8]) -> Result<ArtifactHandle, StoreError>;

/// Maps fully-qualified type names back to artifact deserializers. The
/// disk store and the wire decoder consult it; type identity on disk is
/// just a string.
#[derive(Debug, Default, Clone)]
pub struct TypeRegistry {
    entries: HashMap<String, DeserializeFn>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        TypeRegistry {
            entries: HashMap::new(),
        }
    }

    pub fn register(&mut self, type_name: impl Into<String>, deserialize: DeserializeFn) {
        self.entries.insert(type_name.into(), deserialize);
    }

    pub fn get(&self, type_name: &str) -> Option<DeserializeFn> {
        self.entries.get(type_name).copied()
    }
}
