//! The Artifact capability: how opaque Domain values participate in
//! hashing, storage, and expression field access.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::value::Value;

/// Capability set for a Domain value.
///
/// An artifact must hash and serialize deterministically: the stable hash
/// and the byte stream must agree across processes and runs for the same
/// logical content. The attribute projection is what expression field
/// access traverses.
pub trait Artifact: fmt::Debug + Send + Sync {
    /// Fully-qualified type identifier, e.g. `invariant.poly.Polynomial`.
    /// Used on disk to locate the deserializer.
    fn type_name(&self) -> &str;

    /// Stable hash of the structural state. Fed to the value hasher as-is.
    fn stable_hash(&self) -> [u8; 32];

    /// Deterministic serialization of the structural state.
    fn to_stream(&self) -> Vec<u8>;

    /// Public attribute set, projected into the value universe. Expression
    /// field access on a Domain reads these entries; an artifact that wraps
    /// a scalar exposes it under the distinguished key `value`.
    fn attrs(&self) -> BTreeMap<String, Value>;
}

/// Shared handle to an artifact. Cloning is cheap; artifacts are immutable
/// once produced.
pub type ArtifactHandle = Arc<dyn Artifact>;
