//! Two-tier chained store (L1 in front of L2) with promotion on L2 hits.

use crate::store::{ArtifactStore, StoreError, StoreStats};
use crate::value::Value;

/// Composes a fast front store with a larger backing store. A typical
/// pairing is an in-memory L1 over an on-disk L2. Tier statistics stay
/// independent; the composite reports their aggregate.
pub struct ChainStore {
    l1: Box<dyn ArtifactStore>,
    l2: Box<dyn ArtifactStore>,
}

impl ChainStore {
    pub fn new(l1: Box<dyn ArtifactStore>, l2: Box<dyn ArtifactStore>) -> Self {
        ChainStore { l1, l2 }
    }

    pub fn l1(&self) -> &dyn ArtifactStore {
        self.l1.as_ref()
    }

    pub fn l2(&self) -> &dyn ArtifactStore {
        self.l2.as_ref()
    }
}

impl ArtifactStore for ChainStore {
    fn exists(&self, op: &str, digest: &str) -> Result<bool, StoreError> {
        if self.l1.exists(op, digest)? {
            return Ok(true);
        }
        self.l2.exists(op, digest)
    }

    fn get(&self, op: &str, digest: &str) -> Result<Value, StoreError> {
        match self.l1.get(op, digest) {
            Ok(value) => Ok(value),
            Err(StoreError::NotFound { .. }) => {
                let value = self.l2.get(op, digest)?;
                // Promote so the next lookup is an L1 hit.
                self.l1.put(op, digest, &value)?;
                Ok(value)
            }
            Err(other) => Err(other),
        }
    }

    fn put(&self, op: &str, digest: &str, artifact: &Value) -> Result<(), StoreError> {
        self.l1.put(op, digest, artifact)?;
        self.l2.put(op, digest, artifact)
    }

    fn stats(&self) -> StoreStats {
        self.l1.stats().aggregate(self.l2.stats())
    }

    fn reset_stats(&self) {
        self.l1.reset_stats();
        self.l2.reset_stats();
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.l1.clear()?;
        self.l2.clear()
    }
}
