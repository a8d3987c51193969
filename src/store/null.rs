//! A store that never caches. Used to force execution.

use std::sync::Mutex;

use crate::store::{ArtifactStore, StoreError, StoreStats};
use crate::value::Value;

#[derive(Default)]
pub struct NullStore {
    stats: Mutex<StoreStats>,
}

impl NullStore {
    pub fn new() -> Self {
        NullStore::default()
    }
}

impl ArtifactStore for NullStore {
    fn exists(&self, _op: &str, _digest: &str) -> Result<bool, StoreError> {
        self.stats.lock().expect("stats lock").misses += 1;
        Ok(false)
    }

    fn get(&self, op: &str, digest: &str) -> Result<Value, StoreError> {
        self.stats.lock().expect("stats lock").misses += 1;
        Err(StoreError::NotFound {
            op: op.to_string(),
            digest: digest.to_string(),
        })
    }

    fn put(&self, _op: &str, _digest: &str, _artifact: &Value) -> Result<(), StoreError> {
        Ok(())
    }

    fn stats(&self) -> StoreStats {
        *self.stats.lock().expect("stats lock")
    }

    fn reset_stats(&self) {
        *self.stats.lock().expect("stats lock") = StoreStats::default();
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.reset_stats();
        Ok(())
    }
}
