//! In-memory artifact store. Values are held directly; no serialization.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::store::{ArtifactStore, StoreError, StoreStats};
use crate::value::Value;

type Key = (String, String);

/// Replaceable mapping policy behind the in-memory store. `get` and
/// `insert` may mutate eviction metadata; `contains` must not.
pub trait CacheMap: Send {
    fn get(&mut self, key: &Key) -> Option<Value>;
    fn insert(&mut self, key: Key, value: Value);
    fn contains(&self, key: &Key) -> bool;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn clear(&mut self);
}

#[derive(Debug, Clone, Copy)]
pub enum EvictionPolicy {
    /// Bounded, least-recently-used eviction.
    Lru(usize),
    /// Bounded, least-frequently-used eviction; ties evict the older entry.
    Lfu(usize),
    Unbounded,
}

/// Default policy: LRU with capacity 1000.
pub const DEFAULT_CAPACITY: usize = 1000;

pub struct MemoryStore {
    inner: Mutex<Inner>,
}

struct Inner {
    map: Box<dyn CacheMap>,
    stats: StoreStats,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::with_policy(EvictionPolicy::Lru(DEFAULT_CAPACITY))
    }

    pub fn with_policy(policy: EvictionPolicy) -> Self {
        let map: Box<dyn CacheMap> = match policy {
            EvictionPolicy::Lru(capacity) => Box::new(LruMap::new(capacity)),
            EvictionPolicy::Lfu(capacity) => Box::new(LfuMap::new(capacity)),
            EvictionPolicy::Unbounded => Box::new(UnboundedMap::default()),
        };
        MemoryStore::with_map(map)
    }

    /// Caller-supplied mapping policy.
    pub fn with_map(map: Box<dyn CacheMap>) -> Self {
        MemoryStore {
            inner: Mutex::new(Inner {
                map,
                stats: StoreStats::default(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("store lock").map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        MemoryStore::new()
    }
}

impl ArtifactStore for MemoryStore {
    fn exists(&self, op: &str, digest: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().expect("store lock");
        let present = inner.map.contains(&(op.to_string(), digest.to_string()));
        if !present {
            inner.stats.misses += 1;
        }
        Ok(present)
    }

    fn get(&self, op: &str, digest: &str) -> Result<Value, StoreError> {
        let mut inner = self.inner.lock().expect("store lock");
        match inner.map.get(&(op.to_string(), digest.to_string())) {
            Some(value) => {
                inner.stats.hits += 1;
                Ok(value)
            }
            None => {
                inner.stats.misses += 1;
                Err(StoreError::NotFound {
                    op: op.to_string(),
                    digest: digest.to_string(),
                })
            }
        }
    }

    fn put(&self, op: &str, digest: &str, artifact: &Value) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("store lock");
        inner
            .map
            .insert((op.to_string(), digest.to_string()), artifact.clone());
        inner.stats.puts += 1;
        Ok(())
    }

    fn stats(&self) -> StoreStats {
        self.inner.lock().expect("store lock").stats
    }

    fn reset_stats(&self) {
        self.inner.lock().expect("store lock").stats = StoreStats::default();
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("store lock");
        inner.map.clear();
        inner.stats = StoreStats::default();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

struct LruMap {
    capacity: usize,
    entries: HashMap<Key, (Value, u64)>,
    tick: u64,
}

impl LruMap {
    fn new(capacity: usize) -> Self {
        LruMap {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            tick: 0,
        }
    }
}

impl CacheMap for LruMap {
    fn get(&mut self, key: &Key) -> Option<Value> {
        self.tick += 1;
        let tick = self.tick;
        self.entries.get_mut(key).map(|(value, stamp)| {
            *stamp = tick;
            value.clone()
        })
    }

    fn insert(&mut self, key: Key, value: Value) {
        self.tick += 1;
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            if let Some(oldest) = self
                .entries
                .iter()
                .min_by_key(|(_, (_, stamp))| *stamp)
                .map(|(k, _)| k.clone())
            {
                self.entries.remove(&oldest);
            }
        }
        self.entries.insert(key, (value, self.tick));
    }

    fn contains(&self, key: &Key) -> bool {
        self.entries.contains_key(key)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

struct LfuMap {
    capacity: usize,
    entries: HashMap<Key, (Value, u64, u64)>,
    tick: u64,
}

impl LfuMap {
    fn new(capacity: usize) -> Self {
        LfuMap {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            tick: 0,
        }
    }
}

impl CacheMap for LfuMap {
    fn get(&mut self, key: &Key) -> Option<Value> {
        self.entries.get_mut(key).map(|(value, uses, _)| {
            *uses += 1;
            value.clone()
        })
    }

    fn insert(&mut self, key: Key, value: Value) {
        self.tick += 1;
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            if let Some(coldest) = self
                .entries
                .iter()
                .min_by_key(|(_, (_, uses, stamp))| (*uses, *stamp))
                .map(|(k, _)| k.clone())
            {
                self.entries.remove(&coldest);
            }
        }
        self.entries.insert(key, (value, 0, self.tick));
    }

    fn contains(&self, key: &Key) -> bool {
        self.entries.contains_key(key)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

#[derive(Default)]
struct UnboundedMap {
    entries: HashMap<Key, Value>,
}

impl CacheMap for UnboundedMap {
    fn get(&mut self, key: &Key) -> Option<Value> {
        self.entries.get(key).cloned()
    }

    fn insert(&mut self, key: Key, value: Value) {
        self.entries.insert(key, value);
    }

    fn contains(&self, key: &Key) -> bool {
        self.entries.contains_key(key)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: usize) -> (&'static str, String) {
        ("op", format!("{n:064}"))
    }

    #[test]
    fn put_then_get_round_trips() {
        let store = MemoryStore::new();
        let (op, digest) = key(1);
        store.put(op, &digest, &Value::int(8)).unwrap();
        assert!(store.exists(op, &digest).unwrap());
        assert_eq!(store.get(op, &digest).unwrap(), Value::int(8));
    }

    #[test]
    fn counters_track_hits_misses_puts() {
        let store = MemoryStore::new();
        let (op, digest) = key(1);
        assert!(!store.exists(op, &digest).unwrap());
        store.put(op, &digest, &Value::int(8)).unwrap();
        store.get(op, &digest).unwrap();
        assert_eq!(
            store.stats(),
            StoreStats {
                hits: 1,
                misses: 1,
                puts: 1,
            }
        );
        store.reset_stats();
        assert_eq!(store.stats(), StoreStats::default());
    }

    #[test]
    fn get_on_absent_key_fails() {
        let store = MemoryStore::new();
        let (op, digest) = key(1);
        assert!(matches!(
            store.get(op, &digest).unwrap_err(),
            StoreError::NotFound { .. }
        ));
    }

    #[test]
    fn clear_drops_content_and_statistics() {
        let store = MemoryStore::new();
        let (op, digest) = key(1);
        store.put(op, &digest, &Value::int(8)).unwrap();
        store.clear().unwrap();
        assert!(store.is_empty());
        assert_eq!(store.stats(), StoreStats::default());
    }

    #[test]
    fn lru_evicts_least_recently_used() {
        let store = MemoryStore::with_policy(EvictionPolicy::Lru(2));
        let (op, d1) = key(1);
        let (_, d2) = key(2);
        let (_, d3) = key(3);
        store.put(op, &d1, &Value::int(1)).unwrap();
        store.put(op, &d2, &Value::int(2)).unwrap();
        // Touch d1 so d2 becomes the eviction candidate.
        store.get(op, &d1).unwrap();
        store.put(op, &d3, &Value::int(3)).unwrap();
        assert!(store.exists(op, &d1).unwrap());
        assert!(!store.exists(op, &d2).unwrap());
        assert!(store.exists(op, &d3).unwrap());
    }

    #[test]
    fn lfu_evicts_least_frequently_used() {
        let store = MemoryStore::with_policy(EvictionPolicy::Lfu(2));
        let (op, d1) = key(1);
        let (_, d2) = key(2);
        let (_, d3) = key(3);
        store.put(op, &d1, &Value::int(1)).unwrap();
        store.put(op, &d2, &Value::int(2)).unwrap();
        store.get(op, &d1).unwrap();
        store.get(op, &d1).unwrap();
        store.get(op, &d2).unwrap();
        store.put(op, &d3, &Value::int(3)).unwrap();
        assert!(store.exists(op, &d1).unwrap());
        assert!(!store.exists(op, &d2).unwrap());
    }

    #[test]
    fn unbounded_never_evicts() {
        let store = MemoryStore::with_policy(EvictionPolicy::Unbounded);
        for n in 0..2000 {
            let (op, digest) = key(n);
            store.put(op, &digest, &Value::int(n as i64)).unwrap();
        }
        assert_eq!(store.len(), 2000);
    }
}
