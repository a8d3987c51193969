//! On-disk artifact store with atomic writes.
//!
//! Layout: `<root>/<sanitized_op>/<digest[..2]>/<digest[2..]>`. The two-hex
//! prefix directory keeps any single directory from accumulating millions
//! of entries. Writes serialize to a sibling `.tmp` path and rename into
//! place, so a crash never leaves a partial artifact visible; an orphaned
//! temp file is simply ignored by reads.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::store::{ArtifactStore, StoreError, StoreStats, TypeRegistry, codec, sanitize_op};
use crate::value::Value;

/// Default cache root, relative to the working directory.
pub const DEFAULT_ROOT: &str = ".invariant/cache";

pub struct DiskStore {
    root: PathBuf,
    types: TypeRegistry,
    stats: Mutex<StoreStats>,
}

impl DiskStore {
    pub fn new(root: impl Into<PathBuf>, types: TypeRegistry) -> Self {
        DiskStore {
            root: root.into(),
            types,
            stats: Mutex::new(StoreStats::default()),
        }
    }

    /// Store rooted at [`DEFAULT_ROOT`].
    pub fn with_default_root(types: TypeRegistry) -> Self {
        DiskStore::new(DEFAULT_ROOT, types)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn artifact_path(&self, op: &str, digest: &str) -> PathBuf {
        let (prefix, rest) = digest.split_at(2.min(digest.len()));
        self.root.join(sanitize_op(op)).join(prefix).join(rest)
    }

    fn bump(&self, update: impl FnOnce(&mut StoreStats)) {
        update(&mut self.stats.lock().expect("stats lock"));
    }
}

impl ArtifactStore for DiskStore {
    fn exists(&self, op: &str, digest: &str) -> Result<bool, StoreError> {
        let present = self.artifact_path(op, digest).is_file();
        if !present {
            self.bump(|s| s.misses += 1);
        }
        Ok(present)
    }

    fn get(&self, op: &str, digest: &str) -> Result<Value, StoreError> {
        let path = self.artifact_path(op, digest);
        if !path.is_file() {
            self.bump(|s| s.misses += 1);
            return Err(StoreError::NotFound {
                op: op.to_string(),
                digest: digest.to_string(),
            });
        }
        let bytes = fs::read(&path)?;
        let value = codec::decode(&bytes, &self.types, &path.display().to_string())?;
        self.bump(|s| s.hits += 1);
        Ok(value)
    }

    fn put(&self, op: &str, digest: &str, artifact: &Value) -> Result<(), StoreError> {
        let path = self.artifact_path(op, digest);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, codec::encode(artifact))?;
        fs::rename(&tmp, &path)?;
        self.bump(|s| s.puts += 1);
        Ok(())
    }

    fn stats(&self) -> StoreStats {
        *self.stats.lock().expect("stats lock")
    }

    fn reset_stats(&self) {
        *self.stats.lock().expect("stats lock") = StoreStats::default();
    }

    fn clear(&self) -> Result<(), StoreError> {
        if self.root.exists() {
            fs::remove_dir_all(&self.root)?;
        }
        *self.stats.lock().expect("stats lock") = StoreStats::default();
        Ok(())
    }
}
