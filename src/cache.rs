//! Incremental compile cache.
//!
//! One JSON file per source file under `.constela/cache`, keyed by a
//! content hash. A hit requires the hash, the cache format version, and
//! the entry to all check out; corrupt entries are deleted on read so a
//! bad write never wedges the cache.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

use crate::ir::CompiledProgram;

/// Bumped whenever the IR wire format changes shape.
const CACHE_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
pub struct CacheEntry {
    pub version: u32,
    pub hash: String,
    pub program: CompiledProgram,
}

pub struct IncrementalCache {
    cache_dir: PathBuf,
}

impl IncrementalCache {
    /// Cache rooted in the current workspace.
    pub fn new() -> Self {
        Self::at(".constela/cache")
    }

    pub fn at(dir: impl AsRef<Path>) -> Self {
        let cache_dir = dir.as_ref().to_path_buf();
        if !cache_dir.exists() {
            fs::create_dir_all(&cache_dir).ok();
        }
        Self { cache_dir }
    }

    pub fn compute_hash(source: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn entry_path(&self, file_path: &str) -> PathBuf {
        // Stable flat name per source file.
        let safe_name = file_path
            .replace('/', "_")
            .replace('\\', "_")
            .replace(':', "_");
        self.cache_dir.join(format!("{}.json", safe_name))
    }

    pub fn get(&self, file_path: &str, source: &str) -> Option<CompiledProgram> {
        let entry_path = self.entry_path(file_path);
        if !entry_path.exists() {
            return None;
        }

        let data = fs::read_to_string(&entry_path).ok()?;
        let entry: CacheEntry = match serde_json::from_str(&data) {
            Ok(entry) => entry,
            Err(_) => {
                // Corrupt entry: drop it rather than failing every lookup.
                fs::remove_file(entry_path).ok();
                return None;
            }
        };

        if entry.version != CACHE_VERSION {
            fs::remove_file(entry_path).ok();
            return None;
        }
        if entry.hash == Self::compute_hash(source) {
            Some(entry.program)
        } else {
            None
        }
    }

    pub fn set(&self, file_path: &str, source: &str, program: &CompiledProgram) {
        let entry_path = self.entry_path(file_path);
        let entry = CacheEntry {
            version: CACHE_VERSION,
            hash: Self::compute_hash(source),
            program: program.clone(),
        };
        if let Ok(data) = serde_json::to_string(&entry) {
            fs::write(entry_path, data).ok();
        }
    }
}

impl Default for IncrementalCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_program() -> CompiledProgram {
        serde_json::from_value(json!({
            "version": "1.0",
            "state": {},
            "actions": {},
            "view": {"kind": "element", "tag": "div"}
        }))
        .unwrap()
    }

    #[test]
    fn hit_requires_matching_source() {
        let dir = tempfile::tempdir().unwrap();
        let cache = IncrementalCache::at(dir.path());
        let program = sample_program();

        cache.set("app.constela", "source-v1", &program);
        assert!(cache.get("app.constela", "source-v1").is_some());
        assert!(cache.get("app.constela", "source-v2").is_none());
        assert!(cache.get("other.constela", "source-v1").is_none());
    }

    #[test]
    fn corrupt_entry_is_invalidated() {
        let dir = tempfile::tempdir().unwrap();
        let cache = IncrementalCache::at(dir.path());
        let program = sample_program();

        cache.set("app.constela", "src", &program);
        let entry_path = cache.entry_path("app.constela");
        fs::write(&entry_path, "{truncated").unwrap();

        assert!(cache.get("app.constela", "src").is_none());
        assert!(!entry_path.exists());
    }

    #[test]
    fn version_mismatch_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = IncrementalCache::at(dir.path());
        let program = sample_program();

        cache.set("app.constela", "src", &program);
        let entry_path = cache.entry_path("app.constela");
        let mut raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&entry_path).unwrap()).unwrap();
        raw["version"] = json!(0);
        fs::write(&entry_path, raw.to_string()).unwrap();

        assert!(cache.get("app.constela", "src").is_none());
    }
}
