use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

use crate::shared::{CacheError, ASN};

/// Last known registration state per origin ASN, stored as a flat JSON
/// object (`{"64500": true, ...}`).
///
/// The cache is shared between verification tasks. Entries live behind a
/// short-lived lock that is never held across an await. Whole-file writes
/// run on tokio's blocking pool behind an async lock, so two persists never
/// interleave and a later snapshot is never overwritten by an older one.
#[derive(Debug, Default)]
pub struct RegistryCache {
    path: Option<PathBuf>,
    entries: Mutex<BTreeMap<ASN, bool>>,
    write_lock: AsyncMutex<()>,
}

impl RegistryCache {
    /// A cache that is never written to disk.
    pub fn in_memory() -> Self {
        RegistryCache::default()
    }

    /// Loads the cache at `path`. A missing or unreadable file yields an
    /// empty cache bound to the same path.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<BTreeMap<ASN, bool>>(&contents) {
                Ok(entries) => {
                    debug!(path = %path.display(), entries = entries.len(), "loaded ASN cache");
                    entries
                }
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "ASN cache is corrupt, starting empty"
                    );
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "could not read ASN cache, starting empty"
                );
                BTreeMap::new()
            }
        };

        RegistryCache {
            path: Some(path),
            entries: Mutex::new(entries),
            write_lock: AsyncMutex::new(()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn get(&self, asn: &str) -> Option<bool> {
        self.lock_entries().get(asn).copied()
    }

    pub fn put(&self, asn: impl Into<ASN>, registered: bool) {
        self.lock_entries().insert(asn.into(), registered);
    }

    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_entries().is_empty()
    }

    pub fn snapshot(&self) -> BTreeMap<ASN, bool> {
        self.lock_entries().clone()
    }

    /// Records one result and rewrites the backing file.
    pub async fn put_and_persist(
        &self,
        asn: impl Into<ASN>,
        registered: bool,
    ) -> Result<(), CacheError> {
        self.put(asn, registered);
        self.persist().await
    }

    /// Rewrites the whole backing file through a temporary sibling file.
    pub async fn persist(&self) -> Result<(), CacheError> {
        let Some(path) = self.path.as_deref() else {
            return Ok(());
        };

        // Snapshot under the write lock so files land in snapshot order
        let _guard = self.write_lock.lock().await;
        let json = serde_json::to_string(&self.snapshot())?;

        let io_error = |source| CacheError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }
        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, json).await.map_err(io_error)?;
        tokio::fs::rename(&tmp_path, path).await.map_err(io_error)?;
        Ok(())
    }

    fn lock_entries(&self) -> std::sync::MutexGuard<'_, BTreeMap<ASN, bool>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_overwrites() {
        let cache = RegistryCache::in_memory();
        assert_eq!(cache.get("64500"), None);

        cache.put("64500", false);
        cache.put("64500", true);
        assert_eq!(cache.get("64500"), Some(true));
        assert_eq!(cache.len(), 1);
        assert!(cache.persist().await.is_ok());
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = RegistryCache::load(dir.path().join("absent.json"));
        assert!(cache.is_empty());
        assert!(cache.path().is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_persists_keep_the_newest_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("asn_cache.json");
        let cache = std::sync::Arc::new(RegistryCache::load(&path));

        let mut tasks = tokio::task::JoinSet::new();
        for n in 0..64 {
            let cache = cache.clone();
            tasks.spawn(async move {
                cache.put_and_persist((64500 + n).to_string(), n % 2 == 0).await
            });
        }
        while let Some(result) = tasks.join_next().await {
            result.unwrap().unwrap();
        }

        let reloaded = RegistryCache::load(&path);
        assert_eq!(reloaded.len(), 64);
        assert_eq!(reloaded.snapshot(), cache.snapshot());
        assert!(!path.with_extension("json.tmp").exists());
    }
}
