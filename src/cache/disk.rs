//! Disk Cache Module
//!
//! Sharded key -> bytes store on the local filesystem, with lazy TTL expiry
//! and size-bounded, oldest-first pruning.

use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::cache::key::shard_path;
use crate::cache::{ArtifactStore, CacheError, PruneOutcome};

// == Disk Cache ==
/// File-backed cache rooted at a directory owned by a single namespace.
#[derive(Debug, Clone)]
pub struct DiskCache {
    /// Base directory; shard directories live directly beneath it
    root: PathBuf,
    /// Maximum entry age, `Duration::ZERO` disables expiry
    ttl: Duration,
    /// Size cap enforced by `prune`, 0 means unbounded
    max_size_bytes: u64,
}

impl DiskCache {
    // == Constructor ==
    /// Creates a cache with no TTL and no size cap.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ttl: Duration::ZERO,
            max_size_bytes: 0,
        }
    }

    /// Sets the maximum age of an entry before it is treated as absent.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets the total size `prune` trims the cache down to.
    pub fn with_max_size(mut self, max_size_bytes: u64) -> Self {
        self.max_size_bytes = max_size_bytes;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    /// Returns the file path an entry for `key` is stored at.
    pub fn path_for(&self, key: &str) -> PathBuf {
        shard_path(&self.root, key)
    }

    // == Find ==
    /// Reads the entry for `key`.
    ///
    /// A missing file is a miss (`Ok(None)`), not an error. With a TTL set, a
    /// file last modified more than `ttl` ago is removed and reported as a miss.
    pub fn find(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let path = self.path_for(key);

        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::io(&path, e)),
        };

        if self.is_expired(&metadata) {
            debug!(path = %path.display(), "removing expired cache entry");
            if let Err(e) = fs::remove_file(&path) {
                if e.kind() != ErrorKind::NotFound {
                    return Err(CacheError::io(&path, e));
                }
            }
            return Ok(None);
        }

        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            // Pruned between the stat and the read.
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::io(&path, e)),
        }
    }

    fn is_expired(&self, metadata: &fs::Metadata) -> bool {
        if self.ttl.is_zero() {
            return false;
        }
        match metadata.modified() {
            Ok(modified) => SystemTime::now()
                .duration_since(modified)
                .map(|age| age > self.ttl)
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    // == Write ==
    /// Stores `data` under `key`, replacing any previous entry.
    ///
    /// The payload goes to a temporary file in the shard directory which is
    /// synced and then renamed over the final path, so readers see either the
    /// old or the new complete file.
    pub fn write(&self, key: &str, data: &[u8]) -> Result<(), CacheError> {
        let path = self.path_for(key);
        let dir = path
            .parent()
            .ok_or_else(|| CacheError::io(&path, io::Error::other("cache path has no parent")))?;

        fs::create_dir_all(dir).map_err(|e| CacheError::io(dir, e))?;

        let mut file = NamedTempFile::new_in(dir).map_err(|e| CacheError::io(dir, e))?;
        file.write_all(data).map_err(|e| CacheError::io(&path, e))?;
        file.as_file()
            .sync_all()
            .map_err(|e| CacheError::io(&path, e))?;
        file.persist(&path)
            .map_err(|e| CacheError::io(&path, e.error))?;

        Ok(())
    }

    // == Delete ==
    /// Removes the entry for `key`. Fails if there is no such entry.
    pub fn delete(&self, key: &str) -> Result<(), CacheError> {
        let path = self.path_for(key);
        fs::remove_file(&path).map_err(|e| CacheError::io(&path, e))
    }

    // == Prune ==
    /// Deletes the oldest files until the cache fits within `max_size_bytes`.
    ///
    /// Unreadable entries met during the walk are skipped. Only a failure to
    /// read the root directory itself aborts the prune.
    pub fn prune(&self) -> Result<PruneOutcome, CacheError> {
        if self.max_size_bytes == 0 {
            return Ok(PruneOutcome::default());
        }

        let mut files = match fs::read_dir(&self.root) {
            Ok(entries) => {
                let mut files = Vec::new();
                collect_files(entries, &mut files);
                files
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(CacheError::io(&self.root, e)),
        };

        let mut total: u64 = files.iter().map(|f| f.size).sum();
        let mut outcome = PruneOutcome {
            total_bytes: total,
            ..PruneOutcome::default()
        };

        if total <= self.max_size_bytes {
            info!(
                root = %self.root.display(),
                size = total,
                limit = self.max_size_bytes,
                ttl_secs = self.ttl.as_secs(),
                "no need to prune"
            );
            return Ok(outcome);
        }

        files.sort_by_key(|f| f.modified);

        for file in files {
            if total <= self.max_size_bytes {
                break;
            }
            if fs::remove_file(&file.path).is_ok() {
                total -= file.size;
                outcome.removed_files += 1;
                outcome.removed_bytes += file.size;
            }
        }
        outcome.total_bytes = total;

        info!(
            root = %self.root.display(),
            removed_files = outcome.removed_files,
            removed_bytes = outcome.removed_bytes,
            size = total,
            limit = self.max_size_bytes,
            "cache pruned"
        );
        Ok(outcome)
    }
}

impl ArtifactStore for DiskCache {
    fn find(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        DiskCache::find(self, key)
    }

    fn write(&self, key: &str, data: &[u8]) -> Result<(), CacheError> {
        DiskCache::write(self, key, data)
    }

    fn delete(&self, key: &str) -> Result<(), CacheError> {
        DiskCache::delete(self, key)
    }

    fn prune(&self) -> Result<PruneOutcome, CacheError> {
        DiskCache::prune(self)
    }
}

// == Walk ==
struct StoredFile {
    path: PathBuf,
    size: u64,
    modified: SystemTime,
}

fn collect_files(entries: fs::ReadDir, files: &mut Vec<StoredFile>) {
    for entry in entries.flatten() {
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            if let Ok(children) = fs::read_dir(entry.path()) {
                collect_files(children, files);
            }
        } else if file_type.is_file() {
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            files.push(StoredFile {
                path: entry.path(),
                size: metadata.len(),
                modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            });
        }
    }
}
