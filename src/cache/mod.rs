//! Cache Module
//!
//! Sharded on-disk artifact storage with TTL expiry and size-bounded pruning.
//! Each namespace (link previews, QR codes) owns its own root directory.

mod disk;
mod key;


use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

// Re-export public types
pub use disk::DiskCache;
pub use key::{digest, shard_path};

// == Cache Error ==
/// Filesystem failure inside the cache. A miss is never reported as an error.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Blocking cache task panicked or was cancelled
    #[error("cache task failed: {0}")]
    Task(String),
}

impl CacheError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        CacheError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

// == Prune Outcome ==
/// What a prune pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneOutcome {
    /// Bytes stored after the pass
    pub total_bytes: u64,
    pub removed_files: usize,
    pub removed_bytes: u64,
}

// == Artifact Store ==
/// Blocking key -> bytes store the request pipeline caches artifacts in.
///
/// Implementations are called from `spawn_blocking`, never from async code.
pub trait ArtifactStore: Send + Sync + 'static {
    /// Returns `Ok(None)` on a miss.
    fn find(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    fn write(&self, key: &str, data: &[u8]) -> Result<(), CacheError>;

    /// Fails when there is no entry for `key`.
    fn delete(&self, key: &str) -> Result<(), CacheError>;

    fn prune(&self) -> Result<PruneOutcome, CacheError>;
}
