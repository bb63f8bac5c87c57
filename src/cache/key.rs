//! Cache Key Module
//!
//! Maps cache keys onto sharded file paths.

use std::path::{Path, PathBuf};

use md5::{Digest, Md5};

// == Digest ==
/// Returns the lowercase hex MD5 digest of `key`.
///
/// MD5 is only used for addressing; nothing here relies on it being
/// collision resistant against an adversary.
pub fn digest(key: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

// == Shard Path ==
/// Builds `root/{first two hex chars}/{full hex digest}` for `key`.
///
/// The two-character prefix caps a namespace at 256 shard directories.
pub fn shard_path(root: &Path, key: &str) -> PathBuf {
    let digest = digest(key);
    root.join(&digest[..2]).join(digest)
}
