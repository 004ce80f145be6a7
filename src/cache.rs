//! Process-wide cache of file content digests.

use std::time::SystemTime;

use camino::{Utf8Path, Utf8PathBuf};
use dashmap::DashMap;

use crate::hash::Hash32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CachedDigest {
    len: u64,
    mtime: SystemTime,
    digest: Hash32,
}

/// Shared memo of content digests, keyed by path and validated against file
/// length and modification time.
///
/// The cache exists purely to avoid rehashing unchanged content across work
/// units and across repeated snapshots within one build invocation. It is
/// safe for concurrent use from worker threads; when two threads race to
/// insert the same path the last write wins, which is harmless because
/// digests are idempotent.
///
/// The cache is always passed in explicitly, never held in a global, so
/// tests can inject a fresh or pre-seeded instance.
#[derive(Debug, Default)]
pub struct DigestCache {
    map: DashMap<Utf8PathBuf, CachedDigest>,
}

impl DigestCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the content digest for `path`, hashing the file only when no
    /// cached entry matches the given length and modification time.
    pub fn digest_of(
        &self,
        path: &Utf8Path,
        len: u64,
        mtime: SystemTime,
    ) -> std::io::Result<Hash32> {
        if let Some(hit) = self.map.get(path) {
            if hit.len == len && hit.mtime == mtime {
                return Ok(hit.digest);
            }
        }

        let digest = Hash32::hash_file(path)?;
        self.map
            .insert(path.to_owned(), CachedDigest { len, mtime, digest });

        Ok(digest)
    }

    /// Inserts a known digest without touching the filesystem.
    pub fn seed(
        &self,
        path: impl Into<Utf8PathBuf>,
        len: u64,
        mtime: SystemTime,
        digest: Hash32,
    ) {
        self.map.insert(path.into(), CachedDigest { len, mtime, digest });
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
