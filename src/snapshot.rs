//! Filesystem snapshots consumed by the fingerprinter.
//!
//! A [`Snapshot`] is the raw material for fingerprinting: a traversal-ordered
//! list of paths with their metadata and content digests. Everything the
//! fingerprinter needs is captured here up front; it performs no I/O itself.

use std::fs;
use std::time::SystemTime;

use camino::{Utf8Path, Utf8PathBuf};
use rayon::iter::{IntoParallelIterator, IntoParallelRefIterator, ParallelIterator};
use serde::{Deserialize, Serialize};

use crate::cache::DigestCache;
use crate::error::SnapshotError;
use crate::hash::Hash32;

/// The kind of filesystem object a snapshot entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileKind {
    File,
    Directory,
    /// A declared input that does not exist on disk.
    Missing,
}

/// A single path observed while snapshotting.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotEntry {
    /// The path as observed.
    pub path: Utf8PathBuf,
    pub kind: FileKind,
    /// Length in bytes; zero for directories and missing entries.
    pub len: u64,
    /// Modification time, when the entry exists.
    pub mtime: Option<SystemTime>,
    /// Content digest for files; `None` for directories and missing entries.
    pub digest: Option<Hash32>,
}

/// An immutable, traversal-ordered view of a set of inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    root: Utf8PathBuf,
    entries: Vec<SnapshotEntry>,
}

impl Snapshot {
    /// Walks `root` recursively and snapshots everything beneath it.
    ///
    /// Traversal order is sorted by path, so repeated walks of an unchanged
    /// tree yield identical snapshots. File digests are computed in parallel
    /// through `cache`; the first unreadable file aborts the walk with no
    /// partial snapshot.
    pub fn walk(root: impl AsRef<Utf8Path>, cache: &DigestCache) -> Result<Self, SnapshotError> {
        let root = root.as_ref();
        let pattern = root.join("**/*");

        let mut paths = Vec::new();
        for path in glob::glob(pattern.as_str())? {
            paths.push(Utf8PathBuf::try_from(path?)?);
        }

        let entries = paths
            .into_par_iter()
            .map(|path| observe(path, cache))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            root: root.to_owned(),
            entries,
        })
    }

    /// Snapshots an explicit list of files, preserving declaration order.
    ///
    /// Declared inputs absent from disk become [`FileKind::Missing`] entries
    /// rather than errors; any other I/O failure aborts.
    pub fn of_files(
        root: impl AsRef<Utf8Path>,
        paths: &[Utf8PathBuf],
        cache: &DigestCache,
    ) -> Result<Self, SnapshotError> {
        let entries = paths
            .par_iter()
            .map(|path| observe(path.clone(), cache))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            root: root.as_ref().to_owned(),
            entries,
        })
    }

    pub(crate) fn from_entries(root: Utf8PathBuf, entries: Vec<SnapshotEntry>) -> Self {
        Self { root, entries }
    }

    /// The root against which `Relative` path sensitivity resolves.
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Entries in traversal order.
    pub fn entries(&self) -> &[SnapshotEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// This snapshot with all [`FileKind::Missing`] entries dropped.
    pub fn without_missing(mut self) -> Self {
        self.entries.retain(|entry| entry.kind != FileKind::Missing);
        self
    }
}

fn observe(path: Utf8PathBuf, cache: &DigestCache) -> Result<SnapshotEntry, SnapshotError> {
    let meta = match fs::metadata(&path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(SnapshotEntry {
                path,
                kind: FileKind::Missing,
                len: 0,
                mtime: None,
                digest: None,
            });
        }
        Err(e) => return Err(SnapshotError::Io(e)),
    };

    if meta.is_dir() {
        return Ok(SnapshotEntry {
            path,
            kind: FileKind::Directory,
            len: 0,
            mtime: meta.modified().ok(),
            digest: None,
        });
    }

    let mtime = meta.modified()?;
    let digest = cache.digest_of(&path, meta.len(), mtime)?;

    Ok(SnapshotEntry {
        path,
        kind: FileKind::File,
        len: meta.len(),
        mtime: Some(mtime),
        digest: Some(digest),
    })
}
