//! Normalization policies deciding which attributes of an input matter.
//!
//! A [`Normalizer`] is a pure value describing how paths, directories, and
//! entry order contribute to fingerprint identity. It is selected once when
//! an input property is declared and stays fixed for the property's
//! lifetime; fingerprints built under different normalizers are never
//! comparable.

use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use crate::snapshot::FileKind;

/// Key assigned to every entry under [`PathSensitivity::Ignored`].
pub(crate) const IGNORED_KEY: &str = "*";

/// How much of a path participates in an entry's identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PathSensitivity {
    /// The full path as observed.
    Absolute,
    /// The path relative to the snapshot root. Two trees with identical
    /// relative structure and content fingerprint identically regardless of
    /// where they live on disk.
    Relative,
    /// Only the final path segment. Used when the presence and content of a
    /// named file matter, but not its location.
    NameOnly,
    /// Paths are irrelevant entirely; only content digests matter.
    Ignored,
}

/// Whether directory entries participate in fingerprints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DirectorySensitivity {
    /// Directories are zero-content entries, distinguishable from files.
    Default,
    /// Directories are removed from the fingerprint entirely.
    IgnoreDirectories,
}

/// Whether the relative order of entries is semantically meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderSensitivity {
    /// Reordering entries is a change in its own right.
    Sensitive,
    /// Entries form an unordered mapping.
    Insensitive,
}

/// An immutable normalization policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Normalizer {
    pub path: PathSensitivity,
    pub directory: DirectorySensitivity,
    pub order: OrderSensitivity,
}

impl Normalizer {
    pub const fn new(
        path: PathSensitivity,
        directory: DirectorySensitivity,
        order: OrderSensitivity,
    ) -> Self {
        Self {
            path,
            directory,
            order,
        }
    }

    /// Full observed paths, directories kept, unordered.
    pub const fn absolute() -> Self {
        Self::new(
            PathSensitivity::Absolute,
            DirectorySensitivity::Default,
            OrderSensitivity::Insensitive,
        )
    }

    /// Paths relative to the snapshot root, directories kept, unordered.
    pub const fn relative() -> Self {
        Self::new(
            PathSensitivity::Relative,
            DirectorySensitivity::Default,
            OrderSensitivity::Insensitive,
        )
    }

    /// Final path segments only, directories kept, unordered.
    pub const fn name_only() -> Self {
        Self::new(
            PathSensitivity::NameOnly,
            DirectorySensitivity::Default,
            OrderSensitivity::Insensitive,
        )
    }

    /// Content digests only, directories kept, unordered.
    pub const fn ignored_paths() -> Self {
        Self::new(
            PathSensitivity::Ignored,
            DirectorySensitivity::Default,
            OrderSensitivity::Insensitive,
        )
    }

    /// The same policy with directories removed from fingerprints.
    pub const fn ignore_directories(mut self) -> Self {
        self.directory = DirectorySensitivity::IgnoreDirectories;
        self
    }

    /// The same policy with entry order made significant.
    pub const fn order_sensitive(mut self) -> Self {
        self.order = OrderSensitivity::Sensitive;
        self
    }

    /// Derives the normalized key for `path` observed under `root`.
    pub(crate) fn key(&self, path: &Utf8Path, root: &Utf8Path) -> String {
        match self.path {
            PathSensitivity::Absolute => path.as_str().to_owned(),
            PathSensitivity::Relative => path
                .strip_prefix(root)
                .map(|p| p.as_str())
                .unwrap_or(path.as_str())
                .to_owned(),
            PathSensitivity::NameOnly => {
                path.file_name().unwrap_or(path.as_str()).to_owned()
            }
            PathSensitivity::Ignored => IGNORED_KEY.to_owned(),
        }
    }

    /// Whether entries of `kind` are fingerprinted at all under this policy.
    pub(crate) fn keeps(&self, kind: FileKind) -> bool {
        match kind {
            FileKind::Directory => self.directory == DirectorySensitivity::Default,
            FileKind::File | FileKind::Missing => true,
        }
    }
}
