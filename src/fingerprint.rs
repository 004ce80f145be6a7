//! Conversion of snapshots into structured, content-addressed fingerprints.

use std::collections::BTreeMap;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::hash::Hash32;
use crate::normalize::{Normalizer, OrderSensitivity};
use crate::snapshot::{FileKind, Snapshot, SnapshotEntry};

/// One normalized input within a [`Fingerprint`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathEntry {
    /// Identity of the entry under the fingerprint's normalizer.
    pub key: String,
    /// The raw path as observed, retained so change reports can name real
    /// files. Not part of fingerprint identity.
    pub path: Utf8PathBuf,
    pub kind: FileKind,
    pub digest: Hash32,
}

impl PathEntry {
    /// Identity comparison: key, kind, and digest; never the raw path.
    fn same(&self, other: &PathEntry) -> bool {
        self.key == other.key && self.kind == other.kind && self.digest == other.digest
    }
}

/// A normalized-key collision observed while fingerprinting.
///
/// Collisions are resolved by letting the later entry win. They are kept
/// around for diagnostics because the overwrite silently drops an input
/// from the fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collision {
    pub key: String,
    /// The raw path whose entry was overwritten.
    pub shadowed: Utf8PathBuf,
    /// The raw path whose entry won.
    pub kept: Utf8PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Entries {
    /// Traversal order preserved; duplicate keys retained as positions.
    Ordered(Vec<PathEntry>),
    /// Keyed mapping; the later entry wins on collision.
    Unordered(BTreeMap<String, PathEntry>),
}

/// A structured, content-addressed summary of a set of inputs under one
/// normalization policy.
///
/// Immutable once built. Fingerprinting the same snapshot and normalizer
/// twice yields identical fingerprints; equality compares normalized keys,
/// kinds, and digests, never raw paths or collision diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fingerprint {
    normalizer: Normalizer,
    entries: Entries,
    collisions: Vec<Collision>,
}

impl Fingerprint {
    /// A fingerprint with no entries.
    pub fn empty(normalizer: Normalizer) -> Self {
        let entries = match normalizer.order {
            OrderSensitivity::Sensitive => Entries::Ordered(Vec::new()),
            OrderSensitivity::Insensitive => Entries::Unordered(BTreeMap::new()),
        };

        Self {
            normalizer,
            entries,
            collisions: Vec::new(),
        }
    }

    pub fn normalizer(&self) -> Normalizer {
        self.normalizer
    }

    pub fn len(&self) -> usize {
        match &self.entries {
            Entries::Ordered(entries) => entries.len(),
            Entries::Unordered(entries) => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The entry for a normalized key; the first occurrence when the
    /// fingerprint is order-sensitive and keys repeat.
    pub fn get(&self, key: &str) -> Option<&PathEntry> {
        match &self.entries {
            Entries::Ordered(entries) => entries.iter().find(|e| e.key == key),
            Entries::Unordered(entries) => entries.get(key),
        }
    }

    /// Entries in traversal order (order-sensitive) or sorted by key
    /// (order-insensitive).
    pub fn iter(&self) -> Box<dyn Iterator<Item = &PathEntry> + '_> {
        match &self.entries {
            Entries::Ordered(entries) => Box::new(entries.iter()),
            Entries::Unordered(entries) => Box::new(entries.values()),
        }
    }

    /// Normalized-key collisions recorded while building this fingerprint.
    pub fn collisions(&self) -> &[Collision] {
        &self.collisions
    }
}

impl PartialEq for Fingerprint {
    fn eq(&self, other: &Self) -> bool {
        self.normalizer == other.normalizer
            && self.len() == other.len()
            && self.iter().zip(other.iter()).all(|(a, b)| a.same(b))
    }
}

impl Eq for Fingerprint {}

/// Reduces a snapshot to a [`Fingerprint`] under `normalizer`.
///
/// Deterministic: the same snapshot and normalizer always produce identical
/// fingerprints. Under an order-insensitive normalizer, two distinct raw
/// paths normalizing to the same key collapse to the later entry; the
/// collision is recorded on the fingerprint and logged, but is not an
/// error.
pub fn fingerprint(snapshot: &Snapshot, normalizer: Normalizer) -> Fingerprint {
    let root = snapshot.root();
    let mut collisions = Vec::new();

    let entries = match normalizer.order {
        OrderSensitivity::Sensitive => {
            let mut ordered = Vec::new();
            for entry in snapshot.entries() {
                if !normalizer.keeps(entry.kind) {
                    continue;
                }
                ordered.push(path_entry(entry, normalizer, root));
            }
            Entries::Ordered(ordered)
        }
        OrderSensitivity::Insensitive => {
            let mut map: BTreeMap<String, PathEntry> = BTreeMap::new();
            for entry in snapshot.entries() {
                if !normalizer.keeps(entry.kind) {
                    continue;
                }

                let entry = path_entry(entry, normalizer, root);
                if let Some(shadowed) = map.get(&entry.key) {
                    tracing::debug!(
                        "normalized key {:?} collides: {} shadowed by {}",
                        entry.key,
                        shadowed.path,
                        entry.path,
                    );
                    collisions.push(Collision {
                        key: entry.key.clone(),
                        shadowed: shadowed.path.clone(),
                        kept: entry.path.clone(),
                    });
                }
                map.insert(entry.key.clone(), entry);
            }
            Entries::Unordered(map)
        }
    };

    Fingerprint {
        normalizer,
        entries,
        collisions,
    }
}

fn path_entry(entry: &SnapshotEntry, normalizer: Normalizer, root: &Utf8Path) -> PathEntry {
    let digest = match entry.kind {
        FileKind::File => entry.digest.expect("file entries carry a content digest"),
        FileKind::Directory => Hash32::DIRECTORY,
        FileKind::Missing => Hash32::MISSING,
    };

    PathEntry {
        key: normalizer.key(&entry.path, root),
        path: entry.path.clone(),
        kind: entry.kind,
        digest,
    }
}
