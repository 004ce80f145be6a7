//! Classified deltas between two fingerprints of the same normalizer.

use std::collections::BTreeMap;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::fingerprint::{Fingerprint, PathEntry};
use crate::normalize::OrderSensitivity;
use crate::snapshot::FileKind;

/// A single changed entry, named both by normalized key and by the raw path
/// observed in the current snapshot (or, for removals, the previous one).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub key: String,
    pub path: Utf8PathBuf,
}

/// The classified delta between two fingerprints.
///
/// Unchanged keys are omitted entirely, so downstream processing stays
/// proportional to the number of changes rather than the number of inputs.
/// All three sequences are sorted by key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub added: Vec<Change>,
    pub removed: Vec<Change>,
    pub modified: Vec<Change>,
    reordered: bool,
}

impl ChangeSet {
    /// True when nothing changed at all, relative order included.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.removed.is_empty()
            && self.modified.is_empty()
            && !self.reordered
    }

    /// True when entries were removed, or when an order-sensitive
    /// fingerprint's relative ordering changed. Structural changes cannot
    /// be recomputed incrementally.
    pub fn has_structural_change(&self) -> bool {
        !self.removed.is_empty() || self.reordered
    }
}

/// Computes the change set between `previous` and `current`.
///
/// With no `previous` (first build, or discarded history) every current
/// entry is reported as added and the result is marked structural.
///
/// Entries that went from present to [`FileKind::Missing`] classify as
/// removed, and the reverse as added, so a declared input vanishing from
/// disk looks the same as one vanishing from the input set.
///
/// # Panics
///
/// Panics when the two fingerprints were built under different normalizers.
/// Comparing them is meaningless and always a wiring bug, never a
/// recoverable runtime condition.
pub fn diff(previous: Option<&Fingerprint>, current: &Fingerprint) -> ChangeSet {
    let Some(previous) = previous else {
        return ChangeSet {
            added: current.iter().map(change).collect(),
            removed: Vec::new(),
            modified: Vec::new(),
            reordered: true,
        };
    };

    assert_eq!(
        previous.normalizer(),
        current.normalizer(),
        "fingerprints compared under different normalizers",
    );

    let prev: BTreeMap<&str, &PathEntry> =
        previous.iter().map(|e| (e.key.as_str(), e)).collect();
    let curr: BTreeMap<&str, &PathEntry> =
        current.iter().map(|e| (e.key.as_str(), e)).collect();

    let mut set = ChangeSet::default();

    for (key, c) in &curr {
        match prev.get(key) {
            None => {
                // A freshly declared input that doesn't exist yet is not a
                // change; it becomes one once it appears.
                if c.kind != FileKind::Missing {
                    set.added.push(change(c));
                }
            }
            Some(p) => match (p.kind, c.kind) {
                (FileKind::Missing, FileKind::Missing) => {}
                (FileKind::Missing, _) => set.added.push(change(c)),
                (_, FileKind::Missing) => set.removed.push(change(p)),
                _ if p.digest != c.digest || p.kind != c.kind => {
                    set.modified.push(change(c));
                }
                _ => {}
            },
        }
    }

    for (key, p) in &prev {
        if !curr.contains_key(key) && p.kind != FileKind::Missing {
            set.removed.push(change(p));
        }
    }
    set.removed.sort_by(|a, b| a.key.cmp(&b.key));

    if current.normalizer().order == OrderSensitivity::Sensitive {
        let prev_common: Vec<&str> = previous
            .iter()
            .map(|e| e.key.as_str())
            .filter(|key| curr.contains_key(key))
            .collect();
        let curr_common: Vec<&str> = current
            .iter()
            .map(|e| e.key.as_str())
            .filter(|key| prev.contains_key(key))
            .collect();

        set.reordered = prev_common != curr_common;
    }

    set
}

fn change(entry: &PathEntry) -> Change {
    Change {
        key: entry.key.clone(),
        path: entry.path.clone(),
    }
}
