//! Dynamically discovered dependencies.
//!
//! Some inputs only reveal themselves while the tool runs: a C source file
//! pulls in headers, a module declaration resolves to other files. The
//! executor reports these as a mapping from the *producer* that revealed
//! each dependency to the dependency paths themselves. The mapping is
//! rebuilt fresh on every execution and persisted so the next evaluation
//! can treat the revealed paths as implicit inputs.

use std::collections::{BTreeMap, BTreeSet};

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

/// Producer → revealed dependency paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredDeps {
    map: BTreeMap<Utf8PathBuf, BTreeSet<Utf8PathBuf>>,
}

impl DiscoveredDeps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that processing `producer` revealed `dependency`.
    pub fn insert(&mut self, producer: impl Into<Utf8PathBuf>, dependency: impl Into<Utf8PathBuf>) {
        self.map
            .entry(producer.into())
            .or_default()
            .insert(dependency.into());
    }

    /// Number of producers with at least one revealed dependency.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// All producers, sorted.
    pub fn producers(&self) -> impl Iterator<Item = &Utf8Path> {
        self.map.keys().map(Utf8PathBuf::as_path)
    }

    /// Dependencies revealed by one producer.
    pub fn of(&self, producer: &Utf8Path) -> Option<&BTreeSet<Utf8PathBuf>> {
        self.map.get(producer)
    }

    /// The union of every revealed dependency path, sorted and deduplicated.
    /// This is the implicit input set for the next evaluation.
    pub fn dependencies(&self) -> Vec<Utf8PathBuf> {
        let set: BTreeSet<&Utf8PathBuf> = self.map.values().flatten().collect();
        set.into_iter().cloned().collect()
    }

    /// Producers that revealed `dependency`, sorted.
    pub fn producers_of(&self, dependency: &Utf8Path) -> Vec<&Utf8Path> {
        self.map
            .iter()
            .filter(|(_, deps)| deps.contains(dependency))
            .map(|(producer, _)| producer.as_path())
            .collect()
    }
}
