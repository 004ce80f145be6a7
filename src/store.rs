//! Default on-disk persistence for execution histories.

use std::fs::{self, File};
use std::io::BufReader;

use camino::Utf8PathBuf;

use crate::engine::{ExecutionHistory, SCHEMA_VERSION};
use crate::error::StoreError;
use crate::hash::Hash32;
use crate::work::HistoryStore;

/// History store writing one CBOR file per work unit.
///
/// Loads are fail-safe: absent, unreadable, corrupt, or schema-mismatched
/// files are reported as no history, never as errors. Saves replace the
/// previous file atomically by writing to a temporary file and renaming it
/// into place.
#[derive(Debug, Clone)]
pub struct CborHistoryStore {
    dir: Utf8PathBuf,
}

impl CborHistoryStore {
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Work-unit names are arbitrary strings; hash them into file names.
    fn file_for(&self, unit: &str) -> Utf8PathBuf {
        self.dir
            .join(Hash32::hash(unit).to_hex())
            .with_extension("cbor")
    }
}

impl HistoryStore for CborHistoryStore {
    fn load(&self, unit: &str) -> Option<ExecutionHistory> {
        let path = self.file_for(unit);
        let file = File::open(&path).ok()?;

        let history = match ciborium::from_reader::<ExecutionHistory, _>(BufReader::new(file)) {
            Ok(history) => history,
            Err(e) => {
                tracing::warn!("discarding unreadable history for '{unit}': {e}");
                return None;
            }
        };

        if history.schema_version != SCHEMA_VERSION {
            tracing::warn!(
                "discarding history for '{unit}' with schema version {}",
                history.schema_version,
            );
            return None;
        }

        Some(history)
    }

    fn save(&self, unit: &str, history: &ExecutionHistory) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;

        let path = self.file_for(unit);
        let temp = path.with_extension("cbor.tmp");

        let file = File::create(&temp)?;
        ciborium::into_writer(history, file).map_err(std::io::Error::other)?;
        fs::rename(&temp, &path)?;

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::discovered::DiscoveredDeps;
    use crate::fingerprint::Fingerprint;
    use crate::normalize::Normalizer;

    fn store() -> (tempfile::TempDir, CborHistoryStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::try_from(dir.path().join("history")).unwrap();
        (dir, CborHistoryStore::new(path))
    }

    fn history() -> ExecutionHistory {
        let mut discovered = DiscoveredDeps::new();
        discovered.insert("a.c", "a.h");

        ExecutionHistory::new(
            Fingerprint::empty(Normalizer::relative()),
            discovered,
            Fingerprint::empty(Normalizer::absolute()),
        )
    }

    #[test]
    fn round_trips_histories() {
        let (_dir, store) = store();
        let history = history();

        store.save("compile:main", &history).unwrap();
        assert_eq!(store.load("compile:main"), Some(history));
    }

    #[test]
    fn absent_history_loads_as_none() {
        let (_dir, store) = store();
        assert_eq!(store.load("compile:never-ran"), None);
    }

    #[test]
    fn corrupt_history_loads_as_none() {
        let (_dir, store) = store();
        store.save("compile:main", &history()).unwrap();

        let path = store.file_for("compile:main");
        fs::write(&path, b"definitely not cbor").unwrap();

        assert_eq!(store.load("compile:main"), None);
    }

    #[test]
    fn schema_mismatch_loads_as_none() {
        let (_dir, store) = store();

        let mut stale = history();
        stale.schema_version = SCHEMA_VERSION + 1;
        store.save("compile:main", &stale).unwrap();

        assert_eq!(store.load("compile:main"), None);
    }

    #[test]
    fn save_replaces_the_previous_value() {
        let (_dir, store) = store();

        let first = history();
        store.save("compile:main", &first).unwrap();

        let mut second = history();
        second.discovered.insert("b.c", "b.h");
        store.save("compile:main", &second).unwrap();

        assert_eq!(store.load("compile:main"), Some(second));
    }

    #[test]
    fn units_do_not_collide() {
        let (_dir, store) = store();
        store.save("compile:main", &history()).unwrap();

        assert_eq!(store.load("compile:other"), None);
    }
}
