//! The incremental-vs-full decision engine.
//!
//! One decision is made per work-unit evaluation, from three ingredients:
//! the delta of the declared inputs against the previous run, the delta of
//! the previously discovered dependencies against their state on disk now,
//! and whether the executor can recompute a subset of its inputs at all.

use std::collections::BTreeSet;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::diff::{ChangeSet, diff};
use crate::discovered::DiscoveredDeps;
use crate::fingerprint::Fingerprint;
use crate::snapshot::FileKind;

/// Version of the persisted [`ExecutionHistory`] schema. A mismatch is
/// always treated as having no history at all, never as an error.
pub const SCHEMA_VERSION: u32 = 1;

/// Everything remembered about a work unit's last execution.
///
/// Produced here, persisted elsewhere: a history store owns serialization
/// and replaces the stored value atomically after a successful execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionHistory {
    pub schema_version: u32,
    /// Fingerprint of the declared inputs at the end of the last run.
    pub inputs: Fingerprint,
    /// Dependencies the executor discovered during the last run.
    pub discovered: DiscoveredDeps,
    /// The discovered dependency paths fingerprinted at record time, so the
    /// next evaluation can diff them like any other input set.
    pub discovered_inputs: Fingerprint,
}

impl ExecutionHistory {
    pub fn new(
        inputs: Fingerprint,
        discovered: DiscoveredDeps,
        discovered_inputs: Fingerprint,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            inputs,
            discovered,
            discovered_inputs,
        }
    }
}

/// Terminal decision for one work-unit evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    /// Nothing usable is known about the previous run; treated exactly like
    /// [`Decision::FullRebuild`].
    NoHistory,
    /// Prior output remains valid; execution is skipped.
    UpToDate,
    /// Only the changed elements need recomputation.
    Incremental,
    /// Everything is recomputed and prior discovered dependencies are
    /// discarded.
    FullRebuild,
}

impl Decision {
    /// Whether the executor runs at all.
    pub fn requires_execution(self) -> bool {
        !matches!(self, Decision::UpToDate)
    }

    /// Whether the executor must process the full input set.
    pub fn is_full(self) -> bool {
        matches!(self, Decision::NoHistory | Decision::FullRebuild)
    }
}

/// The decision plus everything the executor needs to act on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub decision: Decision,
    /// Raw paths the executor must treat as changed: the full input set on
    /// full rebuilds, the added + modified union otherwise, empty when up
    /// to date.
    pub changed: Vec<Utf8PathBuf>,
    /// Discovered dependencies carried into execution. Empty on full
    /// rebuilds, where stale producer mappings would be misleading.
    pub carried: DiscoveredDeps,
    /// Delta of the declared inputs, for reporting.
    pub input_changes: ChangeSet,
    /// Delta of the previously discovered dependencies, for reporting.
    pub discovered_changes: ChangeSet,
}

/// Decides how much of a work unit must be re-executed.
///
/// `inputs` fingerprints the declared inputs as they are now.
/// `discovered_inputs` fingerprints the *previously* discovered dependency
/// paths as they are now, so changes to them are observed even though no
/// one declared them. Histories recorded under a different schema version
/// or input normalizer are discarded as unusable rather than compared.
///
/// The rules, evaluated in order:
///
/// 1. no usable history → [`Decision::NoHistory`]
/// 2. both deltas empty → [`Decision::UpToDate`]; the prior discovered set
///    is carried forward verbatim
/// 3. the executor cannot work incrementally, or either delta has a
///    structural change (removals, reordering) → [`Decision::FullRebuild`]
/// 4. otherwise → [`Decision::Incremental`] over the union of both deltas'
///    added and modified paths
///
/// Removal forces a full rebuild because a fingerprint diff alone cannot
/// prove that removing an input leaves unrelated outputs valid; additions
/// and modifications can be scoped to the producers they affect.
pub fn decide(
    history: Option<&ExecutionHistory>,
    inputs: &Fingerprint,
    discovered_inputs: &Fingerprint,
    supports_incremental: bool,
) -> Evaluation {
    let history = history.filter(|h| {
        h.schema_version == SCHEMA_VERSION && h.inputs.normalizer() == inputs.normalizer()
    });

    let Some(history) = history else {
        tracing::info!("no usable execution history, rebuilding everything");
        return Evaluation {
            decision: Decision::NoHistory,
            changed: full_set(inputs),
            carried: DiscoveredDeps::new(),
            input_changes: diff(None, inputs),
            discovered_changes: diff(None, discovered_inputs),
        };
    };

    let input_changes = diff(Some(&history.inputs), inputs);
    let discovered_changes = diff(Some(&history.discovered_inputs), discovered_inputs);

    if input_changes.is_empty() && discovered_changes.is_empty() {
        return Evaluation {
            decision: Decision::UpToDate,
            changed: Vec::new(),
            carried: history.discovered.clone(),
            input_changes,
            discovered_changes,
        };
    }

    if !supports_incremental
        || input_changes.has_structural_change()
        || discovered_changes.has_structural_change()
    {
        tracing::info!(
            removed = input_changes.removed.len() + discovered_changes.removed.len(),
            supports_incremental,
            "structural change, rebuilding everything"
        );
        return Evaluation {
            decision: Decision::FullRebuild,
            changed: full_set(inputs),
            carried: DiscoveredDeps::new(),
            input_changes,
            discovered_changes,
        };
    }

    let changed: BTreeSet<Utf8PathBuf> = input_changes
        .added
        .iter()
        .chain(&input_changes.modified)
        .chain(&discovered_changes.added)
        .chain(&discovered_changes.modified)
        .map(|change| change.path.clone())
        .collect();

    Evaluation {
        decision: Decision::Incremental,
        changed: changed.into_iter().collect(),
        carried: history.discovered.clone(),
        input_changes,
        discovered_changes,
    }
}

/// The full current input set as raw paths, absent inputs excluded.
fn full_set(inputs: &Fingerprint) -> Vec<Utf8PathBuf> {
    inputs
        .iter()
        .filter(|entry| entry.kind != FileKind::Missing)
        .map(|entry| entry.path.clone())
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fingerprint::fingerprint;
    use crate::hash::Hash32;
    use crate::normalize::Normalizer;
    use crate::snapshot::{FileKind, Snapshot, SnapshotEntry};
    use camino::Utf8PathBuf;

    const ROOT: &str = "/work";

    fn entry(path: &str, content: &str) -> SnapshotEntry {
        SnapshotEntry {
            path: Utf8PathBuf::from(format!("{ROOT}/{path}")),
            kind: FileKind::File,
            len: content.len() as u64,
            mtime: None,
            digest: Some(Hash32::hash(content)),
        }
    }

    fn fp(files: &[(&str, &str)]) -> Fingerprint {
        let entries = files.iter().map(|(p, c)| entry(p, c)).collect();
        let snapshot = Snapshot::from_entries(Utf8PathBuf::from(ROOT), entries);
        fingerprint(&snapshot, Normalizer::relative())
    }

    fn history(inputs: &[(&str, &str)], discovered: &[(&str, &str)]) -> ExecutionHistory {
        let mut deps = DiscoveredDeps::new();
        for (producer, _) in inputs {
            for (dep, _) in discovered {
                deps.insert(format!("{ROOT}/{producer}"), format!("{ROOT}/{dep}"));
            }
        }
        ExecutionHistory::new(fp(inputs), deps, fp(discovered))
    }

    #[test]
    fn unchanged_inputs_are_up_to_date() {
        let h = history(&[("a.c", "h1")], &[("a.h", "h2")]);

        let eval = decide(Some(&h), &fp(&[("a.c", "h1")]), &fp(&[("a.h", "h2")]), true);
        assert_eq!(eval.decision, Decision::UpToDate);
        assert!(eval.changed.is_empty());
        assert_eq!(eval.carried, h.discovered);
    }

    #[test]
    fn no_history_rebuilds_everything() {
        let eval = decide(
            None,
            &fp(&[("a.c", "h1"), ("b.c", "h2")]),
            &fp(&[]),
            true,
        );

        assert_eq!(eval.decision, Decision::NoHistory);
        assert!(eval.decision.requires_execution());
        assert!(eval.decision.is_full());
        assert_eq!(
            eval.changed,
            vec![
                Utf8PathBuf::from("/work/a.c"),
                Utf8PathBuf::from("/work/b.c")
            ]
        );
        assert!(eval.carried.is_empty());
    }

    #[test]
    fn schema_mismatch_counts_as_no_history() {
        let mut h = history(&[("a.c", "h1")], &[]);
        h.schema_version = SCHEMA_VERSION + 1;

        let eval = decide(Some(&h), &fp(&[("a.c", "h1")]), &fp(&[]), true);
        assert_eq!(eval.decision, Decision::NoHistory);
    }

    #[test]
    fn normalizer_change_counts_as_no_history() {
        let h = history(&[("a.c", "h1")], &[]);

        let entries = vec![entry("a.c", "h1")];
        let snapshot = Snapshot::from_entries(Utf8PathBuf::from(ROOT), entries);
        let absolute = fingerprint(&snapshot, Normalizer::absolute());

        let eval = decide(Some(&h), &absolute, &fp(&[]), true);
        assert_eq!(eval.decision, Decision::NoHistory);
    }

    #[test]
    fn modified_discovered_dependency_is_incremental() {
        // History: inputs {a.c: h1}, discovered {a.c -> {a.h}} with a.h at
        // h2. Now a.c is unchanged and a.h changed to h3.
        let h = history(&[("a.c", "h1")], &[("a.h", "h2")]);

        let eval = decide(Some(&h), &fp(&[("a.c", "h1")]), &fp(&[("a.h", "h3")]), true);
        assert_eq!(eval.decision, Decision::Incremental);
        assert!(eval.input_changes.is_empty());
        assert_eq!(eval.discovered_changes.modified.len(), 1);
        assert_eq!(eval.changed, vec![Utf8PathBuf::from("/work/a.h")]);
        assert_eq!(eval.carried, h.discovered);
    }

    #[test]
    fn modified_input_is_incremental_with_scoped_changes() {
        let h = history(&[("a.c", "h1"), ("b.c", "h2")], &[]);

        let eval = decide(
            Some(&h),
            &fp(&[("a.c", "h1*"), ("b.c", "h2")]),
            &fp(&[]),
            true,
        );
        assert_eq!(eval.decision, Decision::Incremental);
        assert_eq!(eval.changed, vec![Utf8PathBuf::from("/work/a.c")]);
    }

    #[test]
    fn removed_input_forces_full_rebuild() {
        // b.c is gone; everything else is byte-identical to history.
        let h = history(&[("a.c", "h1"), ("b.c", "h2")], &[]);

        let eval = decide(Some(&h), &fp(&[("a.c", "h1")]), &fp(&[]), true);
        assert_eq!(eval.decision, Decision::FullRebuild);
        assert_eq!(eval.changed, vec![Utf8PathBuf::from("/work/a.c")]);
        assert!(eval.carried.is_empty());
    }

    #[test]
    fn removed_input_wins_over_other_changes() {
        let h = history(&[("a.c", "h1"), ("b.c", "h2")], &[]);

        let eval = decide(
            Some(&h),
            &fp(&[("a.c", "h1*"), ("c.c", "h3")]),
            &fp(&[]),
            true,
        );
        assert_eq!(eval.decision, Decision::FullRebuild);
    }

    #[test]
    fn removed_discovered_dependency_forces_full_rebuild() {
        let h = history(&[("a.c", "h1")], &[("a.h", "h2")]);

        let eval = decide(Some(&h), &fp(&[("a.c", "h1")]), &fp(&[]), true);
        assert_eq!(eval.decision, Decision::FullRebuild);
        assert!(eval.carried.is_empty());
    }

    #[test]
    fn non_incremental_executor_forces_full_rebuild() {
        let h = history(&[("a.c", "h1")], &[]);

        let eval = decide(Some(&h), &fp(&[("a.c", "h1*")]), &fp(&[]), false);
        assert_eq!(eval.decision, Decision::FullRebuild);
    }

    #[test]
    fn changed_set_unions_and_deduplicates() {
        let h = history(&[("a.c", "h1")], &[("a.c", "h1"), ("a.h", "h2")]);

        // a.c appears in both deltas; it must show up once.
        let eval = decide(
            Some(&h),
            &fp(&[("a.c", "h1*")]),
            &fp(&[("a.c", "h1*"), ("a.h", "h2*")]),
            true,
        );
        assert_eq!(eval.decision, Decision::Incremental);
        assert_eq!(
            eval.changed,
            vec![
                Utf8PathBuf::from("/work/a.c"),
                Utf8PathBuf::from("/work/a.h")
            ]
        );
    }
}
