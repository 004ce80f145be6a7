//! End-to-end processing of a single work unit.
//!
//! This module ties the collaborators together the way a build tool would:
//! load the previous execution history, snapshot and fingerprint the
//! declared inputs and the previously discovered dependencies, decide how
//! much to recompute, run the executor, and record a fresh history. Work
//! units are independent; processing them from parallel workers is safe as
//! long as they share one [`DigestCache`].

use camino::{Utf8Path, Utf8PathBuf};

use crate::cache::DigestCache;
use crate::discovered::DiscoveredDeps;
use crate::engine::{Decision, ExecutionHistory, decide};
use crate::error::{SnapshotError, StoreError, WorkError};
use crate::fingerprint::{Fingerprint, fingerprint};
use crate::normalize::Normalizer;
use crate::snapshot::Snapshot;

/// Normalization applied to discovered dependency paths. Absolute, so two
/// distinct dependencies can never collapse into one key.
const DISCOVERED: Normalizer = Normalizer::absolute();

/// Supplies and receives [`ExecutionHistory`] values keyed by work unit.
///
/// Implementations own the serialization format and storage location, and
/// must report absent, corrupt, or schema-mismatched state as `None` from
/// [`load`](Self::load), never as an error.
pub trait HistoryStore {
    fn load(&self, unit: &str) -> Option<ExecutionHistory>;

    /// Replaces the stored history for `unit` with a new value.
    fn save(&self, unit: &str, history: &ExecutionHistory) -> Result<(), StoreError>;
}

/// The tool that performs the actual work.
pub trait Executor {
    /// Whether this executor can recompute a subset of its inputs. Tools
    /// that cannot are always handed full rebuilds.
    fn supports_incremental(&self) -> bool;

    /// Performs the work and reports every dependency discovered while
    /// doing it.
    fn execute(&self, invocation: &Invocation<'_>) -> anyhow::Result<DiscoveredDeps>;
}

/// Everything an executor is told about one run.
#[derive(Debug)]
pub struct Invocation<'a> {
    pub decision: Decision,
    /// Elements to recompute; the full input set on full rebuilds.
    pub changed: &'a [Utf8PathBuf],
    /// Discovered dependencies from the previous run, for mapping changed
    /// dependencies back to the producers that revealed them. Empty on
    /// full rebuilds.
    pub prior_discovered: &'a DiscoveredDeps,
}

/// A declared unit of build work.
#[derive(Debug, Clone)]
pub struct WorkUnit<'a> {
    /// Stable identity used to key persisted history.
    pub name: &'a str,
    /// Root against which relative paths normalize.
    pub root: &'a Utf8Path,
    /// Declared input files, in declaration order.
    pub inputs: &'a [Utf8PathBuf],
    /// Normalization policy for the declared inputs.
    pub normalizer: Normalizer,
}

/// The result of processing one work unit.
#[derive(Debug)]
pub struct Outcome {
    pub decision: Decision,
    /// Whether the executor ran.
    pub executed: bool,
    /// The history now current for this unit: freshly recorded when the
    /// executor ran, carried over verbatim when up to date.
    pub history: ExecutionHistory,
}

/// Processes one work unit end to end.
///
/// When the decision is [`Decision::UpToDate`] the executor is skipped and
/// nothing is written. Otherwise the executor runs, its discovered
/// dependencies are fingerprinted, and the new history replaces the old
/// one in the store. An executor failure propagates and leaves the stored
/// history untouched, so the next run repeats the decision.
pub fn process(
    unit: &WorkUnit<'_>,
    store: &dyn HistoryStore,
    executor: &dyn Executor,
    cache: &DigestCache,
) -> Result<Outcome, WorkError> {
    let span = tracing::span!(tracing::Level::INFO, "work_unit", name = unit.name);
    let _enter = span.enter();

    let history = store.load(unit.name);

    let snapshot = Snapshot::of_files(unit.root, unit.inputs, cache)?;
    let inputs = fingerprint(&snapshot, unit.normalizer);

    let discovered_inputs = match &history {
        Some(history) => fingerprint_discovered(unit.root, &history.discovered, cache)?,
        None => Fingerprint::empty(DISCOVERED),
    };

    let evaluation = decide(
        history.as_ref(),
        &inputs,
        &discovered_inputs,
        executor.supports_incremental(),
    );
    tracing::info!(
        decision = ?evaluation.decision,
        changed = evaluation.changed.len(),
        "evaluated"
    );

    if evaluation.decision == Decision::UpToDate {
        let history = history.expect("up-to-date decisions require a history");
        return Ok(Outcome {
            decision: Decision::UpToDate,
            executed: false,
            history,
        });
    }

    let invocation = Invocation {
        decision: evaluation.decision,
        changed: &evaluation.changed,
        prior_discovered: &evaluation.carried,
    };
    let discovered = executor
        .execute(&invocation)
        .map_err(|e| WorkError::Executor(unit.name.to_owned(), e))?;

    let discovered_inputs = fingerprint_discovered(unit.root, &discovered, cache)?;
    let history = ExecutionHistory::new(inputs, discovered, discovered_inputs);
    store.save(unit.name, &history)?;

    Ok(Outcome {
        decision: evaluation.decision,
        executed: true,
        history,
    })
}

/// Fingerprints the current on-disk state of a discovered dependency set.
///
/// Dependencies that vanished since they were discovered drop out of the
/// fingerprint entirely, so the differ reports them as removed.
fn fingerprint_discovered(
    root: &Utf8Path,
    discovered: &DiscoveredDeps,
    cache: &DigestCache,
) -> Result<Fingerprint, SnapshotError> {
    let paths = discovered.dependencies();
    let snapshot = Snapshot::of_files(root, &paths, cache)?.without_missing();
    Ok(fingerprint(&snapshot, DISCOVERED))
}
