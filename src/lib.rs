#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

mod cache;
mod diff;
mod discovered;
mod engine;
mod error;
mod fingerprint;
mod hash;
mod normalize;
mod snapshot;
mod store;
mod work;

pub use crate::cache::DigestCache;
pub use crate::diff::{Change, ChangeSet, diff};
pub use crate::discovered::DiscoveredDeps;
pub use crate::engine::{Decision, Evaluation, ExecutionHistory, SCHEMA_VERSION, decide};
pub use crate::error::{SnapshotError, StoreError, WorkError};
pub use crate::fingerprint::{Collision, Fingerprint, PathEntry, fingerprint};
pub use crate::hash::Hash32;
pub use crate::normalize::{DirectorySensitivity, Normalizer, OrderSensitivity, PathSensitivity};
pub use crate::snapshot::{FileKind, Snapshot, SnapshotEntry};
pub use crate::store::CborHistoryStore;
pub use crate::work::{Executor, HistoryStore, Invocation, Outcome, WorkUnit, process};

/// Initializes a `tracing` subscriber reading the `RUST_LOG` environment
/// filter. A convenience for binaries embedding the library; libraries
/// should leave subscriber setup to their host.
#[cfg(feature = "logging")]
pub fn init_logging() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{EnvFilter, fmt};

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();
}
