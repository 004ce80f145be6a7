use thiserror::Error;

/// Errors produced while turning filesystem state into a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Couldn't read file metadata or contents.\n{0}")]
    Io(#[from] std::io::Error),

    #[error("Couldn't compile glob pattern.\n{0}")]
    GlobPattern(#[from] glob::PatternError),

    #[error("Couldn't run glob.\n{0}")]
    Glob(#[from] glob::GlobError),

    #[error("Couldn't convert path to UTF-8.\n{0}")]
    PathFormat(#[from] camino::FromPathBufError),
}

/// Errors produced by a history store while persisting state.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct StoreError(#[from] std::io::Error);

/// Errors produced while processing a work unit end to end.
#[derive(Debug, Error)]
pub enum WorkError {
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error("Couldn't persist execution history.\n{0}")]
    Store(#[from] StoreError),

    #[error("Executor '{0}':\n{1}")]
    Executor(String, anyhow::Error),
}
