use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RedirectError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// A redirect chain revisits a store it already passed through.
    #[error("circular redirect: {redirect} points back to {target}")]
    Cycle { redirect: PathBuf, target: PathBuf },

    #[error("redirect chain from {start} exceeds {max_hops} hops")]
    ChainTooDeep { start: PathBuf, max_hops: usize },

    /// Cleanup guard: the store has no redirect file.
    #[error("no redirect file in {0}, refusing to clean")]
    NotRedirected(PathBuf),

    #[error("cannot create redirect in canonical beads location {0}")]
    CanonicalLocation(PathBuf),

    #[error("no beads found for rig at {0}")]
    NoBeads(PathBuf),

    #[error("invalid worktree path {path}: {reason}")]
    InvalidWorktree { path: PathBuf, reason: String },

    /// Per-file failures collected during a cleanup pass.
    #[error("{}", .0.join("; "))]
    Cleanup(Vec<String>),
}

pub type Result<T> = std::result::Result<T, RedirectError>;
