//! # Town Redirect
//!
//! Redirect resolution, topology verification and repair for `.beads` stores.
//!
//! ```text
//! <rig>/crew/max/.beads/redirect  ──>  ../../.beads           (local store)
//! <rig>/crew/max/.beads/redirect  ──>  ../../mayor/rig/.beads (tracked store)
//! ```
//!
//! Targets are resolved relative to the worktree, never to the `.beads`
//! directory that holds the redirect file. Chains are followed for at most
//! [`MAX_REDIRECT_HOPS`] hops.

mod error;
mod resolve;
mod setup;
mod stale;
mod topology;

pub use error::{RedirectError, Result};
pub use resolve::{
    follow_redirects, lexical_clean, read_redirect_file, read_redirect_target,
    resolve_beads_dir, MAX_REDIRECT_HOPS,
};
pub use setup::setup_redirect;
pub use stale::{
    clean_stale_files, has_redirect_with_stale_files, is_stale_file_name, stale_files,
    STALE_FILE_PATTERNS,
};
pub use topology::{
    detect_architecture, expected_redirect_target, is_valid_redirect, normalize_redirect_path,
    verify_rig_topology, worktree_depth, BeadsArchitecture, RedirectIssue, RedirectIssueKind,
    TopologyReport,
};
