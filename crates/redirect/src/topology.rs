use crate::resolve::{follow_redirects, lexical_clean, read_redirect_file, read_redirect_target};
use crate::{RedirectError, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use town_layout::{rig_worktrees, BEADS_DIR, TRACKED_BEADS_PATH};

/// Where a rig keeps its canonical store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BeadsArchitecture {
    /// `mayor/rig/.beads` holds the real store; worktrees point there directly.
    Tracked,
    /// The rig root store is canonical. When it redirects further, worktrees
    /// inline that target instead of chaining through the rig root.
    Local { rig_redirect: Option<String> },
}

/// Inspect a rig root. `None` when the rig has no store at all.
pub fn detect_architecture(rig_root: &Path) -> Result<Option<BeadsArchitecture>> {
    let tracked = rig_root.join(TRACKED_BEADS_PATH);
    if tracked.is_dir() && read_redirect_file(&tracked)?.is_none() {
        return Ok(Some(BeadsArchitecture::Tracked));
    }
    let rig_beads = rig_root.join(BEADS_DIR);
    if rig_beads.is_dir() {
        return Ok(Some(BeadsArchitecture::Local {
            rig_redirect: read_redirect_file(&rig_beads)?,
        }));
    }
    Ok(None)
}

/// Number of path components from the rig root down to the worktree.
pub fn worktree_depth(rig_root: &Path, worktree: &Path) -> Result<usize> {
    let rel = worktree
        .strip_prefix(rig_root)
        .map_err(|_| RedirectError::InvalidWorktree {
            path: worktree.to_path_buf(),
            reason: format!("not under rig {}", rig_root.display()),
        })?;
    let depth = rel.components().count();
    if depth == 0 {
        return Err(RedirectError::InvalidWorktree {
            path: worktree.to_path_buf(),
            reason: "worktree is the rig root".to_string(),
        });
    }
    Ok(depth)
}

/// Redirect content a worktree at `depth` below its rig should carry.
pub fn expected_redirect_target(depth: usize, architecture: &BeadsArchitecture) -> String {
    let up = "../".repeat(depth);
    match architecture {
        BeadsArchitecture::Tracked => format!("{up}{TRACKED_BEADS_PATH}"),
        BeadsArchitecture::Local {
            rig_redirect: Some(target),
        } => format!("{up}{target}"),
        BeadsArchitecture::Local { rig_redirect: None } => format!("{up}{BEADS_DIR}"),
    }
}

/// Canonical form for comparing two redirect targets.
pub fn normalize_redirect_path(path: &str) -> String {
    let path = path.trim().replace('\\', "/");
    path.trim_end_matches('/').to_string()
}

/// Whether a redirect that differs textually from the expected one still lands
/// on the canonical store.
///
/// Tracked rigs accept any target whose chain ends at `mayor/rig/.beads`.
/// Local rigs accept only a target that resolves exactly to the rig store.
pub fn is_valid_redirect(
    rig_root: &Path,
    worktree: &Path,
    target: &str,
    architecture: &BeadsArchitecture,
) -> bool {
    let resolved = lexical_clean(&worktree.join(normalize_redirect_path(target)));
    match architecture {
        BeadsArchitecture::Tracked => {
            let canonical = lexical_clean(&rig_root.join(TRACKED_BEADS_PATH));
            match follow_redirects(&resolved) {
                Ok(final_dest) => final_dest == canonical,
                Err(err) => {
                    log::debug!("Redirect chain from {} is broken: {err}", worktree.display());
                    false
                }
            }
        }
        BeadsArchitecture::Local { .. } => resolved == lexical_clean(&rig_root.join(BEADS_DIR)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RedirectIssueKind {
    Missing,
    Incorrect,
}

/// One worktree whose redirect is missing or points somewhere wrong.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RedirectIssue {
    pub worktree_path: PathBuf,
    pub town_root: PathBuf,
    /// Empty when the worktree has no redirect.
    pub current_target: String,
    pub expected_target: String,
}

impl RedirectIssue {
    pub fn kind(&self) -> RedirectIssueKind {
        if self.current_target.is_empty() {
            RedirectIssueKind::Missing
        } else {
            RedirectIssueKind::Incorrect
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopologyReport {
    pub missing: Vec<RedirectIssue>,
    pub incorrect: Vec<RedirectIssue>,
}

impl TopologyReport {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.incorrect.is_empty()
    }

    pub fn len(&self) -> usize {
        self.missing.len() + self.incorrect.len()
    }

    pub fn issues(&self) -> impl Iterator<Item = &RedirectIssue> {
        self.missing.iter().chain(self.incorrect.iter())
    }

    pub fn extend(&mut self, other: TopologyReport) {
        self.missing.extend(other.missing);
        self.incorrect.extend(other.incorrect);
    }
}

/// Check every provisioned worktree of one rig against the expected redirect.
///
/// Worktrees without a `.beads` directory are skipped. Worktree order follows
/// the directory listing.
pub fn verify_rig_topology(town_root: &Path, rig_root: &Path) -> Result<TopologyReport> {
    let mut report = TopologyReport::default();
    let Some(architecture) = detect_architecture(rig_root)? else {
        log::debug!("Rig {} has no beads, skipping", rig_root.display());
        return Ok(report);
    };

    for worktree in rig_worktrees(rig_root) {
        let path = worktree.path;
        if !path.join(BEADS_DIR).is_dir() {
            continue;
        }
        let depth = worktree_depth(rig_root, &path)?;
        let expected = expected_redirect_target(depth, &architecture);
        let actual = read_redirect_target(&path);

        if actual.is_empty() {
            report.missing.push(RedirectIssue {
                worktree_path: path,
                town_root: town_root.to_path_buf(),
                current_target: String::new(),
                expected_target: expected,
            });
        } else if normalize_redirect_path(&actual) != normalize_redirect_path(&expected)
            && !is_valid_redirect(rig_root, &path, &actual, &architecture)
        {
            report.incorrect.push(RedirectIssue {
                worktree_path: path,
                town_root: town_root.to_path_buf(),
                current_target: actual,
                expected_target: expected,
            });
        }
    }
    Ok(report)
}
