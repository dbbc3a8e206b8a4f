use crate::paths::BEADS_DIR;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const CREW_DIR: &str = "crew";
pub const POLECATS_DIR: &str = "polecats";
pub const REFINERY_DIR: &str = "refinery";

/// Role that owns a worktree under a rig.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorktreeRole {
    Crew,
    Polecat,
    Refinery,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Worktree {
    pub role: WorktreeRole,
    pub path: PathBuf,
}

/// Every per-role worktree of a rig that should carry a redirect.
///
/// Polecats may use the nested layout `polecats/<name>/<rig>/`; when that
/// clone exists it is the worktree instead of `polecats/<name>/`.
pub fn rig_worktrees(rig_root: &Path) -> Vec<Worktree> {
    let mut out = Vec::new();

    for path in child_dirs(&rig_root.join(CREW_DIR)) {
        out.push(Worktree {
            role: WorktreeRole::Crew,
            path,
        });
    }

    let rig_name = rig_root.file_name().map(|name| name.to_os_string());
    for path in child_dirs(&rig_root.join(POLECATS_DIR)) {
        let nested = rig_name.as_ref().map(|name| path.join(name));
        let path = match nested {
            Some(nested) if nested.is_dir() => nested,
            _ => path,
        };
        out.push(Worktree {
            role: WorktreeRole::Polecat,
            path,
        });
    }

    let refinery = rig_root.join(REFINERY_DIR).join("rig");
    if refinery.is_dir() {
        out.push(Worktree {
            role: WorktreeRole::Refinery,
            path: refinery,
        });
    }

    out
}

/// Store directories under a rig that may hold stale data next to a redirect:
/// the rig root store plus every worktree store that exists.
pub fn beads_dirs_to_check(rig_root: &Path) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    let rig_beads = rig_root.join(BEADS_DIR);
    if rig_beads.is_dir() {
        dirs.push(rig_beads);
    }
    for worktree in rig_worktrees(rig_root) {
        let beads = worktree.path.join(BEADS_DIR);
        if beads.is_dir() {
            dirs.push(beads);
        }
    }
    dirs
}

fn child_dirs(dir: &Path) -> Vec<PathBuf> {
    if !dir.is_dir() {
        return Vec::new();
    }
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                log::warn!("Failed to list {}: {err}", dir.display());
                None
            }
        })
        .filter(|entry| entry.file_type().is_dir())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| !name.starts_with('.'))
        })
        .map(|entry| entry.into_path())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    #[test]
    fn worktrees_cover_crew_polecats_and_refinery() {
        let temp = tempfile::TempDir::new().expect("tempdir");
        let rig = temp.path().join("gastown");
        for dir in [
            "crew/max",
            "crew/.claude",
            "polecats/toast",
            "polecats/nux/gastown",
            "refinery/rig",
        ] {
            fs::create_dir_all(rig.join(dir)).unwrap();
        }
        fs::write(rig.join("crew/notes.txt"), "x").unwrap();

        let paths: Vec<PathBuf> = rig_worktrees(&rig).into_iter().map(|w| w.path).collect();
        assert_eq!(
            paths,
            vec![
                rig.join("crew/max"),
                rig.join("polecats/nux/gastown"),
                rig.join("polecats/toast"),
                rig.join("refinery/rig"),
            ]
        );
    }

    #[test]
    fn beads_dirs_include_only_existing_stores() {
        let temp = tempfile::TempDir::new().expect("tempdir");
        let rig = temp.path().join("gastown");
        fs::create_dir_all(rig.join(".beads")).unwrap();
        fs::create_dir_all(rig.join("crew/max/.beads")).unwrap();
        fs::create_dir_all(rig.join("crew/joe")).unwrap();

        assert_eq!(
            beads_dirs_to_check(&rig),
            vec![rig.join(".beads"), rig.join("crew/max/.beads")]
        );
    }

    #[test]
    fn missing_rig_has_no_worktrees() {
        let temp = tempfile::TempDir::new().expect("tempdir");
        assert!(rig_worktrees(&temp.path().join("nope")).is_empty());
    }
}
