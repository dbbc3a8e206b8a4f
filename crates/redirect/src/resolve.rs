use crate::{RedirectError, Result};
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};
use town_layout::{BEADS_DIR, REDIRECT_FILE};

/// Maximum number of redirect files followed before giving up.
pub const MAX_REDIRECT_HOPS: usize = 3;

/// Resolve `.` and `..` components without touching the filesystem.
pub fn lexical_clean(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    if out.is_empty() {
        return PathBuf::from(".");
    }
    out.iter().collect()
}

/// Trimmed content of `<beads_dir>/redirect`, or `None` when absent or blank.
pub fn read_redirect_file(beads_dir: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(beads_dir.join(REDIRECT_FILE)) {
        Ok(raw) => {
            let target = raw.trim();
            Ok((!target.is_empty()).then(|| target.to_string()))
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Redirect target of a worktree's own store, empty when there is none.
pub fn read_redirect_target(worktree: &Path) -> String {
    read_redirect_file(&worktree.join(BEADS_DIR))
        .ok()
        .flatten()
        .unwrap_or_default()
}

/// Follow redirects starting at `<work_dir>/.beads` to the store that is actually used.
///
/// Each target is resolved relative to the directory that contains the
/// `.beads` holding the redirect. Cycles and chains longer than
/// [`MAX_REDIRECT_HOPS`] are errors.
pub fn resolve_beads_dir(work_dir: &Path) -> Result<PathBuf> {
    let work_dir = if work_dir.file_name() == Some(OsStr::new(BEADS_DIR)) {
        work_dir.parent().unwrap_or(work_dir)
    } else {
        work_dir
    };
    follow_redirects(&work_dir.join(BEADS_DIR))
}

/// Same as [`resolve_beads_dir`] but starting from a store directory.
pub fn follow_redirects(beads_dir: &Path) -> Result<PathBuf> {
    let start = lexical_clean(beads_dir);
    let mut current = start.clone();
    let mut visited = vec![current.clone()];

    for hop in 0..=MAX_REDIRECT_HOPS {
        let Some(target) = read_redirect_file(&current)? else {
            return Ok(current);
        };
        if hop == MAX_REDIRECT_HOPS {
            break;
        }
        let owner = current.parent().unwrap_or(Path::new("."));
        let next = lexical_clean(&owner.join(&target));
        if visited.contains(&next) {
            return Err(RedirectError::Cycle {
                redirect: current.join(REDIRECT_FILE),
                target: next,
            });
        }
        log::debug!("Redirect {} -> {}", current.display(), next.display());
        visited.push(next.clone());
        current = next;
    }

    Err(RedirectError::ChainTooDeep {
        start,
        max_hops: MAX_REDIRECT_HOPS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn redirect(dir: &Path, target: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(REDIRECT_FILE), format!("{target}\n")).unwrap();
    }

    #[test]
    fn lexical_clean_collapses_parent_segments() {
        assert_eq!(
            lexical_clean(Path::new("/town/rig/crew/max/../../.beads")),
            PathBuf::from("/town/rig/.beads")
        );
        assert_eq!(lexical_clean(Path::new("/../a/./b")), PathBuf::from("/a/b"));
        assert_eq!(lexical_clean(Path::new("../a/../../b")), PathBuf::from("../../b"));
        assert_eq!(lexical_clean(Path::new("a/..")), PathBuf::from("."));
    }

    #[test]
    fn blank_redirect_counts_as_missing() {
        let temp = tempfile::TempDir::new().expect("tempdir");
        let beads = temp.path().join(".beads");
        redirect(&beads, "   ");
        assert_eq!(read_redirect_file(&beads).unwrap(), None);
        assert_eq!(read_redirect_target(temp.path()), "");
    }

    #[test]
    fn unredirected_store_resolves_to_itself() {
        let temp = tempfile::TempDir::new().expect("tempdir");
        fs::create_dir_all(temp.path().join(".beads")).unwrap();
        assert_eq!(
            resolve_beads_dir(temp.path()).unwrap(),
            lexical_clean(&temp.path().join(".beads"))
        );
    }

    #[test]
    fn chain_is_followed_relative_to_worktree() {
        let temp = tempfile::TempDir::new().expect("tempdir");
        let rig = temp.path().join("rig");
        fs::create_dir_all(rig.join("mayor/rig/.beads")).unwrap();
        redirect(&rig.join(".beads"), "mayor/rig/.beads");
        redirect(&rig.join("crew/max/.beads"), "../../.beads");

        let resolved = resolve_beads_dir(&rig.join("crew/max/.beads")).unwrap();
        assert_eq!(resolved, lexical_clean(&rig.join("mayor/rig/.beads")));
    }

    #[test]
    fn self_redirect_is_a_cycle() {
        let temp = tempfile::TempDir::new().expect("tempdir");
        redirect(&temp.path().join(".beads"), ".beads");
        let err = resolve_beads_dir(temp.path()).unwrap_err();
        assert!(matches!(err, RedirectError::Cycle { .. }), "{err}");
    }

    #[test]
    fn two_store_loop_is_a_cycle() {
        let temp = tempfile::TempDir::new().expect("tempdir");
        redirect(&temp.path().join("a/.beads"), "../b/.beads");
        redirect(&temp.path().join("b/.beads"), "../a/.beads");
        let err = resolve_beads_dir(&temp.path().join("a")).unwrap_err();
        assert!(matches!(err, RedirectError::Cycle { .. }), "{err}");
    }

    #[test]
    fn chain_longer_than_limit_is_rejected() {
        let temp = tempfile::TempDir::new().expect("tempdir");
        for (from, to) in [("a", "b"), ("b", "c"), ("c", "d"), ("d", "e")] {
            redirect(&temp.path().join(from).join(".beads"), &format!("../{to}/.beads"));
        }
        fs::create_dir_all(temp.path().join("e/.beads")).unwrap();

        let err = resolve_beads_dir(&temp.path().join("a")).unwrap_err();
        assert!(matches!(err, RedirectError::ChainTooDeep { max_hops: 3, .. }), "{err}");

        let resolved = resolve_beads_dir(&temp.path().join("b")).unwrap();
        assert_eq!(resolved, lexical_clean(&temp.path().join("e/.beads")));
    }
}
