use crate::topology::{detect_architecture, expected_redirect_target, worktree_depth};
use crate::{RedirectError, Result};
use std::path::{Component, Path, PathBuf};
use town_layout::{BEADS_DIR, MAYOR_DIR, REDIRECT_FILE};

/// Files copied from the town store into each redirected worktree store.
const SHARED_TOWN_FILES: &[&str] = &["routes.jsonl", "config.yaml"];

/// Write the correct redirect for a worktree, creating its `.beads` if needed.
///
/// Idempotent: the target is recomputed and rewritten on every call. Existing
/// files in the worktree store are left alone. Returns the written target.
pub fn setup_redirect(town_root: &Path, worktree: &Path) -> Result<String> {
    let rel = worktree
        .strip_prefix(town_root)
        .map_err(|_| RedirectError::InvalidWorktree {
            path: worktree.to_path_buf(),
            reason: format!("not under town {}", town_root.display()),
        })?;
    let parts: Vec<&std::ffi::OsStr> = rel
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .collect();
    if parts.len() < 2 {
        return Err(RedirectError::InvalidWorktree {
            path: worktree.to_path_buf(),
            reason: "must be at least 2 levels below the town root".to_string(),
        });
    }
    if parts[1] == MAYOR_DIR {
        return Err(RedirectError::CanonicalLocation(worktree.to_path_buf()));
    }

    let rig_root: PathBuf = town_root.join(parts[0]);
    let Some(architecture) = detect_architecture(&rig_root)? else {
        return Err(RedirectError::NoBeads(rig_root));
    };
    let depth = worktree_depth(&rig_root, worktree)?;
    let target = expected_redirect_target(depth, &architecture);

    let beads = worktree.join(BEADS_DIR);
    std::fs::create_dir_all(&beads)?;
    std::fs::write(beads.join(REDIRECT_FILE), format!("{target}\n"))?;
    log::info!("Redirect {} -> {target}", beads.display());

    let town_beads = town_root.join(BEADS_DIR);
    for name in SHARED_TOWN_FILES {
        let source = town_beads.join(name);
        if !source.is_file() {
            continue;
        }
        if let Err(err) = std::fs::copy(&source, beads.join(name)) {
            log::warn!("Failed to copy {} into {}: {err}", name, beads.display());
        }
    }

    Ok(target)
}
