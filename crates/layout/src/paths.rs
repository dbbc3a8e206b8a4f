use crate::{LayoutError, Result};
use std::path::{Path, PathBuf};

/// Name of the per-directory issue store.
pub const BEADS_DIR: &str = ".beads";
/// Pointer file inside a store directory that delegates to another store.
pub const REDIRECT_FILE: &str = "redirect";
/// Management tenant at the town root.
pub const MAYOR_DIR: &str = "mayor";
pub const TOWN_MARKER_FILE: &str = "town.json";
pub const RIGS_REGISTRY_FILE: &str = "rigs.json";
pub const ROUTES_FILE: &str = "routes.jsonl";
pub const RIG_MANIFEST_FILE: &str = "config.json";
/// Canonical store of a rig using the tracked-store architecture, relative to the rig root.
pub const TRACKED_BEADS_PATH: &str = "mayor/rig/.beads";

/// Top-level names that never denote a rig or a worktree.
pub const RESERVED_NAMES: &[&str] = &[MAYOR_DIR, BEADS_DIR, ".git", "docs"];

/// Hidden names, management directories and anything that is not a single path component.
pub fn is_reserved_name(name: &str) -> bool {
    name.starts_with('.') || name.contains(['/', '\\']) || RESERVED_NAMES.contains(&name)
}

pub fn beads_dir(dir: &Path) -> PathBuf {
    dir.join(BEADS_DIR)
}

pub fn redirect_file(dir: &Path) -> PathBuf {
    dir.join(BEADS_DIR).join(REDIRECT_FILE)
}

pub fn registry_path(town_root: &Path) -> PathBuf {
    town_root.join(MAYOR_DIR).join(RIGS_REGISTRY_FILE)
}

pub fn routes_path(town_root: &Path) -> PathBuf {
    town_root.join(BEADS_DIR).join(ROUTES_FILE)
}

pub fn tracked_beads_dir(rig_root: &Path) -> PathBuf {
    rig_root.join(TRACKED_BEADS_PATH)
}

/// Walk up from `start` to the nearest directory that looks like a town root.
pub fn find_town_root(start: &Path) -> Result<PathBuf> {
    for dir in start.ancestors() {
        let mayor = dir.join(MAYOR_DIR);
        if mayor.join(TOWN_MARKER_FILE).is_file() || mayor.join(RIGS_REGISTRY_FILE).is_file() {
            return Ok(dir.to_path_buf());
        }
    }
    Err(LayoutError::TownNotFound(start.to_path_buf()))
}
