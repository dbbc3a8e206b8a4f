use crate::{RedirectError, Result};
use glob::Pattern;
use std::path::{Path, PathBuf};
use town_layout::REDIRECT_FILE;

/// Runtime artifacts that must not sit next to a redirect. `config.yaml` and
/// `routes.jsonl` are absent because they may be tracked.
pub const STALE_FILE_PATTERNS: &[&str] = &[
    "*.db",
    "*.db-*",
    "*.db?*",
    "issues.jsonl",
    "interactions.jsonl",
    "metadata.json",
    "sync-state.json",
    "last-touched",
    ".local_version",
    "daemon.lock",
    "daemon.log",
    "daemon.pid",
    "bd.sock",
];

fn compiled_patterns() -> Vec<Pattern> {
    STALE_FILE_PATTERNS
        .iter()
        .filter_map(|raw| match Pattern::new(raw) {
            Ok(pattern) => Some(pattern),
            Err(err) => {
                log::warn!("Invalid stale file pattern {raw}: {err}");
                None
            }
        })
        .collect()
}

pub fn is_stale_file_name(name: &str) -> bool {
    compiled_patterns()
        .iter()
        .any(|pattern| pattern.matches(name))
}

fn has_redirect(beads_dir: &Path) -> bool {
    beads_dir.join(REDIRECT_FILE).is_file()
}

/// Regular files in `beads_dir` matching the allow-list, sorted by name.
pub fn stale_files(beads_dir: &Path) -> Result<Vec<PathBuf>> {
    let patterns = compiled_patterns();
    let mut files = Vec::new();
    for entry in std::fs::read_dir(beads_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if name == REDIRECT_FILE {
            continue;
        }
        if patterns.iter().any(|pattern| pattern.matches(name)) {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// A store that carries a redirect and runtime data at the same time.
pub fn has_redirect_with_stale_files(beads_dir: &Path) -> bool {
    if !has_redirect(beads_dir) {
        return false;
    }
    match stale_files(beads_dir) {
        Ok(files) => !files.is_empty(),
        Err(err) => {
            log::warn!("Failed to scan {}: {err}", beads_dir.display());
            false
        }
    }
}

/// Remove allow-listed runtime files from a redirected store.
///
/// Refuses to run when `beads_dir` has no redirect file. The redirect is
/// checked again right before every removal. Individual failures do not stop
/// the pass; they are returned together.
pub fn clean_stale_files(beads_dir: &Path) -> Result<Vec<PathBuf>> {
    if !has_redirect(beads_dir) {
        return Err(RedirectError::NotRedirected(beads_dir.to_path_buf()));
    }

    let mut removed = Vec::new();
    let mut failures = Vec::new();
    for file in stale_files(beads_dir)? {
        if !has_redirect(beads_dir) {
            return Err(RedirectError::NotRedirected(beads_dir.to_path_buf()));
        }
        match std::fs::remove_file(&file) {
            Ok(()) => {
                log::debug!("Removed stale {}", file.display());
                removed.push(file);
            }
            Err(err) => failures.push(format!("removing {}: {err}", file.display())),
        }
    }

    if failures.is_empty() {
        Ok(removed)
    } else {
        Err(RedirectError::Cleanup(failures))
    }
}
