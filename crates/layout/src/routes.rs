use crate::paths::routes_path;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// One line of `.beads/routes.jsonl`: issue-ID prefix to store path (relative to the town).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Route {
    pub prefix: String,
    pub path: String,
}

impl Route {
    /// Leading path component naming the rig, or `None` for routes to the town root.
    pub fn rig_name(&self) -> Option<&str> {
        let path = self.path.trim();
        if path.is_empty() || path == "." || path.starts_with('/') || path.starts_with("..") {
            return None;
        }
        let first = path.split(['/', '\\']).find(|part| !part.is_empty() && *part != ".")?;
        Some(first)
    }
}

/// Routes from the town routing index plus any lines that failed to parse.
#[derive(Debug, Clone, Default)]
pub struct RoutesFile {
    pub routes: Vec<Route>,
    pub skipped: Vec<String>,
}

/// Read the town routing index. A missing file yields an empty set.
pub fn load_routes(town_root: &Path) -> Result<RoutesFile> {
    let path = routes_path(town_root);
    let raw = match std::fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(RoutesFile::default()),
        Err(err) => return Err(err.into()),
    };
    Ok(parse_routes(&raw))
}

pub fn parse_routes(raw: &str) -> RoutesFile {
    let mut out = RoutesFile::default();
    for (idx, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Route>(line) {
            Ok(route) => out.routes.push(route),
            Err(err) => {
                log::warn!("Skipping malformed route on line {}: {err}", idx + 1);
                out.skipped.push(format!("line {}: {err}", idx + 1));
            }
        }
    }
    out
}

/// Prefixes routed to more than one distinct path, with their paths sorted.
pub fn find_conflicting_prefixes(routes: &[Route]) -> BTreeMap<String, Vec<String>> {
    let mut by_prefix: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for route in routes {
        by_prefix
            .entry(route.prefix.clone())
            .or_default()
            .insert(route.path.clone());
    }
    by_prefix
        .into_iter()
        .filter(|(_, paths)| paths.len() > 1)
        .map(|(prefix, paths)| (prefix, paths.into_iter().collect()))
        .collect()
}
