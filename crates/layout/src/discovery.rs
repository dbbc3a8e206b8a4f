use crate::paths::{is_reserved_name, BEADS_DIR, RIG_MANIFEST_FILE};
use crate::registry::load_registry;
use crate::routes::load_routes;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Which independent sources observed a rig.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RigSources(u8);

impl RigSources {
    pub const REGISTRY: RigSources = RigSources(1 << 0);
    pub const ROUTES: RigSources = RigSources(1 << 1);
    pub const BEADS_DIR: RigSources = RigSources(1 << 2);
    pub const MANIFEST: RigSources = RigSources(1 << 3);

    const LABELS: [(RigSources, &'static str); 4] = [
        (Self::REGISTRY, "registry"),
        (Self::ROUTES, "routes"),
        (Self::BEADS_DIR, "beads"),
        (Self::MANIFEST, "manifest"),
    ];

    pub const fn empty() -> Self {
        RigSources(0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: RigSources) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: RigSources) {
        self.0 |= other.0;
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn labels(self) -> Vec<&'static str> {
        Self::LABELS
            .iter()
            .filter(|(bit, _)| self.contains(*bit))
            .map(|(_, label)| *label)
            .collect()
    }
}

impl std::ops::BitOr for RigSources {
    type Output = RigSources;

    fn bitor(self, rhs: Self) -> Self {
        RigSources(self.0 | rhs.0)
    }
}

impl fmt::Display for RigSources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.labels().join("+"))
    }
}

impl Serialize for RigSources {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.labels())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredRig {
    pub name: String,
    pub path: PathBuf,
    pub sources: RigSources,
}

impl DiscoveredRig {
    pub fn is_registered(&self) -> bool {
        self.sources.contains(RigSources::REGISTRY)
    }
}

/// Reconciled view of every rig in a town.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RigDiscovery {
    /// Accepted rigs, sorted by name.
    pub rigs: Vec<DiscoveredRig>,
    /// Rigs found on disk or in routes but missing from the registry, sorted by name.
    pub conflicts: Vec<DiscoveredRig>,
    /// Registered names whose directory does not exist.
    pub stale_registry: Vec<String>,
    /// Sources that could not be read.
    pub warnings: Vec<String>,
}

impl RigDiscovery {
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rigs.iter().map(|rig| rig.name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&DiscoveredRig> {
        self.rigs.iter().find(|rig| rig.name == name)
    }
}

/// Enumerate rigs from the registry, the routing index and two structural scans.
///
/// A candidate is accepted only when `<town>/<name>` is a directory. The
/// registry is the trust anchor: anything accepted without its bit is a conflict.
pub fn discover_rigs(town_root: &Path) -> RigDiscovery {
    let mut seen: BTreeMap<String, RigSources> = BTreeMap::new();
    let mut warnings = Vec::new();

    match load_registry(town_root) {
        Ok(Some(registry)) => {
            for name in registry.names() {
                mark(&mut seen, name, RigSources::REGISTRY);
            }
        }
        Ok(None) => log::debug!("No rig registry under {}", town_root.display()),
        Err(err) => {
            log::warn!("Failed to read rig registry: {err}");
            warnings.push(format!("registry: {err}"));
        }
    }

    match load_routes(town_root) {
        Ok(file) => {
            for route in &file.routes {
                if let Some(name) = route.rig_name() {
                    mark(&mut seen, name, RigSources::ROUTES);
                }
            }
            warnings.extend(file.skipped.into_iter().map(|line| format!("routes: {line}")));
        }
        Err(err) => {
            log::warn!("Failed to read routes: {err}");
            warnings.push(format!("routes: {err}"));
        }
    }

    for entry in WalkDir::new(town_root).min_depth(1).max_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                log::warn!("Failed to scan town root: {err}");
                warnings.push(format!("scan: {err}"));
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        if entry.path().join(BEADS_DIR).is_dir() {
            mark(&mut seen, name, RigSources::BEADS_DIR);
        }
        if entry.path().join(RIG_MANIFEST_FILE).is_file() {
            mark(&mut seen, name, RigSources::MANIFEST);
        }
    }

    let mut discovery = RigDiscovery {
        warnings,
        ..RigDiscovery::default()
    };
    for (name, sources) in seen {
        let path = town_root.join(&name);
        if !path.is_dir() {
            if sources.contains(RigSources::REGISTRY) {
                discovery.stale_registry.push(name);
            } else {
                log::debug!("Ignoring {name} ({sources}): no directory on disk");
            }
            continue;
        }
        let rig = DiscoveredRig {
            name,
            path,
            sources,
        };
        if !rig.is_registered() {
            discovery.conflicts.push(rig.clone());
        }
        discovery.rigs.push(rig);
    }

    log::debug!(
        "Discovered {} rigs ({} unregistered)",
        discovery.rigs.len(),
        discovery.conflicts.len()
    );
    discovery
}

fn mark(seen: &mut BTreeMap<String, RigSources>, name: &str, source: RigSources) {
    if name.is_empty() || is_reserved_name(name) {
        return;
    }
    seen.entry(name.to_string()).or_default().insert(source);
}
