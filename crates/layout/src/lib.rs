//! # Town Layout
//!
//! Filesystem conventions of a town and multi-source rig discovery.
//!
//! ## Discovery
//!
//! ```text
//! Town root
//!     │
//!     ├──> mayor/rigs.json        (registry, trust anchor)
//!     ├──> .beads/routes.jsonl    (leading path component of each route)
//!     ├──> <name>/.beads/         (structural marker)
//!     └──> <name>/config.json     (rig manifest)
//!            │
//!            └─> RigDiscovery { rigs, conflicts, stale_registry }
//! ```
//!
//! A name is accepted only when its directory exists. Rigs found by any
//! source other than the registry are surfaced as conflicts and never
//! written back.

mod discovery;
mod error;
mod paths;
mod registry;
mod routes;
mod worktrees;

pub use discovery::{discover_rigs, DiscoveredRig, RigDiscovery, RigSources};
pub use error::{LayoutError, Result};
pub use paths::{
    beads_dir, find_town_root, is_reserved_name, redirect_file, registry_path, routes_path,
    tracked_beads_dir, BEADS_DIR, MAYOR_DIR, REDIRECT_FILE, RESERVED_NAMES, RIGS_REGISTRY_FILE,
    RIG_MANIFEST_FILE, ROUTES_FILE, TOWN_MARKER_FILE, TRACKED_BEADS_PATH,
};
pub use registry::{load_registry, RigsRegistry, REGISTRY_SCHEMA_VERSION};
pub use routes::{find_conflicting_prefixes, load_routes, parse_routes, Route, RoutesFile};
pub use worktrees::{
    beads_dirs_to_check, rig_worktrees, Worktree, WorktreeRole, CREW_DIR, POLECATS_DIR,
    REFINERY_DIR,
};
