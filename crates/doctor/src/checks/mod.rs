//! Built-in checks.

mod beads_database;
mod hooks;
mod prefix_conflict;
mod rig_registry;
mod settings;
mod stale_redirect;

pub use beads_database::BeadsDatabaseCheck;
pub use hooks::{HookAttachmentValidCheck, HookSingletonCheck};
pub use prefix_conflict::PrefixConflictCheck;
pub use rig_registry::RigRegistryCheck;
pub use settings::SettingsCheck;
pub use stale_redirect::StaleBeadsRedirectCheck;

use crate::check::Check;
use crate::ports::Ports;
use std::path::Path;

/// Every built-in check in registration order.
pub fn default_checks(ports: &Ports) -> Vec<Box<dyn Check>> {
    vec![
        Box::new(RigRegistryCheck::new()),
        Box::new(PrefixConflictCheck::new()),
        Box::new(BeadsDatabaseCheck::new()),
        Box::new(SettingsCheck::new(
            ports.vcs.clone(),
            ports.sessions.clone(),
            ports.templates.clone(),
        )),
        Box::new(StaleBeadsRedirectCheck::new()),
        Box::new(HookAttachmentValidCheck::new(ports.issues.clone())),
        Box::new(HookSingletonCheck::new(ports.issues.clone())),
    ]
}

/// `path` relative to the town root for messages, or the full path outside it.
pub(crate) fn relative(town_root: &Path, path: &Path) -> String {
    match path.strip_prefix(town_root) {
        Ok(rel) if !rel.as_os_str().is_empty() => rel.display().to_string(),
        _ => path.display().to_string(),
    }
}
