use crate::check::{Check, CheckIdentity};
use crate::types::{Category, CheckContext, CheckResult};
use town_layout::discover_rigs;

const IDENTITY: CheckIdentity = CheckIdentity::new(
    "rig-registry",
    "Reconcile mayor/rigs.json with rigs found on disk and in routes",
    Category::Core,
);

/// Surfaces rigs the registry does not know about. Never edits the registry.
#[derive(Debug, Default)]
pub struct RigRegistryCheck;

impl RigRegistryCheck {
    pub fn new() -> Self {
        Self
    }
}

impl Check for RigRegistryCheck {
    fn identity(&self) -> CheckIdentity {
        IDENTITY
    }

    fn run(&mut self, ctx: &CheckContext) -> CheckResult {
        let discovery = discover_rigs(&ctx.town_root);

        let mut details = Vec::new();
        for rig in &discovery.conflicts {
            details.push(format!(
                "{}: found by {}, not in mayor/rigs.json",
                rig.name, rig.sources
            ));
        }
        for name in &discovery.stale_registry {
            details.push(format!("{name}: registered but directory is missing"));
        }
        details.extend(discovery.warnings.iter().map(|w| format!("unreadable {w}")));

        if details.is_empty() {
            let listing = discovery
                .rigs
                .iter()
                .map(|rig| format!("{} ({})", rig.name, rig.sources))
                .collect();
            return CheckResult::ok(format!("{} rig(s) registered", discovery.rigs.len()))
                .with_details(listing);
        }

        let problems = discovery.conflicts.len() + discovery.stale_registry.len();
        CheckResult::warning(format!("{problems} rig registry discrepancy(ies)"))
            .with_details(details)
            .with_fix_hint(
                "Review each entry: register real rigs with 'gt rig add', remove stale ones from mayor/rigs.json",
            )
    }
}
