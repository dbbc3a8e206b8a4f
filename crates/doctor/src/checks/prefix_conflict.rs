use crate::check::{Check, CheckIdentity};
use crate::types::{Category, CheckContext, CheckResult};
use town_layout::{find_conflicting_prefixes, load_routes, routes_path};

const IDENTITY: CheckIdentity = CheckIdentity::new(
    "prefix-conflict",
    "Check for duplicate beads prefixes across rigs",
    Category::Core,
);

#[derive(Debug, Default)]
pub struct PrefixConflictCheck;

impl PrefixConflictCheck {
    pub fn new() -> Self {
        Self
    }
}

impl Check for PrefixConflictCheck {
    fn identity(&self) -> CheckIdentity {
        IDENTITY
    }

    fn run(&mut self, ctx: &CheckContext) -> CheckResult {
        if !routes_path(&ctx.town_root).is_file() {
            return CheckResult::ok("No routes.jsonl file (prefix routing not configured)");
        }
        let routes = match load_routes(&ctx.town_root) {
            Ok(file) => file.routes,
            Err(err) => return CheckResult::warning(format!("Could not read routes.jsonl: {err}")),
        };

        let conflicts = find_conflicting_prefixes(&routes);
        if conflicts.is_empty() {
            return CheckResult::ok("No prefix conflicts found");
        }

        let details = conflicts
            .iter()
            .map(|(prefix, paths)| format!("Prefix {prefix:?} used by: {}", paths.join(", ")))
            .collect();
        CheckResult::error(format!(
            "{} prefix conflict(s) found in routes.jsonl",
            conflicts.len()
        ))
        .with_details(details)
        .with_fix_hint("Use 'bd rename-prefix <new-prefix>' in one of the conflicting rigs")
    }
}
