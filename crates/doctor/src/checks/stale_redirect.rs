use super::relative;
use crate::check::{Check, CheckIdentity, FixOutcome};
use crate::types::{Category, CheckContext, CheckResult};
use crate::FixError;
use std::path::PathBuf;
use town_layout::{beads_dirs_to_check, discover_rigs, DiscoveredRig};
use town_redirect::{
    clean_stale_files, has_redirect_with_stale_files, setup_redirect, verify_rig_topology,
    RedirectIssueKind, TopologyReport,
};

const IDENTITY: CheckIdentity = CheckIdentity::new(
    "stale-beads-redirect",
    "Check redirect topology and stale files next to redirects",
    Category::Cleanup,
)
.fixable();

/// Worktree redirects that are missing or wrong, and redirected stores still
/// holding runtime data.
#[derive(Debug, Default)]
pub struct StaleBeadsRedirectCheck {
    stale_locations: Vec<PathBuf>,
    topology: TopologyReport,
}

impl StaleBeadsRedirectCheck {
    pub fn new() -> Self {
        Self::default()
    }

    fn rigs_in_scope(ctx: &CheckContext) -> Vec<DiscoveredRig> {
        let rigs = discover_rigs(&ctx.town_root).rigs;
        match ctx.rig_name.as_deref() {
            Some(name) => rigs.into_iter().filter(|rig| rig.name == name).collect(),
            None => rigs,
        }
    }
}

impl Check for StaleBeadsRedirectCheck {
    fn identity(&self) -> CheckIdentity {
        IDENTITY
    }

    fn run(&mut self, ctx: &CheckContext) -> CheckResult {
        self.stale_locations.clear();
        self.topology = TopologyReport::default();
        let mut failures = Vec::new();

        for rig in Self::rigs_in_scope(ctx) {
            log::debug!("Scanning redirects of rig {}", rig.name);
            self.stale_locations.extend(
                beads_dirs_to_check(&rig.path)
                    .into_iter()
                    .filter(|dir| has_redirect_with_stale_files(dir)),
            );
            match verify_rig_topology(&ctx.town_root, &rig.path) {
                Ok(report) => self.topology.extend(report),
                Err(err) => failures.push(format!("{}: could not verify redirects: {err}", rig.name)),
            }
        }

        let town = &ctx.town_root;
        let mut details: Vec<String> = self
            .stale_locations
            .iter()
            .map(|dir| format!("stale files: {}", relative(town, dir)))
            .collect();
        for issue in self.topology.issues() {
            let rel = relative(town, &issue.worktree_path);
            details.push(match issue.kind() {
                RedirectIssueKind::Missing => format!("missing redirect: {rel}"),
                RedirectIssueKind::Incorrect => format!(
                    "incorrect redirect: {rel} (has {:?}, expected {:?})",
                    issue.current_target, issue.expected_target
                ),
            });
        }
        details.extend(failures);

        if details.is_empty() {
            return CheckResult::ok("No stale beads files or redirect issues found");
        }
        let total = self.stale_locations.len() + self.topology.len();
        let message = if total == 0 {
            "Could not verify beads redirects".to_string()
        } else {
            format!("{total} beads redirect issue(s) found")
        };
        CheckResult::warning(message)
            .with_details(details)
            .with_fix_hint("Run 'gt doctor --fix' to repair redirects and remove stale files")
    }

    fn fix(&mut self, ctx: &CheckContext) -> Result<FixOutcome, FixError> {
        let town = &ctx.town_root;
        let mut outcome = FixOutcome::default();
        let mut failures = Vec::new();

        for dir in &self.stale_locations {
            match clean_stale_files(dir) {
                Ok(removed) => outcome.note(format!(
                    "removed {} stale file(s) from {}",
                    removed.len(),
                    relative(town, dir)
                )),
                Err(err) => failures.push(format!("cleaning {}: {err}", relative(town, dir))),
            }
        }

        for issue in self.topology.issues() {
            let verb = match issue.kind() {
                RedirectIssueKind::Missing => "creating",
                RedirectIssueKind::Incorrect => "fixing",
            };
            if let Err(err) = setup_redirect(&issue.town_root, &issue.worktree_path) {
                failures.push(format!(
                    "{verb} redirect for {}: {err}",
                    relative(town, &issue.worktree_path)
                ));
            }
        }

        FixError::collect(failures)?;
        Ok(outcome)
    }
}
