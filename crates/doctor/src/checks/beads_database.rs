use super::relative;
use crate::check::{Check, CheckIdentity, FixOutcome};
use crate::types::{Category, CheckContext, CheckResult};
use crate::FixError;
use std::path::{Path, PathBuf};
use town_layout::BEADS_DIR;
use town_redirect::resolve_beads_dir;

const IDENTITY: CheckIdentity = CheckIdentity::new(
    "beads-database",
    "Verify beads database is properly initialized",
    Category::Core,
)
.fixable();

const ISSUES_DB: &str = "issues.db";
const ISSUES_JSONL: &str = "issues.jsonl";

fn file_len(path: &Path) -> Option<u64> {
    std::fs::metadata(path)
        .ok()
        .filter(|meta| meta.is_file())
        .map(|meta| meta.len())
}

/// An empty database next to a non-empty JSONL export breaks the tracker's schema.
fn has_empty_database(beads_dir: &Path) -> bool {
    file_len(&beads_dir.join(ISSUES_DB)) == Some(0)
        && file_len(&beads_dir.join(ISSUES_JSONL)).is_some_and(|len| len > 0)
}

/// Finds empty `issues.db` files shadowing a populated `issues.jsonl`.
#[derive(Debug, Default)]
pub struct BeadsDatabaseCheck {
    broken: Vec<PathBuf>,
}

impl BeadsDatabaseCheck {
    pub fn new() -> Self {
        Self::default()
    }

    fn stores(ctx: &CheckContext) -> (Vec<PathBuf>, Vec<String>) {
        let mut stores = vec![ctx.town_root.join(BEADS_DIR)];
        let mut problems = Vec::new();
        if let Some(rig_path) = ctx.rig_path() {
            match resolve_beads_dir(&rig_path) {
                Ok(dir) if dir.is_dir() => stores.push(dir),
                Ok(_) => {}
                Err(err) => problems.push(format!("rig store: {err}")),
            }
        }
        (stores, problems)
    }
}

impl Check for BeadsDatabaseCheck {
    fn identity(&self) -> CheckIdentity {
        IDENTITY
    }

    fn run(&mut self, ctx: &CheckContext) -> CheckResult {
        self.broken.clear();

        let town_beads = ctx.town_root.join(BEADS_DIR);
        if !town_beads.is_dir() {
            return CheckResult::warning("No .beads directory found at town root")
                .with_fix_hint("Run 'bd init' to initialize beads");
        }

        let (stores, problems) = Self::stores(ctx);
        self.broken = stores
            .into_iter()
            .filter(|dir| has_empty_database(dir))
            .collect();

        if !self.broken.is_empty() {
            let mut details: Vec<String> = self
                .broken
                .iter()
                .map(|dir| format!("{}/{ISSUES_DB} is empty", relative(&ctx.town_root, dir)))
                .collect();
            details.push("The database needs to be rebuilt from issues.jsonl".to_string());
            return CheckResult::error(format!(
                "{} empty issues.db with populated issues.jsonl",
                self.broken.len()
            ))
            .with_details(details)
            .with_fix_hint("Run 'gt doctor --fix' or delete issues.db and run 'bd sync --from-main'");
        }

        if !problems.is_empty() {
            return CheckResult::warning("Could not inspect rig beads").with_details(problems);
        }
        CheckResult::ok("Beads database is properly initialized")
    }

    fn fix(&mut self, ctx: &CheckContext) -> Result<FixOutcome, FixError> {
        let mut outcome = FixOutcome::default();
        let mut failures = Vec::new();
        for dir in &self.broken {
            if !has_empty_database(dir) {
                continue;
            }
            let db = dir.join(ISSUES_DB);
            match std::fs::remove_file(&db) {
                Ok(()) => outcome.note(format!(
                    "removed empty {}; the tracker rebuilds it from issues.jsonl",
                    relative(&ctx.town_root, &db)
                )),
                Err(err) => failures.push(format!("removing {}: {err}", db.display())),
            }
        }
        FixError::collect(failures)?;
        Ok(outcome)
    }
}
