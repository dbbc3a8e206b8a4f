use crate::check::{Check, CheckIdentity, FixOutcome};
use crate::pool::run_bounded;
use crate::ports::{IssueRecord, IssueStatus, IssueStore, IssueUpdate, ListFilter, PortError};
use crate::types::{Category, CheckContext, CheckResult};
use crate::FixError;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use town_layout::{discover_rigs, BEADS_DIR};

const ATTACHMENT_IDENTITY: CheckIdentity = CheckIdentity::new(
    "hook-attachment-valid",
    "Verify attached molecules exist and are not closed",
    Category::Hooks,
)
.fixable();

const SINGLETON_IDENTITY: CheckIdentity = CheckIdentity::new(
    "hook-singleton",
    "Ensure each agent has at most one handoff bead",
    Category::Hooks,
)
.fixable();

/// Stores are independent, so they are queried side by side.
const STORE_CONCURRENCY: usize = 4;

const ATTACHED_MOLECULE_KEY: &str = "attached_molecule";
const ATTACHMENT_KEYS: &[&str] = &[ATTACHED_MOLECULE_KEY, "attached_at", "attached_args"];
const HANDOFF_SUFFIX: &str = " Handoff";
const DUPLICATE_REASON: &str = "duplicate handoff bead";

/// Work directories whose stores hold hooks: the town root and every rig
/// with its own `.beads`.
fn store_dirs(town_root: &Path) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if town_root.join(BEADS_DIR).is_dir() {
        dirs.push(town_root.to_path_buf());
    }
    dirs.extend(
        discover_rigs(town_root)
            .rigs
            .into_iter()
            .map(|rig| rig.path)
            .filter(|path| path.join(BEADS_DIR).is_dir()),
    );
    dirs
}

/// Run `scan` on every store; stores that fail are logged and skipped.
fn scan_stores<R, F>(town_root: &Path, scan: F) -> Vec<R>
where
    R: Send,
    F: Fn(&Path) -> Result<Vec<R>, PortError> + Sync,
{
    run_bounded(store_dirs(town_root), STORE_CONCURRENCY, |dir| {
        scan(&dir).unwrap_or_else(|err| {
            log::warn!("Skipping store at {}: {err}", dir.display());
            Vec::new()
        })
    })
    .into_iter()
    .flatten()
    .collect()
}

fn list_pinned(issues: &dyn IssueStore, work_dir: &Path) -> Result<Vec<IssueRecord>, PortError> {
    issues.list(work_dir, &ListFilter::with_status(IssueStatus::Pinned))
}

/// Value of a `key: value` line in a description, keys compared loosely.
fn field<'a>(description: &'a str, key: &str) -> Option<&'a str> {
    description.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        let name = name.trim().to_ascii_lowercase().replace('-', "_");
        (name == key).then(|| value.trim()).filter(|v| !v.is_empty())
    })
}

/// Description with every attachment line removed.
fn strip_attachment(description: &str) -> String {
    description
        .lines()
        .filter(|line| {
            let name = line
                .split_once(':')
                .map(|(name, _)| name.trim().to_ascii_lowercase().replace('-', "_"));
            !name.is_some_and(|name| ATTACHMENT_KEYS.contains(&name.as_str()))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttachmentFault {
    NotFound,
    Closed,
}

#[derive(Debug, Clone)]
struct InvalidAttachment {
    work_dir: PathBuf,
    pinned_id: String,
    description: String,
    molecule: String,
    fault: AttachmentFault,
}

impl InvalidAttachment {
    fn describe(&self) -> String {
        let reason = match self.fault {
            AttachmentFault::NotFound => "not found",
            AttachmentFault::Closed => "is closed",
        };
        format!("{}: attached molecule {} {reason}", self.pinned_id, self.molecule)
    }
}

fn invalid_attachments(issues: &dyn IssueStore, work_dir: &Path) -> Result<Vec<InvalidAttachment>, PortError> {
    let mut invalid = Vec::new();
    for pinned in list_pinned(issues, work_dir)? {
        let Some(molecule) = field(&pinned.description, ATTACHED_MOLECULE_KEY) else {
            continue;
        };
        let fault = match issues.show(work_dir, molecule) {
            Ok(record) if record.status == IssueStatus::Closed => AttachmentFault::Closed,
            Ok(_) => continue,
            Err(PortError::NotFound(_)) => AttachmentFault::NotFound,
            Err(err) => {
                log::warn!("Could not look up molecule {molecule}: {err}");
                continue;
            }
        };
        invalid.push(InvalidAttachment {
            work_dir: work_dir.to_path_buf(),
            pinned_id: pinned.id.clone(),
            molecule: molecule.to_string(),
            description: pinned.description.clone(),
            fault,
        });
    }
    Ok(invalid)
}

/// Pinned hooks pointing at molecules that are gone or finished.
pub struct HookAttachmentValidCheck {
    issues: Arc<dyn IssueStore>,
    invalid: Vec<InvalidAttachment>,
}

impl HookAttachmentValidCheck {
    pub fn new(issues: Arc<dyn IssueStore>) -> Self {
        Self {
            issues,
            invalid: Vec::new(),
        }
    }
}

impl Check for HookAttachmentValidCheck {
    fn identity(&self) -> CheckIdentity {
        ATTACHMENT_IDENTITY
    }

    fn run(&mut self, ctx: &CheckContext) -> CheckResult {
        let issues = self.issues.as_ref();
        self.invalid = scan_stores(&ctx.town_root, |dir| invalid_attachments(issues, dir));

        if self.invalid.is_empty() {
            return CheckResult::ok("All hook attachments are valid");
        }
        CheckResult::error(format!(
            "Found {} invalid hook attachment(s)",
            self.invalid.len()
        ))
        .with_details(self.invalid.iter().map(InvalidAttachment::describe).collect())
        .with_fix_hint("Run 'gt doctor --fix' to detach invalid molecules, or 'gt mol detach <pinned-bead-id>' manually")
    }

    fn fix(&mut self, _ctx: &CheckContext) -> Result<FixOutcome, FixError> {
        let mut outcome = FixOutcome::default();
        let mut failures = Vec::new();
        for inv in &self.invalid {
            let update = IssueUpdate {
                description: Some(strip_attachment(&inv.description)),
                status: None,
            };
            match self.issues.update(&inv.work_dir, &inv.pinned_id, &update) {
                Ok(()) => outcome.note(format!("detached {} from {}", inv.molecule, inv.pinned_id)),
                Err(err) => failures.push(format!("failed to detach from {}: {err}", inv.pinned_id)),
            }
        }
        FixError::collect(failures)?;
        Ok(outcome)
    }
}

#[derive(Debug, Clone)]
struct DuplicateHandoff {
    work_dir: PathBuf,
    title: String,
    ids: Vec<String>,
}

fn duplicate_handoffs(issues: &dyn IssueStore, work_dir: &Path) -> Result<Vec<DuplicateHandoff>, PortError> {
    let mut by_title: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for record in list_pinned(issues, work_dir)? {
        if record.title.ends_with(HANDOFF_SUFFIX) {
            by_title.entry(record.title).or_default().push(record.id);
        }
    }
    Ok(by_title
        .into_iter()
        .filter(|(_, ids)| ids.len() > 1)
        .map(|(title, ids)| DuplicateHandoff {
            work_dir: work_dir.to_path_buf(),
            title,
            ids,
        })
        .collect())
}

/// More than one pinned `<agent> Handoff` bead for the same agent.
pub struct HookSingletonCheck {
    issues: Arc<dyn IssueStore>,
    duplicates: Vec<DuplicateHandoff>,
}

impl HookSingletonCheck {
    pub fn new(issues: Arc<dyn IssueStore>) -> Self {
        Self {
            issues,
            duplicates: Vec::new(),
        }
    }
}

impl Check for HookSingletonCheck {
    fn identity(&self) -> CheckIdentity {
        SINGLETON_IDENTITY
    }

    fn run(&mut self, ctx: &CheckContext) -> CheckResult {
        let issues = self.issues.as_ref();
        self.duplicates = scan_stores(&ctx.town_root, |dir| duplicate_handoffs(issues, dir));

        if self.duplicates.is_empty() {
            return CheckResult::ok("All handoff beads are unique");
        }
        let extras: usize = self.duplicates.iter().map(|dup| dup.ids.len() - 1).sum();
        let details = self
            .duplicates
            .iter()
            .map(|dup| format!("{:?} has {} beads: {}", dup.title, dup.ids.len(), dup.ids.join(", ")))
            .collect();
        CheckResult::error(format!("Found {extras} duplicate handoff bead(s)"))
            .with_details(details)
            .with_fix_hint("Run 'gt doctor --fix' to close duplicates, or 'bd close <id>' manually")
    }

    fn fix(&mut self, _ctx: &CheckContext) -> Result<FixOutcome, FixError> {
        let mut outcome = FixOutcome::default();
        let mut failures = Vec::new();
        for dup in &self.duplicates {
            let extra = &dup.ids[1..];
            match self.issues.close(&dup.work_dir, extra, DUPLICATE_REASON) {
                Ok(()) => outcome.note(format!("closed {} (kept {})", extra.join(", "), dup.ids[0])),
                Err(err) => failures.push(format!("closing duplicates of {:?}: {err}", dup.title)),
            }
        }
        FixError::collect(failures)?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::fakes::MemoryStore;
    use crate::types::CheckStatus;
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Tracker that lists one directory's records in insertion order.
    struct ListOrderStore {
        dir: PathBuf,
        records: Vec<IssueRecord>,
        closed: Mutex<Vec<String>>,
    }

    impl IssueStore for ListOrderStore {
        fn list(&self, work_dir: &Path, _filter: &ListFilter) -> Result<Vec<IssueRecord>, PortError> {
            if work_dir != self.dir {
                return Ok(Vec::new());
            }
            let closed = self.closed.lock().unwrap();
            Ok(self
                .records
                .iter()
                .filter(|r| !closed.contains(&r.id))
                .cloned()
                .collect())
        }

        fn show(&self, _work_dir: &Path, id: &str) -> Result<IssueRecord, PortError> {
            Err(PortError::NotFound(id.to_string()))
        }

        fn update(&self, _work_dir: &Path, id: &str, _update: &IssueUpdate) -> Result<(), PortError> {
            Err(PortError::NotFound(id.to_string()))
        }

        fn close(&self, _work_dir: &Path, ids: &[String], _reason: &str) -> Result<(), PortError> {
            self.closed.lock().unwrap().extend(ids.iter().cloned());
            Ok(())
        }
    }

    fn town() -> TempDir {
        let temp = TempDir::new().expect("tempdir");
        fs::create_dir_all(temp.path().join(".beads")).unwrap();
        fs::create_dir_all(temp.path().join("mayor")).unwrap();
        fs::write(
            temp.path().join("mayor/rigs.json"),
            r#"{"version":1,"rigs":{"gastown":{}}}"#,
        )
        .unwrap();
        fs::create_dir_all(temp.path().join("gastown/.beads")).unwrap();
        temp
    }

    #[test]
    fn field_parsing_is_loose_about_key_spelling() {
        let description = "Work on it\nAttached-Molecule:  gt-wisp-1 \nattached_at: 2026-01-01";
        assert_eq!(field(description, ATTACHED_MOLECULE_KEY), Some("gt-wisp-1"));
        assert_eq!(field("attached_molecule:", ATTACHED_MOLECULE_KEY), None);
        assert_eq!(strip_attachment(description), "Work on it");
    }

    #[test]
    fn reports_missing_and_closed_molecules() {
        let temp = town();
        let town_dir = temp.path();
        let rig_dir = town_dir.join("gastown");
        let store = MemoryStore::default();
        store.insert(town_dir, "hq-1", "mayor Handoff", IssueStatus::Pinned, "attached_molecule: hq-mol");
        store.insert(&rig_dir, "gt-1", "max Handoff", IssueStatus::Pinned, "attached_molecule: gt-mol");
        store.insert(&rig_dir, "gt-mol", "patrol", IssueStatus::Closed, "");
        store.insert(&rig_dir, "gt-2", "joe Handoff", IssueStatus::Pinned, "attached_molecule: gt-live");
        store.insert(&rig_dir, "gt-live", "patrol", IssueStatus::Open, "");

        let store = Arc::new(store);
        let mut check = HookAttachmentValidCheck::new(store.clone());
        let ctx = CheckContext::new(town_dir);
        let result = check.run(&ctx);

        assert_eq!(result.status, CheckStatus::Error);
        assert_eq!(result.message, "Found 2 invalid hook attachment(s)");
        assert_eq!(
            result.details,
            vec![
                "hq-1: attached molecule hq-mol not found".to_string(),
                "gt-1: attached molecule gt-mol is closed".to_string(),
            ]
        );

        check.fix(&ctx).unwrap();
        assert_eq!(store.get(&rig_dir, "gt-1").unwrap().description, "");
        assert!(check.run(&ctx).is_ok());
    }

    #[test]
    fn failing_store_is_skipped() {
        let temp = town();
        let rig_dir = temp.path().join("gastown");
        let mut store = MemoryStore::default();
        store.failing_dirs.insert(rig_dir.clone());
        store.insert(&rig_dir, "gt-1", "max Handoff", IssueStatus::Pinned, "attached_molecule: gone");

        let mut check = HookAttachmentValidCheck::new(Arc::new(store));
        assert!(check.run(&CheckContext::new(temp.path())).is_ok());
    }

    #[test]
    fn duplicate_handoffs_are_closed_keeping_the_first() {
        let temp = town();
        let rig_dir = temp.path().join("gastown");
        let store = MemoryStore::default();
        for id in ["gt-3", "gt-1", "gt-2"] {
            store.insert(&rig_dir, id, "max Handoff", IssueStatus::Pinned, "");
        }
        store.insert(&rig_dir, "gt-9", "joe Handoff", IssueStatus::Pinned, "");
        store.insert(&rig_dir, "gt-8", "joe Handoff", IssueStatus::Closed, "");
        store.insert(&rig_dir, "gt-7", "release notes", IssueStatus::Pinned, "");

        let store = Arc::new(store);
        let mut check = HookSingletonCheck::new(store.clone());
        let ctx = CheckContext::new(temp.path());
        let result = check.run(&ctx);

        assert_eq!(result.message, "Found 2 duplicate handoff bead(s)");
        assert_eq!(
            result.details,
            vec![r#""max Handoff" has 3 beads: gt-1, gt-2, gt-3"#.to_string()]
        );

        let outcome = check.fix(&ctx).unwrap();
        assert_eq!(outcome.notes, vec!["closed gt-2, gt-3 (kept gt-1)".to_string()]);
        assert_eq!(store.get(&rig_dir, "gt-1").unwrap().status, IssueStatus::Pinned);
        assert_eq!(store.get(&rig_dir, "gt-3").unwrap().status, IssueStatus::Closed);
        assert!(check.run(&ctx).is_ok());
    }

    #[test]
    fn surviving_handoff_follows_tracker_list_order() {
        let temp = town();
        let rig_dir = temp.path().join("gastown");
        let pinned = |id: &str| IssueRecord {
            id: id.to_string(),
            title: "max Handoff".to_string(),
            status: IssueStatus::Pinned,
            description: String::new(),
            labels: Vec::new(),
        };
        let store = Arc::new(ListOrderStore {
            dir: rig_dir,
            records: vec![pinned("gt-9"), pinned("gt-10")],
            closed: Mutex::new(Vec::new()),
        });
        let mut check = HookSingletonCheck::new(store.clone());
        let ctx = CheckContext::new(temp.path());
        let result = check.run(&ctx);

        assert_eq!(
            result.details,
            vec![r#""max Handoff" has 2 beads: gt-9, gt-10"#.to_string()]
        );
        let outcome = check.fix(&ctx).unwrap();
        assert_eq!(outcome.notes, vec!["closed gt-10 (kept gt-9)".to_string()]);
        assert_eq!(*store.closed.lock().unwrap(), vec!["gt-10".to_string()]);
        assert!(check.run(&ctx).is_ok());
    }
}
