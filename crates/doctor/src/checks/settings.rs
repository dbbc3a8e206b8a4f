use super::relative;
use crate::check::{Check, CheckIdentity, FixOutcome};
use crate::ports::{AgentRole, PortError, SessionManager, TemplateRenderer, VcsInspector};
use crate::types::{Category, CheckContext, CheckResult};
use crate::FixError;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use town_layout::{is_reserved_name, CREW_DIR, MAYOR_DIR, POLECATS_DIR, REFINERY_DIR};

const IDENTITY: CheckIdentity = CheckIdentity::new(
    "settings",
    "Verify agent settings files are current and in the right place",
    Category::Configuration,
)
.fixable();

/// Directories an agent runtime reads its settings from.
pub const KNOWN_HOOKS_DIRS: &[&str] = &[".claude", ".opencode"];
pub const SETTINGS_FILE: &str = "settings.json";
pub const BACKUP_SUFFIX: &str = ".doctor-backup";
const INSTRUCTIONS_FILE: &str = "CLAUDE.md";
const WITNESS_DIR: &str = "witness";
const DEACON_DIR: &str = "deacon";
const DAEMON_DIR: &str = "daemon";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GitStatus {
    Untracked,
    TrackedClean,
    TrackedModified,
    /// Status could not be determined; treated like local edits.
    Unknown,
}

impl GitStatus {
    fn is_safe_to_delete(self) -> bool {
        matches!(self, GitStatus::Untracked | GitStatus::TrackedClean)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Problem {
    /// File in a role directory that lacks required content.
    Stale(Vec<String>),
    /// Settings inside a source clone, where they leak into the repository.
    Misplaced,
    /// Mayor instructions at the town root instead of `mayor/`.
    MisplacedInstructions,
}

#[derive(Debug, Clone)]
struct Finding {
    path: PathBuf,
    role: AgentRole,
    session: Option<String>,
    problem: Problem,
    git: GitStatus,
}

/// A settings location and who owns it.
struct Location {
    path: PathBuf,
    role: AgentRole,
    session: Option<String>,
}

impl Location {
    fn new(path: PathBuf, role: AgentRole, session: Option<String>) -> Self {
        Self { path, role, session }
    }
}

fn settings_in(dir: &Path) -> impl Iterator<Item = PathBuf> + '_ {
    KNOWN_HOOKS_DIRS
        .iter()
        .map(move |hooks| dir.join(hooks).join(SETTINGS_FILE))
}

fn child_dirs(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_ok_and(|ty| ty.is_dir()))
        .filter(|entry| !entry.file_name().to_string_lossy().starts_with('.'))
        .map(|entry| entry.path())
        .collect();
    dirs.sort();
    dirs
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Rig directories: every non-hidden child of the town root that is not a
/// town-level agent home.
fn rig_dirs(town_root: &Path) -> Vec<PathBuf> {
    child_dirs(town_root)
        .into_iter()
        .filter(|dir| {
            let name = dir_name(dir);
            !is_reserved_name(&name) && name != DEACON_DIR && name != DAEMON_DIR
        })
        .collect()
}

fn correct_locations(town_root: &Path) -> Vec<Location> {
    let mut out = Vec::new();
    for path in settings_in(town_root) {
        out.push(Location::new(path, AgentRole::Mayor, Some("hq-mayor".into())));
    }
    for path in settings_in(&town_root.join(DEACON_DIR)) {
        out.push(Location::new(path, AgentRole::Deacon, Some("hq-deacon".into())));
    }
    for rig in rig_dirs(town_root) {
        let name = dir_name(&rig);
        for path in settings_in(&rig.join(WITNESS_DIR)) {
            out.push(Location::new(
                path,
                AgentRole::Witness,
                Some(format!("gt-{name}-witness")),
            ));
        }
        for path in settings_in(&rig.join(REFINERY_DIR)) {
            out.push(Location::new(
                path,
                AgentRole::Refinery,
                Some(format!("gt-{name}-refinery")),
            ));
        }
        for path in settings_in(&rig.join(CREW_DIR)) {
            out.push(Location::new(path, AgentRole::Crew, None));
        }
        for path in settings_in(&rig.join(POLECATS_DIR)) {
            out.push(Location::new(path, AgentRole::Polecat, None));
        }
    }
    out
}

/// Settings inside source clones, where an agent would pick them up as the
/// repository's own configuration.
fn wrong_locations(town_root: &Path) -> Vec<Location> {
    let mut out = Vec::new();
    for rig in rig_dirs(town_root) {
        let name = dir_name(&rig);
        for path in settings_in(&rig.join(WITNESS_DIR).join("rig")) {
            out.push(Location::new(path, AgentRole::Witness, Some(format!("gt-{name}-witness"))));
        }
        for path in settings_in(&rig.join(REFINERY_DIR).join("rig")) {
            out.push(Location::new(path, AgentRole::Refinery, Some(format!("gt-{name}-refinery"))));
        }
        for member in child_dirs(&rig.join(CREW_DIR)) {
            let session = format!("gt-{name}-crew-{}", dir_name(&member));
            for path in settings_in(&member) {
                out.push(Location::new(path, AgentRole::Crew, Some(session.clone())));
            }
        }
        for polecat in child_dirs(&rig.join(POLECATS_DIR)) {
            let session = format!("gt-{name}-{}", dir_name(&polecat));
            for path in settings_in(&polecat).chain(settings_in(&polecat.join(&name))) {
                out.push(Location::new(path, AgentRole::Polecat, Some(session.clone())));
            }
        }
    }
    out
}

/// Which required pieces a settings document lacks. Empty means current.
fn missing_elements(raw: &str) -> Vec<String> {
    let value: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(err) => return vec![format!("invalid JSON: {err}")],
    };
    let mut missing = Vec::new();
    if value.get("enabledPlugins").is_none() {
        missing.push("enabledPlugins".to_string());
    }
    let Some(hooks) = value.get("hooks").and_then(Value::as_object) else {
        missing.push("hooks".to_string());
        return missing;
    };
    let session_start = hooks
        .get("SessionStart")
        .map(Value::to_string)
        .unwrap_or_default();
    if !session_start.contains("PATH=") {
        missing.push("PATH export".to_string());
    }
    if !session_start.contains("gt nudge deacon session-started") {
        missing.push("deacon nudge".to_string());
    }
    let stop = hooks.get("Stop").map(Value::to_string).unwrap_or_default();
    if !stop.contains("gt costs record") {
        missing.push("Stop hook".to_string());
    }
    missing
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

/// Agent settings that are stale, in the wrong place, or unreadable.
pub struct SettingsCheck {
    vcs: Arc<dyn VcsInspector>,
    sessions: Arc<dyn SessionManager>,
    templates: Arc<dyn TemplateRenderer>,
    findings: Vec<Finding>,
}

impl SettingsCheck {
    pub fn new(
        vcs: Arc<dyn VcsInspector>,
        sessions: Arc<dyn SessionManager>,
        templates: Arc<dyn TemplateRenderer>,
    ) -> Self {
        Self {
            vcs,
            sessions,
            templates,
            findings: Vec::new(),
        }
    }

    fn git_status(&self, path: &Path) -> GitStatus {
        let tracked = match self.vcs.is_tracked(path) {
            Ok(tracked) => tracked,
            Err(err) => {
                log::debug!("Git status of {} unknown: {err}", path.display());
                return GitStatus::Unknown;
            }
        };
        if !tracked {
            return GitStatus::Untracked;
        }
        match self.vcs.has_local_modifications(path) {
            Ok(false) => GitStatus::TrackedClean,
            Ok(true) => GitStatus::TrackedModified,
            Err(err) => {
                log::debug!("Git diff of {} failed: {err}", path.display());
                GitStatus::Unknown
            }
        }
    }

    fn finding(&self, location: Location, problem: Problem) -> Finding {
        let git = self.git_status(&location.path);
        Finding {
            path: location.path,
            role: location.role,
            session: location.session,
            problem,
            git,
        }
    }

    fn describe(town_root: &Path, finding: &Finding) -> String {
        let rel = relative(town_root, &finding.path);
        match &finding.problem {
            Problem::Stale(missing) => format!("{rel}: missing {}", missing.join(", ")),
            Problem::Misplaced => format!("{rel}: wrong location (inside source clone)"),
            Problem::MisplacedInstructions => {
                format!("{rel}: wrong location (belongs in {MAYOR_DIR}/{INSTRUCTIONS_FILE})")
            }
        }
    }

    /// Move a file out of the way, keeping its content next to it.
    fn back_up(path: &Path, outcome: &mut FixOutcome, town_root: &Path) -> std::io::Result<()> {
        let backup = backup_path(path);
        fs::rename(path, &backup)?;
        outcome.note(format!(
            "backed up locally modified {} to {}",
            relative(town_root, path),
            relative(town_root, &backup)
        ));
        Ok(())
    }

    fn remove_or_back_up(
        &self,
        finding: &Finding,
        outcome: &mut FixOutcome,
        town_root: &Path,
    ) -> std::io::Result<()> {
        if finding.git.is_safe_to_delete() {
            fs::remove_file(&finding.path)?;
            let hooks_dir = finding.path.parent().filter(|parent| {
                KNOWN_HOOKS_DIRS.iter().any(|name| parent.ends_with(name))
            });
            if let Some(parent) = hooks_dir {
                // Only succeeds when the hooks directory is now empty.
                let _ = fs::remove_dir(parent);
            }
            Ok(())
        } else {
            Self::back_up(&finding.path, outcome, town_root)
        }
    }

    fn repair(&self, ctx: &CheckContext, finding: &Finding, outcome: &mut FixOutcome) -> Result<(), FixError> {
        let town = &ctx.town_root;
        match &finding.problem {
            Problem::Misplaced => {
                self.remove_or_back_up(finding, outcome, town)?;
            }
            Problem::MisplacedInstructions => {
                let target = town.join(MAYOR_DIR).join(INSTRUCTIONS_FILE);
                if !target.exists() {
                    let content = self.templates.render_mayor_instructions(town)?;
                    fs::create_dir_all(town.join(MAYOR_DIR))?;
                    fs::write(&target, content)?;
                }
                self.remove_or_back_up(finding, outcome, town)?;
            }
            Problem::Stale(_) => {
                if matches!(finding.git, GitStatus::TrackedModified | GitStatus::Unknown) {
                    let backup = backup_path(&finding.path);
                    fs::copy(&finding.path, &backup)?;
                    outcome.note(format!(
                        "saved previous {} as {}",
                        relative(town, &finding.path),
                        relative(town, &backup)
                    ));
                }
                let content = self.templates.render_settings(finding.role)?;
                fs::write(&finding.path, content)?;
            }
        }

        if ctx.restart_sessions && finding.role.is_patrol() {
            if let Some(session) = &finding.session {
                self.restart(session, outcome)?;
            }
        }
        Ok(())
    }

    fn restart(&self, session: &str, outcome: &mut FixOutcome) -> Result<(), PortError> {
        if self.sessions.has_session(session)? {
            self.sessions.kill_session_with_processes(session)?;
            outcome.note(format!("stopped session {session}; it restarts with new settings"));
        }
        Ok(())
    }
}

impl Check for SettingsCheck {
    fn identity(&self) -> CheckIdentity {
        IDENTITY
    }

    fn run(&mut self, ctx: &CheckContext) -> CheckResult {
        self.findings.clear();
        let town = &ctx.town_root;

        let mut findings = Vec::new();
        for location in correct_locations(town) {
            if !location.path.is_file() {
                continue;
            }
            let missing = match fs::read_to_string(&location.path) {
                Ok(raw) => missing_elements(&raw),
                Err(err) => vec![format!("unreadable: {err}")],
            };
            if !missing.is_empty() {
                findings.push(self.finding(location, Problem::Stale(missing)));
            }
        }
        for location in wrong_locations(town) {
            if location.path.is_file() {
                findings.push(self.finding(location, Problem::Misplaced));
            }
        }
        let instructions = town.join(INSTRUCTIONS_FILE);
        if instructions.is_file() {
            let location = Location::new(instructions, AgentRole::Mayor, Some("hq-mayor".into()));
            findings.push(self.finding(location, Problem::MisplacedInstructions));
        }
        self.findings = findings;

        if self.findings.is_empty() {
            return CheckResult::ok("All settings files are current");
        }
        let details = self
            .findings
            .iter()
            .map(|finding| Self::describe(town, finding))
            .collect();
        CheckResult::error(format!(
            "{} settings file(s) need attention",
            self.findings.len()
        ))
        .with_details(details)
        .with_fix_hint("Run 'gt doctor --fix' to regenerate settings (add --restart-sessions to reload agents)")
    }

    fn fix(&mut self, ctx: &CheckContext) -> Result<FixOutcome, FixError> {
        let mut outcome = FixOutcome::default();
        let mut failures = Vec::new();
        for finding in &self.findings {
            if let Err(err) = self.repair(ctx, finding, &mut outcome) {
                failures.push(format!("{}: {err}", relative(&ctx.town_root, &finding.path)));
            }
        }
        FixError::collect(failures)?;
        Ok(outcome)
    }
}
