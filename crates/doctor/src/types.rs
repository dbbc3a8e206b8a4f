use serde::{Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Grouping used for filtering and for the printed report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Category {
    Core,
    Infrastructure,
    Rig,
    Patrol,
    Configuration,
    Cleanup,
    Hooks,
}

impl Category {
    /// Display order of the report.
    pub const ALL: [Category; 7] = [
        Category::Core,
        Category::Infrastructure,
        Category::Rig,
        Category::Patrol,
        Category::Configuration,
        Category::Cleanup,
        Category::Hooks,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Core => "Core",
            Category::Infrastructure => "Infrastructure",
            Category::Rig => "Rig",
            Category::Patrol => "Patrol",
            Category::Configuration => "Configuration",
            Category::Cleanup => "Cleanup",
            Category::Hooks => "Hooks",
        }
    }

    /// Case-insensitive lookup of a category name.
    pub fn resolve(input: &str) -> Option<Category> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(input.trim()))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Label used for results without a category.
pub const OTHER_CATEGORY: &str = "Other";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CheckStatus::Ok => "OK",
            CheckStatus::Warning => "Warning",
            CheckStatus::Error => "Error",
        })
    }
}

/// Per-invocation settings handed to every check. Checks never mutate it.
#[derive(Debug, Clone, Default)]
pub struct CheckContext {
    pub town_root: PathBuf,
    /// Limit rig-scoped checks to one rig.
    pub rig_name: Option<String>,
    pub verbose: bool,
    /// Allow fixes to kill long-running agent sessions.
    pub restart_sessions: bool,
}

impl CheckContext {
    pub fn new(town_root: impl AsRef<Path>) -> Self {
        Self {
            town_root: town_root.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    pub fn rig_path(&self) -> Option<PathBuf> {
        self.rig_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .map(|name| self.town_root.join(name))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub category: Option<Category>,
    pub status: CheckStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix_hint: Option<String>,
    pub fixed: bool,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
    pub slow: bool,
}

impl CheckResult {
    pub fn new(status: CheckStatus, message: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            category: None,
            status,
            message: message.into(),
            details: Vec::new(),
            fix_hint: None,
            fixed: false,
            elapsed: Duration::ZERO,
            slow: false,
        }
    }

    pub fn ok(message: impl Into<String>) -> Self {
        Self::new(CheckStatus::Ok, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(CheckStatus::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(CheckStatus::Error, message)
    }

    pub fn with_details(mut self, details: Vec<String>) -> Self {
        self.details = details;
        self
    }

    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == CheckStatus::Ok
    }
}

fn serialize_millis<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub total: usize,
    pub ok: usize,
    pub warnings: usize,
    pub errors: usize,
    pub slow: usize,
}

/// Results of one run or fix pass, in registration order.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub created_at_unix_ms: u64,
    pub checks: Vec<CheckResult>,
    pub summary: ReportSummary,
}

impl Default for Report {
    fn default() -> Self {
        Self::new()
    }
}

impl Report {
    pub fn new() -> Self {
        Self {
            created_at_unix_ms: current_unix_ms(),
            checks: Vec::new(),
            summary: ReportSummary::default(),
        }
    }

    pub fn add(&mut self, result: CheckResult) {
        self.summary.total += 1;
        match result.status {
            CheckStatus::Ok => self.summary.ok += 1,
            CheckStatus::Warning => self.summary.warnings += 1,
            CheckStatus::Error => self.summary.errors += 1,
        }
        if result.slow {
            self.summary.slow += 1;
        }
        self.checks.push(result);
    }

    pub fn has_errors(&self) -> bool {
        self.summary.errors > 0
    }

    pub fn has_warnings(&self) -> bool {
        self.summary.warnings > 0
    }

    pub fn is_healthy(&self) -> bool {
        !self.has_errors() && !self.has_warnings()
    }

    pub fn get(&self, name: &str) -> Option<&CheckResult> {
        self.checks.iter().find(|result| result.name == name)
    }
}

fn current_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|dur| u64::try_from(dur.as_millis()).ok())
        .unwrap_or(0)
}
