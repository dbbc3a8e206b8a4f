//! Narrow interfaces to collaborators the doctor does not implement: the
//! issue tracker, the terminal session manager, version control and the
//! settings templates.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PortError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("{tool} failed: {message}")]
    Command { tool: String, message: String },

    #[error("unexpected output from {tool}: {message}")]
    Parse { tool: String, message: String },

    #[error("not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    Open,
    InProgress,
    Blocked,
    Pinned,
    Hooked,
    Closed,
    #[serde(other)]
    Other,
}

impl IssueStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            IssueStatus::Open => "open",
            IssueStatus::InProgress => "in_progress",
            IssueStatus::Blocked => "blocked",
            IssueStatus::Pinned => "pinned",
            IssueStatus::Hooked => "hooked",
            IssueStatus::Closed => "closed",
            IssueStatus::Other => "other",
        }
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRecord {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub status: IssueStatus,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub status: Option<IssueStatus>,
    pub label: Option<String>,
}

impl ListFilter {
    pub fn with_status(status: IssueStatus) -> Self {
        Self {
            status: Some(status),
            label: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueUpdate {
    pub description: Option<String>,
    pub status: Option<IssueStatus>,
}

/// Issue tracker, addressed by the working directory whose store it should use.
pub trait IssueStore: Send + Sync {
    fn list(&self, work_dir: &Path, filter: &ListFilter) -> Result<Vec<IssueRecord>, PortError>;

    fn show(&self, work_dir: &Path, id: &str) -> Result<IssueRecord, PortError>;

    fn update(&self, work_dir: &Path, id: &str, update: &IssueUpdate) -> Result<(), PortError>;

    fn close(&self, work_dir: &Path, ids: &[String], reason: &str) -> Result<(), PortError>;
}

/// Long-running agent sessions. The doctor never starts one.
pub trait SessionManager {
    fn has_session(&self, name: &str) -> Result<bool, PortError>;

    fn kill_session_with_processes(&self, name: &str) -> Result<(), PortError>;
}

pub trait VcsInspector {
    fn is_tracked(&self, file: &Path) -> Result<bool, PortError>;

    /// Unstaged or staged changes relative to HEAD.
    fn has_local_modifications(&self, file: &Path) -> Result<bool, PortError>;
}

/// Agent roles that own settings files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    Mayor,
    Deacon,
    Witness,
    Refinery,
    Crew,
    Polecat,
}

impl AgentRole {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentRole::Mayor => "mayor",
            AgentRole::Deacon => "deacon",
            AgentRole::Witness => "witness",
            AgentRole::Refinery => "refinery",
            AgentRole::Crew => "crew",
            AgentRole::Polecat => "polecat",
        }
    }

    /// Patrol roles run one long-lived session that must restart to reload settings.
    pub fn is_patrol(self) -> bool {
        matches!(
            self,
            AgentRole::Mayor | AgentRole::Deacon | AgentRole::Witness | AgentRole::Refinery
        )
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait TemplateRenderer {
    /// Content of `settings.json` for an agent role.
    fn render_settings(&self, role: AgentRole) -> Result<String, PortError>;

    /// Content of `mayor/CLAUDE.md`.
    fn render_mayor_instructions(&self, town_root: &Path) -> Result<String, PortError>;
}

/// Collaborators handed to the checks that need them.
#[derive(Clone)]
pub struct Ports {
    pub issues: Arc<dyn IssueStore>,
    pub sessions: Arc<dyn SessionManager>,
    pub vcs: Arc<dyn VcsInspector>,
    pub templates: Arc<dyn TemplateRenderer>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_records_parse_tracker_json() {
        let records: Vec<IssueRecord> = serde_json::from_str(
            r#"[{"id":"gt-1","title":"max Handoff","status":"pinned","priority":2},
                {"id":"gt-2","status":"tombstone"}]"#,
        )
        .unwrap();
        assert_eq!(records[0].status, IssueStatus::Pinned);
        assert_eq!(records[1].status, IssueStatus::Other);
        assert!(records[1].description.is_empty());
    }

    #[test]
    fn patrol_roles() {
        assert!(AgentRole::Witness.is_patrol());
        assert!(!AgentRole::Crew.is_patrol());
    }
}
