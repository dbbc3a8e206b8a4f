//! # Town Doctor
//!
//! Health checks for a town and the run/fix loop that drives them.
//!
//! ## Flow
//!
//! ```text
//! default_checks(ports)
//!     │
//!     ├──> filter_checks / filter_by_category   (selection, suggestions)
//!     │
//!     └──> Doctor::run_streaming | fix_streaming
//!            │
//!            ├─> Check::run         ──> CheckResult
//!            ├─> Check::fix         (only when not OK and fixable)
//!            └─> Check::run again   ──> verified result, "fixed" marker
//!                   │
//!                   └─> Report { checks, summary }  ──> Painter
//! ```
//!
//! Checks run one at a time in registration order because fixes mutate
//! shared on-disk state. A check never returns an error from `run`: it
//! reports its own failures as a Warning or Error result.
//!
//! Collaborators the doctor does not own (issue tracker, session manager,
//! version control, settings templates) are reached through [`ports`].

mod check;
pub mod checks;
mod doctor;
mod error;
mod filter;
mod lock;
mod pool;
pub mod ports;
mod render;
mod types;

pub use check::{Check, CheckIdentity, FixOutcome};
pub use checks::default_checks;
pub use doctor::{Doctor, StreamOptions};
pub use error::{CategoryFilterError, FixError, LockError};
pub use filter::{
    checks_in_category, filter_by_category, filter_checks, levenshtein, normalize_name,
    suggest_category, suggest_check, CategorySelection, FilterResult,
};
pub use lock::{fix_lock_path, FixLock, FIX_LOCK_FILE};
pub use pool::{run_bounded, run_bounded_with};
pub use ports::{
    AgentRole, IssueRecord, IssueStatus, IssueStore, IssueUpdate, ListFilter, PortError, Ports,
    SessionManager, TemplateRenderer, VcsInspector,
};
pub use render::{format_duration, Painter};
pub use types::{
    Category, CheckContext, CheckResult, CheckStatus, Report, ReportSummary, OTHER_CATEGORY,
};
