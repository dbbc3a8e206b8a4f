use thiserror::Error;
use town_redirect::RedirectError;

use crate::ports::PortError;

/// Failure of a repair action. Diagnostic findings are never errors.
#[derive(Error, Debug)]
pub enum FixError {
    /// `fix` was called on a check that has no repair.
    #[error("check {0} cannot be fixed automatically")]
    CannotFix(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    Redirect(#[from] RedirectError),

    #[error(transparent)]
    Port(#[from] PortError),

    /// Per-item failures of one repair pass.
    #[error("{}", .0.join("; "))]
    Partial(Vec<String>),
}

impl FixError {
    /// `Ok` when nothing failed, otherwise one error carrying every failure.
    pub fn collect(failures: Vec<String>) -> Result<(), FixError> {
        if failures.is_empty() {
            Ok(())
        } else {
            Err(FixError::Partial(failures))
        }
    }
}

/// Why a category-first selection could not be resolved.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CategoryFilterError {
    #[error("unknown category {input:?}")]
    UnknownCategory { input: String },

    #[error("unknown check {input:?} in category {category:?}")]
    UnknownCheck { input: String, category: String },
}

#[derive(Error, Debug)]
pub enum LockError {
    #[error("another doctor --fix run holds {0}")]
    Busy(std::path::PathBuf),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_failures_are_joined() {
        let err = FixError::collect(vec!["a failed".into(), "b failed".into()]).unwrap_err();
        assert_eq!(err.to_string(), "a failed; b failed");
        assert!(FixError::collect(Vec::new()).is_ok());
    }
}
