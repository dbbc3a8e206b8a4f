use crate::types::{Category, CheckContext, CheckResult};
use crate::FixError;

/// Static description shared by every check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckIdentity {
    pub name: &'static str,
    pub description: &'static str,
    pub category: Category,
    /// Whether [`Check::fix`] is implemented.
    pub fixable: bool,
}

impl CheckIdentity {
    pub const fn new(name: &'static str, description: &'static str, category: Category) -> Self {
        Self {
            name,
            description,
            category,
            fixable: false,
        }
    }

    pub const fn fixable(self) -> Self {
        Self {
            fixable: true,
            ..self
        }
    }
}

/// What a successful repair did, surfaced in the verified result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixOutcome {
    pub notes: Vec<String>,
}

impl FixOutcome {
    pub fn note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }
}

/// A single diagnostic.
///
/// `run` must encode its own failures as a Warning or Error result. Findings
/// that `fix` needs are kept on the instance and replaced on every `run`.
pub trait Check {
    fn identity(&self) -> CheckIdentity;

    fn name(&self) -> &'static str {
        self.identity().name
    }

    fn category(&self) -> Category {
        self.identity().category
    }

    fn run(&mut self, ctx: &CheckContext) -> CheckResult;

    fn can_fix(&self) -> bool {
        self.identity().fixable
    }

    fn fix(&mut self, _ctx: &CheckContext) -> Result<FixOutcome, FixError> {
        Err(FixError::CannotFix(self.name().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Plain;

    impl Check for Plain {
        fn identity(&self) -> CheckIdentity {
            CheckIdentity::new("plain", "Does nothing", Category::Core)
        }

        fn run(&mut self, _ctx: &CheckContext) -> CheckResult {
            CheckResult::ok("fine")
        }
    }

    #[test]
    fn checks_without_repair_refuse_to_fix() {
        let mut check = Plain;
        assert!(!check.can_fix());
        let err = check.fix(&CheckContext::default()).unwrap_err();
        assert!(matches!(err, FixError::CannotFix(name) if name == "plain"));
    }

    #[test]
    fn fixable_flag_comes_from_identity() {
        let identity = CheckIdentity::new("x", "y", Category::Hooks).fixable();
        assert!(identity.fixable);
    }
}
