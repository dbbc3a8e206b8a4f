use crate::check::{Check, CheckIdentity};
use crate::render::Painter;
use crate::types::{CheckContext, CheckResult, Report};
use std::io::Write;
use std::time::{Duration, Instant};

/// Options for streamed output.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamOptions {
    /// Results whose elapsed time reaches this are flagged slow. Nothing is cancelled.
    pub slow_threshold: Option<Duration>,
    pub tty: bool,
}

impl StreamOptions {
    fn is_slow(&self, elapsed: Duration) -> bool {
        self.slow_threshold
            .is_some_and(|threshold| !threshold.is_zero() && elapsed >= threshold)
    }
}

/// Ordered registry of checks and the run/fix loop over it.
#[derive(Default)]
pub struct Doctor {
    checks: Vec<Box<dyn Check>>,
}

impl Doctor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, check: impl Check + 'static) {
        self.checks.push(Box::new(check));
    }

    pub fn register_boxed(&mut self, check: Box<dyn Check>) {
        self.checks.push(check);
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Identities in registration order; indices line up with [`Doctor::retain`].
    pub fn identities(&self) -> Vec<CheckIdentity> {
        self.checks.iter().map(|check| check.identity()).collect()
    }

    /// Keep only the checks at `indices`, preserving registration order.
    pub fn retain(&mut self, indices: &[usize]) {
        let mut idx = 0;
        self.checks.retain(|_| {
            let keep = indices.contains(&idx);
            idx += 1;
            keep
        });
    }

    pub fn run(&mut self, ctx: &CheckContext) -> Report {
        self.run_streaming(ctx, None, StreamOptions::default())
    }

    pub fn fix(&mut self, ctx: &CheckContext) -> Report {
        self.fix_streaming(ctx, None, StreamOptions::default())
    }

    /// Run every check once, in registration order.
    pub fn run_streaming(
        &mut self,
        ctx: &CheckContext,
        mut sink: Option<&mut dyn Write>,
        options: StreamOptions,
    ) -> Report {
        let painter = Painter::new(options.tty);
        let mut report = Report::new();

        for check in &mut self.checks {
            emit(&mut sink, |w| painter.pending(w, check.name()));

            let start = Instant::now();
            let mut result = run_one(check.as_mut(), ctx);
            result.elapsed = start.elapsed();
            result.slow = options.is_slow(result.elapsed);

            emit(&mut sink, |w| painter.finished(w, &result));
            report.add(result);
        }
        report
    }

    /// Run every check and repair the fixable ones that report a problem.
    ///
    /// A repair is verified by running the check again; the result is marked
    /// fixed only when that second run is OK. A failing repair becomes a
    /// detail line and the loop continues.
    pub fn fix_streaming(
        &mut self,
        ctx: &CheckContext,
        mut sink: Option<&mut dyn Write>,
        options: StreamOptions,
    ) -> Report {
        let painter = Painter::new(options.tty);
        let mut report = Report::new();

        for check in &mut self.checks {
            emit(&mut sink, |w| painter.pending(w, check.name()));

            let start = Instant::now();
            let mut result = run_one(check.as_mut(), ctx);

            if !result.is_ok() && check.can_fix() {
                emit(&mut sink, |w| painter.fixing(w, &result));
                match check.fix(ctx) {
                    Ok(outcome) => {
                        result = run_one(check.as_mut(), ctx);
                        if result.is_ok() {
                            result.message.push_str(" (fixed)");
                            result.fixed = true;
                        }
                        result.details.extend(outcome.notes);
                    }
                    Err(err) => {
                        log::warn!("Fix for {} failed: {err}", check.name());
                        result.details.push(format!("Fix failed: {err}"));
                    }
                }
            }

            result.elapsed = start.elapsed();
            result.slow = options.is_slow(result.elapsed);

            emit(&mut sink, |w| painter.finished(w, &result));
            report.add(result);
        }
        report
    }
}

fn run_one(check: &mut dyn Check, ctx: &CheckContext) -> CheckResult {
    let mut result = check.run(ctx);
    if result.name.is_empty() {
        result.name = check.name().to_string();
    }
    if result.category.is_none() {
        result.category = Some(check.category());
    }
    result
}

fn emit(
    sink: &mut Option<&mut dyn Write>,
    write: impl FnOnce(&mut dyn Write) -> std::io::Result<()>,
) {
    if let Some(w) = sink.as_deref_mut() {
        if let Err(err) = write(w) {
            log::debug!("Failed to stream doctor output: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::FixOutcome;
    use crate::types::{Category, CheckStatus};
    use crate::FixError;
    use std::cell::Cell;
    use std::rc::Rc;

    /// Reports a warning until fixed; the fix may be told to fail or to lie.
    struct Flaky {
        broken: Rc<Cell<bool>>,
        fix_works: bool,
        fix_errors: bool,
        runs: Rc<Cell<usize>>,
    }

    impl Flaky {
        fn new(fix_works: bool, fix_errors: bool) -> (Self, Rc<Cell<usize>>) {
            let runs = Rc::new(Cell::new(0));
            (
                Self {
                    broken: Rc::new(Cell::new(true)),
                    fix_works,
                    fix_errors,
                    runs: runs.clone(),
                },
                runs,
            )
        }
    }

    impl Check for Flaky {
        fn identity(&self) -> CheckIdentity {
            CheckIdentity::new("flaky", "Breaks until fixed", Category::Cleanup).fixable()
        }

        fn run(&mut self, _ctx: &CheckContext) -> CheckResult {
            self.runs.set(self.runs.get() + 1);
            if self.broken.get() {
                CheckResult::warning("broken")
            } else {
                CheckResult::ok("healthy")
            }
        }

        fn fix(&mut self, _ctx: &CheckContext) -> Result<FixOutcome, FixError> {
            if self.fix_errors {
                return Err(FixError::Partial(vec!["disk full".into()]));
            }
            if self.fix_works {
                self.broken.set(false);
            }
            Ok(FixOutcome {
                notes: vec!["backed up x".into()],
            })
        }
    }

    struct Named(&'static str, CheckStatus);

    impl Check for Named {
        fn identity(&self) -> CheckIdentity {
            CheckIdentity::new(self.0, "fixed status", Category::Core)
        }

        fn run(&mut self, _ctx: &CheckContext) -> CheckResult {
            CheckResult::new(self.1, "")
        }
    }

    #[test]
    fn run_fills_name_and_category_in_registration_order() {
        let mut doctor = Doctor::new();
        doctor.register(Named("b", CheckStatus::Error));
        doctor.register(Named("a", CheckStatus::Ok));

        let report = doctor.run(&CheckContext::default());
        let names: Vec<&str> = report.checks.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(report.checks[0].category, Some(Category::Core));
        assert_eq!(report.summary.errors, 1);
        assert_eq!(report.summary.ok, 1);
    }

    #[test]
    fn successful_fix_is_verified_and_marked() {
        let (check, runs) = Flaky::new(true, false);
        let mut doctor = Doctor::new();
        doctor.register(check);

        let report = doctor.fix(&CheckContext::default());
        let result = &report.checks[0];
        assert!(result.fixed);
        assert_eq!(result.message, "healthy (fixed)");
        assert_eq!(result.details, vec!["backed up x".to_string()]);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn fix_that_does_not_resolve_is_not_marked_fixed() {
        let (check, _) = Flaky::new(false, false);
        let mut doctor = Doctor::new();
        doctor.register(check);

        let result = &doctor.fix(&CheckContext::default()).checks[0];
        assert!(!result.fixed);
        assert_eq!(result.status, CheckStatus::Warning);
    }

    #[test]
    fn failed_fix_becomes_detail_and_later_checks_still_run() {
        let (check, _) = Flaky::new(true, true);
        let mut doctor = Doctor::new();
        doctor.register(check);
        doctor.register(Named("after", CheckStatus::Ok));

        let report = doctor.fix(&CheckContext::default());
        assert_eq!(report.checks.len(), 2);
        assert_eq!(report.checks[0].details, vec!["Fix failed: disk full".to_string()]);
        assert_eq!(report.checks[1].name, "after");
    }

    #[test]
    fn unfixable_problems_are_left_alone() {
        let mut doctor = Doctor::new();
        doctor.register(Named("bad", CheckStatus::Error));
        let report = doctor.fix(&CheckContext::default());
        assert!(report.checks[0].details.is_empty());
        assert!(!report.checks[0].fixed);
    }

    struct Sleepy;

    impl Check for Sleepy {
        fn identity(&self) -> CheckIdentity {
            CheckIdentity::new("sleepy", "Takes a while", Category::Rig)
        }

        fn run(&mut self, _ctx: &CheckContext) -> CheckResult {
            std::thread::sleep(Duration::from_millis(5));
            CheckResult::ok("")
        }
    }

    #[test]
    fn slow_checks_are_flagged_but_still_complete() {
        let mut doctor = Doctor::new();
        doctor.register(Sleepy);
        doctor.register(Named("quick", CheckStatus::Ok));
        let options = StreamOptions {
            slow_threshold: Some(Duration::from_millis(1)),
            tty: false,
        };
        let mut out = Vec::new();
        let report = doctor.run_streaming(&CheckContext::default(), Some(&mut out), options);
        assert!(report.checks[0].slow);
        assert!(report.summary.slow >= 1);
        assert_eq!(report.summary.ok, 2);
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("PASS  sleepy  ("), "{text}");
    }

    #[test]
    fn retain_keeps_registration_order() {
        let mut doctor = Doctor::new();
        for name in ["a", "b", "c"] {
            doctor.register(Named(name, CheckStatus::Ok));
        }
        doctor.retain(&[2, 0]);
        let names: Vec<&str> = doctor.identities().iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["a", "c"]);
    }
}
