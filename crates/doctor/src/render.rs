use crate::types::{Category, CheckResult, CheckStatus, Report, OTHER_CATEGORY};
use console::style;
use std::io::{self, Write};
use std::time::Duration;

const ICON_PASS: &str = "✓";
const ICON_WARN: &str = "⚠";
const ICON_FAIL: &str = "✖";
const ICON_FIX: &str = "🔧";
const ICON_PENDING: &str = "○";
const ICON_SLOW: &str = "⏳";
const TREE_LAST: &str = "└─ ";

/// Terminal styling switch. Without a TTY everything is plain text with
/// `PASS`/`WARN`/`FAIL`/`FIXED` prefixes and no carriage returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Painter {
    pub tty: bool,
}

impl Painter {
    pub fn new(tty: bool) -> Self {
        Self { tty }
    }

    fn muted(&self, text: &str) -> String {
        if self.tty {
            style(text).dim().to_string()
        } else {
            text.to_string()
        }
    }

    fn status_icon(&self, status: CheckStatus) -> String {
        match status {
            CheckStatus::Ok => style(ICON_PASS).green().to_string(),
            CheckStatus::Warning => style(ICON_WARN).yellow().to_string(),
            CheckStatus::Error => style(ICON_FAIL).red().to_string(),
        }
    }

    fn status_prefix(status: CheckStatus, fixed: bool) -> &'static str {
        if fixed {
            return "FIXED";
        }
        match status {
            CheckStatus::Ok => "PASS",
            CheckStatus::Warning => "WARN",
            CheckStatus::Error => "FAIL",
        }
    }

    /// Line shown while a check runs. TTY only.
    pub fn pending(&self, w: &mut dyn Write, name: &str) -> io::Result<()> {
        if self.tty {
            write!(w, "  {}  {name}...", self.muted(ICON_PENDING))?;
            w.flush()?;
        }
        Ok(())
    }

    /// Overwrite the pending line while a repair runs. TTY only.
    pub fn fixing(&self, w: &mut dyn Write, result: &CheckResult) -> io::Result<()> {
        if self.tty {
            write!(w, "\r  {}  {}", self.status_icon(result.status), result.name)?;
            if !result.message.is_empty() {
                write!(w, "{}", self.muted(&format!(" {}", result.message)))?;
            }
            write!(w, "{}", self.muted(" (fixing)..."))?;
            w.flush()?;
        }
        Ok(())
    }

    /// Final streamed line for one check.
    pub fn finished(&self, w: &mut dyn Write, result: &CheckResult) -> io::Result<()> {
        if self.tty {
            let icon = if result.fixed {
                ICON_FIX.to_string()
            } else {
                self.status_icon(result.status)
            };
            let gap = match (result.slow, result.fixed) {
                (true, _) => ICON_SLOW,
                (false, true) => " ",
                (false, false) => "  ",
            };
            write!(w, "\r  {icon}{gap}{}", result.name)?;
            if !result.message.is_empty() {
                write!(w, "{}", self.muted(&format!(" {}", result.message)))?;
            }
            if result.slow {
                write!(w, "{}", self.muted(&format!(" ({})", format_duration(result.elapsed))))?;
            }
        } else {
            write!(
                w,
                "{}  {}",
                Self::status_prefix(result.status, result.fixed),
                result.name
            )?;
            if !result.message.is_empty() {
                write!(w, "  {}", result.message)?;
            }
            if result.slow {
                write!(w, "  ({})", format_duration(result.elapsed))?;
            }
        }
        writeln!(w)
    }

    fn check_line(&self, w: &mut dyn Write, result: &CheckResult, verbose: bool) -> io::Result<()> {
        if self.tty {
            let icon = if result.fixed {
                ICON_FIX.to_string()
            } else {
                self.status_icon(result.status)
            };
            write!(w, "  {icon}  {}", result.name)?;
            if !result.message.is_empty() {
                write!(w, "{}", self.muted(&format!(" {}", result.message)))?;
            }
        } else {
            write!(
                w,
                "  {}  {}",
                Self::status_prefix(result.status, result.fixed),
                result.name
            )?;
            if !result.message.is_empty() {
                write!(w, "  {}", result.message)?;
            }
        }
        writeln!(w)?;

        if verbose || !result.is_ok() {
            for detail in &result.details {
                writeln!(w, "     {}", self.muted(&format!("{TREE_LAST}{detail}")))?;
            }
        }
        Ok(())
    }

    /// Full report grouped by category, followed by the summary and the
    /// numbered warnings section.
    pub fn print_report(&self, w: &mut dyn Write, report: &Report, verbose: bool) -> io::Result<()> {
        writeln!(w)?;
        let mut problems: Vec<&CheckResult> = Vec::new();

        let groups = Category::ALL
            .iter()
            .map(|category| (category.as_str(), Some(*category)))
            .chain(std::iter::once((OTHER_CATEGORY, None)));
        for (label, category) in groups {
            let members: Vec<&CheckResult> = report
                .checks
                .iter()
                .filter(|result| result.category == category)
                .collect();
            if members.is_empty() {
                continue;
            }
            if self.tty {
                writeln!(w, "{}", style(label).bold())?;
            } else {
                writeln!(w, "{label}")?;
            }
            for result in members {
                self.check_line(w, result, verbose)?;
                if !result.is_ok() {
                    problems.push(result);
                }
            }
            writeln!(w)?;
        }

        writeln!(w, "{}", self.muted(&"─".repeat(40)))?;
        let summary = &report.summary;
        if self.tty {
            writeln!(
                w,
                "{} {} passed  {} {} warnings  {} {} failed",
                self.status_icon(CheckStatus::Ok),
                summary.ok,
                self.status_icon(CheckStatus::Warning),
                summary.warnings,
                self.status_icon(CheckStatus::Error),
                summary.errors
            )?;
        } else {
            writeln!(
                w,
                "{} passed  {} warnings  {} failed",
                summary.ok, summary.warnings, summary.errors
            )?;
        }
        if summary.slow > 0 {
            writeln!(w, "{}", self.muted(&format!("{} slow check(s)", summary.slow)))?;
        }

        self.print_problems(w, problems)
    }

    fn print_problems(&self, w: &mut dyn Write, mut problems: Vec<&CheckResult>) -> io::Result<()> {
        writeln!(w)?;
        if problems.is_empty() {
            let line = format!("{ICON_PASS} All checks passed");
            if self.tty {
                writeln!(w, "{}", style(line).green())?;
            } else {
                writeln!(w, "{line}")?;
            }
            return Ok(());
        }

        if self.tty {
            writeln!(w, "{}", style(format!("{ICON_WARN}  WARNINGS")).yellow())?;
        } else {
            writeln!(w, "WARNINGS")?;
        }
        // stable: errors first, otherwise category order
        problems.sort_by_key(|result| result.status != CheckStatus::Error);
        for (idx, result) in problems.iter().enumerate() {
            let line = format!("{}. {}: {}", idx + 1, result.name, result.message);
            if self.tty {
                let line = match result.status {
                    CheckStatus::Error => style(line).red().to_string(),
                    _ => line,
                };
                writeln!(w, "  {}  {line}", self.status_icon(result.status))?;
            } else {
                writeln!(w, "  {}  {line}", Self::status_prefix(result.status, false))?;
            }
            if let Some(hint) = &result.fix_hint {
                writeln!(w, "        {}{hint}", self.muted(TREE_LAST))?;
            }
        }
        Ok(())
    }
}

/// `850ms`, `1.2s`, `2m5s`.
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{millis}ms")
    } else if millis < 60_000 {
        format!("{:.1}s", duration.as_secs_f64())
    } else {
        let secs = duration.as_secs();
        format!("{}m{}s", secs / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(mut result: CheckResult, name: &str, category: Option<Category>) -> CheckResult {
        result.name = name.to_string();
        result.category = category;
        result
    }

    fn render(report: &Report, verbose: bool) -> String {
        let mut out = Vec::new();
        Painter::new(false)
            .print_report(&mut out, report, verbose)
            .unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn durations_use_compact_units() {
        assert_eq!(format_duration(Duration::from_millis(850)), "850ms");
        assert_eq!(format_duration(Duration::from_millis(1300)), "1.3s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m5s");
    }

    #[test]
    fn plain_report_groups_by_category_and_lists_errors_first() {
        let mut report = Report::new();
        report.add(
            named(CheckResult::warning("drift"), "settings", Some(Category::Configuration))
                .with_details(vec!["crew/max".into()])
                .with_fix_hint("run --fix"),
        );
        report.add(named(CheckResult::ok("fine"), "rig-registry", Some(Category::Core)));
        report.add(named(CheckResult::error("broken"), "custom", None));

        let text = render(&report, false);
        let core = text.find("Core").unwrap();
        let config = text.find("Configuration").unwrap();
        let other = text.find("Other").unwrap();
        assert!(core < config && config < other, "{text}");
        assert!(text.contains("  WARN  settings  drift"));
        assert!(text.contains("└─ crew/max"));
        assert!(text.contains("1 passed  1 warnings  1 failed"));

        let first = text.find("1. custom: broken").unwrap();
        let second = text.find("2. settings: drift").unwrap();
        assert!(first < second, "{text}");
        assert!(text.contains("└─ run --fix"));
    }

    #[test]
    fn ok_details_only_shown_when_verbose() {
        let mut report = Report::new();
        report.add(
            named(CheckResult::ok("fine"), "rig-registry", Some(Category::Core))
                .with_details(vec!["3 rigs".into()]),
        );
        assert!(!render(&report, false).contains("3 rigs"));
        let verbose = render(&report, true);
        assert!(verbose.contains("3 rigs"));
        assert!(verbose.contains("All checks passed"));
    }

    #[test]
    fn plain_stream_line_marks_fixed_and_slow() {
        let mut result = named(CheckResult::ok("repaired (fixed)"), "x", None);
        result.fixed = true;
        result.slow = true;
        result.elapsed = Duration::from_millis(1500);
        let mut out = Vec::new();
        Painter::new(false).finished(&mut out, &result).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "FIXED  x  repaired (fixed)  (1.5s)\n"
        );
    }
}
