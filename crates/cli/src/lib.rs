//! # gt-doctor
//!
//! Command line front end for the town doctor.
//!
//! ```text
//! args ──> town root ──> DoctorConfig (file, env, flags)
//!                              │
//!             default_checks(ports) minus disabled_checks
//!                              │
//!                 selection (CATEGORY [CHECK] | --check TOKEN...)
//!                              │
//!             run | fix (under FixLock) | fix --dry-run
//!                              │
//!                   streamed lines + report | JSON
//! ```

mod adapters;
mod config;

pub use adapters::{BdCliStore, BuiltinTemplates, GitCli, TmuxSessions};
pub use config::{config_path, DoctorConfig, CONFIG_FILE};

use anyhow::{bail, Context, Result};
use clap::Parser;
use console::Term;
use std::env;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use town_doctor::{
    default_checks, filter_by_category, filter_checks, suggest_category, suggest_check,
    Category, CategoryFilterError, CheckContext, CheckIdentity, Doctor, FixLock, Painter, Ports,
    Report, StreamOptions,
};
use town_layout::find_town_root;

/// Positional token that lists checks instead of running them.
const LIST_COMMAND: &str = "list";

#[derive(Parser)]
#[command(name = "gt-doctor")]
#[command(about = "Diagnose and repair a Gas Town workspace", long_about = None)]
#[command(version)]
struct Cli {
    /// Category to run, or `list` to show every check
    category: Option<String>,

    /// Single check inside CATEGORY
    check: Option<String>,

    /// Run only these checks or categories (repeatable)
    #[arg(long = "check", value_name = "TOKEN", conflicts_with = "category")]
    checks: Vec<String>,

    /// Repair what can be repaired, then verify
    #[arg(long)]
    fix: bool,

    /// With --fix: report what would be repaired without changing anything
    #[arg(long, requires = "fix")]
    dry_run: bool,

    /// Allow fixes to restart long-running agent sessions
    #[arg(long)]
    restart_sessions: bool,

    /// Limit rig-scoped checks to one rig
    #[arg(long, value_name = "NAME")]
    rig: Option<String>,

    /// Flag checks slower than DUR (default 1s)
    #[arg(
        long,
        value_name = "DUR",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "1s",
        value_parser = parse_duration
    )]
    slow: Option<Duration>,

    /// Print the report as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Town root (default: nearest ancestor of the current directory)
    #[arg(long, value_name = "PATH")]
    town: Option<PathBuf>,

    /// Enable verbose logging and show details of passing checks
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long)]
    quiet: bool,
}

/// `500ms`, `2s`, `1.5s`, `1m`; a bare number is seconds.
fn parse_duration(raw: &str) -> Result<Duration, String> {
    let raw = raw.trim();
    let invalid = || format!("invalid duration {raw:?} (use e.g. 500ms, 2s, 1m)");
    if let Some(ms) = raw.strip_suffix("ms") {
        return ms.trim().parse().map(Duration::from_millis).map_err(|_| invalid());
    }
    let (number, scale) = if let Some(s) = raw.strip_suffix('s') {
        (s, 1.0)
    } else if let Some(m) = raw.strip_suffix('m') {
        (m, 60.0)
    } else {
        (raw, 1.0)
    };
    let value: f64 = number.trim().parse().map_err(|_| invalid())?;
    if !value.is_finite() || value < 0.0 {
        return Err(invalid());
    }
    Duration::try_from_secs_f64(value * scale).map_err(|_| invalid())
}

fn init_logging(cli: &Cli) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();
}

fn ports(config: &DoctorConfig) -> Ports {
    Ports {
        issues: Arc::new(BdCliStore::new(config.bd_binary())),
        sessions: Arc::new(TmuxSessions::new(config.tmux_binary())),
        vcs: Arc::new(GitCli::new(config.git_binary())),
        templates: Arc::new(BuiltinTemplates),
    }
}

fn build_doctor(config: &DoctorConfig) -> Doctor {
    let mut doctor = Doctor::new();
    for check in default_checks(&ports(config)) {
        if config.is_disabled(check.name()) {
            log::debug!("Check {} disabled by config", check.name());
            continue;
        }
        doctor.register_boxed(check);
    }
    doctor
}

fn did_you_mean(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!("\nDid you mean: {}?", suggestions.join(", "))
    }
}

fn valid_categories() -> String {
    Category::ALL
        .iter()
        .map(|category| category.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn valid_checks(identities: &[CheckIdentity]) -> String {
    identities
        .iter()
        .map(|identity| identity.name)
        .collect::<Vec<_>>()
        .join(", ")
}

fn category_suggestions(input: &str) -> Vec<String> {
    suggest_category(input)
        .into_iter()
        .map(|category| category.to_string())
        .collect()
}

fn check_suggestions(identities: &[CheckIdentity], input: &str) -> Vec<String> {
    suggest_check(identities, input)
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Indices of the checks to run, or a user-facing error.
fn select(cli: &Cli, identities: &[CheckIdentity]) -> Result<Vec<usize>> {
    let tokens = cli
        .checks
        .iter()
        .chain(cli.category.iter())
        .chain(cli.check.iter());
    for token in tokens {
        if token.trim().eq_ignore_ascii_case("all") {
            bail!("'all' is not a category or check; run gt-doctor without arguments to run every check");
        }
    }

    if !cli.checks.is_empty() {
        let result = filter_checks(identities, &cli.checks);
        if let Some(unknown) = result.unmatched.first() {
            let mut suggestions = check_suggestions(identities, unknown);
            suggestions.extend(category_suggestions(unknown));
            bail!(
                "unknown check or category {unknown:?}{}\nValid checks: {}\nValid categories: {}",
                did_you_mean(&suggestions),
                valid_checks(identities),
                valid_categories()
            );
        }
        return Ok(result.matched);
    }

    match filter_by_category(identities, cli.category.as_deref(), cli.check.as_deref()) {
        Ok(selection) => Ok(selection.matched),
        Err(CategoryFilterError::UnknownCategory { input }) => bail!(
            "unknown category {input:?}{}\nValid categories: {}",
            did_you_mean(&category_suggestions(&input)),
            valid_categories()
        ),
        Err(CategoryFilterError::UnknownCheck { input, category }) => {
            let in_category: Vec<CheckIdentity> = identities
                .iter()
                .filter(|identity| identity.category.as_str() == category)
                .copied()
                .collect();
            bail!(
                "unknown check {input:?} in category {category}{}\nChecks in {category}: {}",
                did_you_mean(&check_suggestions(&in_category, &input)),
                valid_checks(&in_category)
            )
        }
    }
}

fn print_list(out: &mut dyn Write, identities: &[CheckIdentity]) -> io::Result<()> {
    for category in Category::ALL {
        let members: Vec<&CheckIdentity> = identities
            .iter()
            .filter(|identity| identity.category == category)
            .collect();
        if members.is_empty() {
            continue;
        }
        writeln!(out, "{category}")?;
        for identity in members {
            let marker = if identity.fixable { " (fixable)" } else { "" };
            writeln!(out, "  {:<24} {}{marker}", identity.name, identity.description)?;
        }
    }
    Ok(())
}

fn print_dry_run(out: &mut dyn Write, report: &Report, identities: &[CheckIdentity]) -> io::Result<()> {
    let fixable: Vec<_> = report
        .checks
        .iter()
        .filter(|result| !result.is_ok())
        .filter(|result| {
            identities
                .iter()
                .any(|identity| identity.name == result.name && identity.fixable)
        })
        .collect();
    if fixable.is_empty() {
        return writeln!(out, "Nothing to fix.");
    }
    writeln!(out, "Would fix:")?;
    for result in fixable {
        match &result.fix_hint {
            Some(hint) => writeln!(out, "  {}: {hint}", result.name)?,
            None => writeln!(out, "  {}", result.name)?,
        }
    }
    Ok(())
}

/// Run the doctor and return the process exit code.
pub fn main_entry() -> Result<i32> {
    let cli = Cli::parse();
    init_logging(&cli);

    let town_root = match &cli.town {
        Some(town) => town.clone(),
        None => {
            let cwd = env::current_dir().context("Failed to read current directory")?;
            find_town_root(&cwd).context("Not inside a Gas Town workspace (use --town)")?
        }
    };
    let config = DoctorConfig::load(&town_root)?.apply_env(|key| env::var(key).ok())?;
    let mut doctor = build_doctor(&config);
    let identities = doctor.identities();

    let mut stdout = io::stdout().lock();
    if cli.category.as_deref() == Some(LIST_COMMAND) && cli.check.is_none() {
        print_list(&mut stdout, &identities)?;
        return Ok(0);
    }

    let selected = select(&cli, &identities)?;
    if selected.is_empty() {
        bail!("No checks selected");
    }
    doctor.retain(&selected);

    let ctx = CheckContext {
        town_root: town_root.clone(),
        rig_name: cli.rig.clone(),
        verbose: cli.verbose,
        restart_sessions: cli.restart_sessions,
    };
    if let Some(rig_path) = ctx.rig_path() {
        if !rig_path.is_dir() {
            bail!("Rig not found: {}", rig_path.display());
        }
    }

    let options = StreamOptions {
        slow_threshold: cli.slow.or_else(|| config.slow_threshold()),
        tty: !cli.json && Term::stdout().is_term(),
    };
    let sink: Option<&mut dyn Write> = if cli.json { None } else { Some(&mut stdout) };

    let apply_fixes = cli.fix && !cli.dry_run;
    let report = if apply_fixes {
        let _lock = FixLock::acquire(&town_root).context("Cannot start fix pass")?;
        doctor.fix_streaming(&ctx, sink, options)
    } else {
        doctor.run_streaming(&ctx, sink, options)
    };

    if cli.json {
        writeln!(stdout, "{}", serde_json::to_string_pretty(&report)?)?;
    } else {
        Painter::new(options.tty).print_report(&mut stdout, &report, cli.verbose)?;
        if cli.dry_run {
            writeln!(stdout)?;
            print_dry_run(&mut stdout, &report, &identities)?;
        }
    }
    stdout.flush()?;

    let failed = report.has_errors() && !cli.dry_run;
    Ok(if failed { 1 } else { 0 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn durations() {
        assert_eq!(parse_duration("500ms"), Ok(Duration::from_millis(500)));
        assert_eq!(parse_duration("2s"), Ok(Duration::from_secs(2)));
        assert_eq!(parse_duration("1.5s"), Ok(Duration::from_millis(1500)));
        assert_eq!(parse_duration("1m"), Ok(Duration::from_secs(60)));
        assert_eq!(parse_duration("3"), Ok(Duration::from_secs(3)));
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("-1s").is_err());
        assert!(parse_duration("1e300s").is_err());
    }

    #[test]
    fn slow_flag_defaults_to_one_second() {
        let cli = Cli::parse_from(["gt-doctor", "--slow", "core"]);
        assert_eq!(cli.slow, Some(Duration::from_secs(1)));
        assert_eq!(cli.category.as_deref(), Some("core"));

        let cli = Cli::parse_from(["gt-doctor", "--slow=250ms"]);
        assert_eq!(cli.slow, Some(Duration::from_millis(250)));
    }

    #[test]
    fn positional_and_check_flag_conflict() {
        assert!(Cli::try_parse_from(["gt-doctor", "core", "--check", "settings"]).is_err());
        assert!(Cli::try_parse_from(["gt-doctor", "--dry-run"]).is_err());
    }

    fn identities() -> Vec<CheckIdentity> {
        build_doctor(&DoctorConfig::default()).identities()
    }

    #[test]
    fn disabled_checks_are_not_registered() {
        let config = DoctorConfig {
            disabled_checks: vec!["hook_singleton".to_string()],
            ..DoctorConfig::default()
        };
        let names: Vec<_> = build_doctor(&config)
            .identities()
            .into_iter()
            .map(|identity| identity.name)
            .collect();
        assert!(!names.contains(&"hook-singleton"));
        assert!(names.contains(&"hook-attachment-valid"));
    }

    #[test]
    fn all_is_rejected() {
        let cli = Cli::parse_from(["gt-doctor", "all"]);
        let err = select(&cli, &identities()).unwrap_err();
        assert!(err.to_string().contains("without arguments"));
    }

    #[test]
    fn unknown_category_suggests() {
        let cli = Cli::parse_from(["gt-doctor", "hoks"]);
        let err = select(&cli, &identities()).unwrap_err().to_string();
        assert!(err.contains("Did you mean: Hooks?"), "{err}");
        assert!(err.contains("Valid categories: Core"), "{err}");
    }

    #[test]
    fn unknown_check_within_category_lists_its_checks() {
        let cli = Cli::parse_from(["gt-doctor", "hooks", "hook-singelton"]);
        let err = select(&cli, &identities()).unwrap_err().to_string();
        assert!(err.contains("Did you mean: hook-singleton?"), "{err}");
        assert!(err.contains("Checks in Hooks: hook-attachment-valid, hook-singleton"), "{err}");
    }

    #[test]
    fn check_tokens_mix_names_and_categories() {
        let ids = identities();
        let cli = Cli::parse_from(["gt-doctor", "--check", "hooks", "--check", "settings"]);
        let names: Vec<_> = select(&cli, &ids)
            .unwrap()
            .into_iter()
            .map(|idx| ids[idx].name)
            .collect();
        assert_eq!(names, vec!["hook-attachment-valid", "hook-singleton", "settings"]);
    }
}
