//! End-to-end run/fix cycles over a temporary town.

use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use town_doctor::checks::{BeadsDatabaseCheck, RigRegistryCheck, StaleBeadsRedirectCheck};
use town_doctor::{
    filter_by_category, filter_checks, CategoryFilterError, CheckContext, CheckStatus, Doctor,
    StreamOptions,
};

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// One registered rig with a local store, a crew worktree missing its
/// redirect and a polecat whose redirected store kept runtime files.
fn broken_town() -> TempDir {
    let temp = TempDir::new().expect("tempdir");
    let town = temp.path();
    write(&town.join("mayor/town.json"), r#"{"name":"test"}"#);
    write(
        &town.join("mayor/rigs.json"),
        r#"{"version":1,"rigs":{"gastown":{"git_url":"x"}}}"#,
    );
    write(&town.join(".beads/routes.jsonl"), "{\"prefix\":\"gt-\",\"path\":\"gastown\"}\n");
    write(&town.join("gastown/.beads/issues.jsonl"), "{}\n");
    fs::create_dir_all(town.join("gastown/crew/max/.beads")).unwrap();
    write(&town.join("gastown/polecats/toast/.beads/redirect"), "../../.beads\n");
    write(&town.join("gastown/polecats/toast/.beads/beads.db"), "stale");
    write(&town.join("gastown/polecats/toast/.beads/daemon.pid"), "42");
    temp
}

fn doctor() -> Doctor {
    let mut doctor = Doctor::new();
    doctor.register(RigRegistryCheck::new());
    doctor.register(BeadsDatabaseCheck::new());
    doctor.register(StaleBeadsRedirectCheck::new());
    doctor
}

#[test]
fn fix_converges_and_marks_results() {
    let temp = broken_town();
    let ctx = CheckContext::new(temp.path());
    let mut doctor = doctor();

    let before = doctor.run(&ctx);
    let stale = before.get("stale-beads-redirect").unwrap();
    assert_eq!(stale.status, CheckStatus::Warning);
    assert_eq!(stale.message, "2 beads redirect issue(s) found");
    assert!(before.has_warnings());

    let fixed = doctor.fix(&ctx);
    let stale = fixed.get("stale-beads-redirect").unwrap();
    assert!(stale.fixed);
    assert!(stale.message.ends_with(" (fixed)"));
    assert!(!temp.path().join("gastown/polecats/toast/.beads/beads.db").exists());
    assert_eq!(
        fs::read_to_string(temp.path().join("gastown/crew/max/.beads/redirect")).unwrap(),
        "../../.beads\n"
    );
    assert!(fixed.is_healthy());

    let after = doctor.run(&ctx);
    assert_eq!(after.summary.ok, 3);
    assert!(after.checks.iter().all(|result| !result.fixed));
}

#[test]
fn streaming_without_tty_writes_plain_lines() {
    let temp = broken_town();
    let ctx = CheckContext::new(temp.path());
    let mut out = Vec::new();

    let report = doctor().run_streaming(
        &ctx,
        Some(&mut out),
        StreamOptions {
            slow_threshold: None,
            tty: false,
        },
    );

    let text = String::from_utf8(out).unwrap();
    assert_eq!(report.summary.total, 3);
    assert!(text.contains("PASS  rig-registry"));
    assert!(text.contains("WARN  stale-beads-redirect"));
    assert!(!text.contains('\r'));
}

#[test]
fn selection_by_name_and_category() {
    let identities = doctor().identities();

    let selected = filter_checks(&identities, &["cleanup".to_string(), "RIG_REGISTRY".to_string()]);
    assert_eq!(selected.matched, vec![2, 0]);
    assert!(selected.unmatched.is_empty());

    let err = filter_by_category(&identities, Some("core"), Some("hooks")).unwrap_err();
    assert_eq!(
        err,
        CategoryFilterError::UnknownCheck {
            input: "hooks".to_string(),
            category: "Core".to_string(),
        }
    );
}

#[test]
fn retained_subset_runs_alone() {
    let temp = broken_town();
    let mut doctor = doctor();
    doctor.retain(&[1]);
    let report = doctor.run(&CheckContext::new(temp.path()));
    assert_eq!(report.checks.len(), 1);
    assert_eq!(report.checks[0].name, "beads-database");
}
