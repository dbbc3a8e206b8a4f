use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use town_redirect::{
    clean_stale_files, setup_redirect, verify_rig_topology, RedirectIssueKind,
};

fn mkdirs(root: &Path, dirs: &[&str]) {
    for dir in dirs {
        fs::create_dir_all(root.join(dir)).unwrap();
    }
}

fn write(path: &Path, body: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

#[test]
fn local_rig_repair_converges_to_zero_issues() {
    let temp = tempfile::TempDir::new().expect("tempdir");
    let town = temp.path();
    let rig = town.join("gastown");
    mkdirs(
        &rig,
        &[
            ".beads",
            "crew/max/.beads",
            "refinery/rig/.beads",
            "polecats/nux/gastown/.beads",
            "crew/unprovisioned",
        ],
    );

    let report = verify_rig_topology(town, &rig).unwrap();
    assert_eq!(report.missing.len(), 3);
    assert!(report.incorrect.is_empty());
    assert!(report.issues().all(|i| i.kind() == RedirectIssueKind::Missing));

    for issue in report.issues() {
        setup_redirect(&issue.town_root, &issue.worktree_path).unwrap();
    }

    for (worktree, expected) in [
        ("crew/max", "../../.beads\n"),
        ("refinery/rig", "../../.beads\n"),
        ("polecats/nux/gastown", "../../../.beads\n"),
    ] {
        let body = fs::read_to_string(rig.join(worktree).join(".beads/redirect")).unwrap();
        assert_eq!(body, expected, "{worktree}");
    }
    assert!(!rig.join("crew/unprovisioned/.beads").exists());

    let again = verify_rig_topology(town, &rig).unwrap();
    assert!(again.is_empty(), "{again:?}");
}

#[test]
fn intermediate_hop_to_tracked_store_is_valid() {
    let temp = tempfile::TempDir::new().expect("tempdir");
    let town = temp.path();
    let rig = town.join("gastown");
    mkdirs(&rig, &["mayor/rig/.beads"]);
    write(&rig.join(".beads/redirect"), "mayor/rig/.beads\n");
    write(&rig.join("crew/max/.beads/redirect"), "../../.beads\n");
    write(&rig.join("crew/joe/.beads/redirect"), "../../mayor/rig/.beads/\n");
    write(&rig.join("crew/eve/.beads/redirect"), "../../../elsewhere/.beads\n");

    let report = verify_rig_topology(town, &rig).unwrap();
    assert!(report.missing.is_empty());
    assert_eq!(report.incorrect.len(), 1);
    let issue = &report.incorrect[0];
    assert_eq!(issue.worktree_path, rig.join("crew/eve"));
    assert_eq!(issue.current_target, "../../../elsewhere/.beads");
    assert_eq!(issue.expected_target, "../../mayor/rig/.beads");
    assert_eq!(issue.kind(), RedirectIssueKind::Incorrect);

    setup_redirect(town, &issue.worktree_path).unwrap();
    assert!(verify_rig_topology(town, &rig).unwrap().is_empty());
}

#[test]
fn rig_root_redirect_is_inlined_into_worktrees() {
    let temp = tempfile::TempDir::new().expect("tempdir");
    let town = temp.path();
    let rig = town.join("gastown");
    mkdirs(town, &["shared/.beads", "gastown/crew/max/.beads"]);
    write(&rig.join(".beads/redirect"), "../shared/.beads\n");

    let report = verify_rig_topology(town, &rig).unwrap();
    assert_eq!(report.missing.len(), 1);
    assert_eq!(report.missing[0].expected_target, "../../../shared/.beads");

    write(&rig.join("crew/max/.beads/redirect"), "../../.beads\n");
    assert!(verify_rig_topology(town, &rig).unwrap().is_empty());

    write(&rig.join("crew/max/.beads/redirect"), "../../../other/.beads\n");
    let report = verify_rig_topology(town, &rig).unwrap();
    assert_eq!(report.incorrect.len(), 1);
    assert_eq!(report.incorrect[0].expected_target, "../../../shared/.beads");
}

#[test]
fn redirect_into_a_cycle_is_reported_not_followed_forever() {
    let temp = tempfile::TempDir::new().expect("tempdir");
    let town = temp.path();
    let rig = town.join("gastown");
    mkdirs(&rig, &["mayor/rig/.beads"]);
    write(&rig.join("loop/a/.beads/redirect"), "../b/.beads\n");
    write(&rig.join("loop/b/.beads/redirect"), "../a/.beads\n");
    write(&rig.join("crew/max/.beads/redirect"), "../../loop/a/.beads\n");

    let report = verify_rig_topology(town, &rig).unwrap();
    assert_eq!(report.incorrect.len(), 1);
}

#[test]
fn stale_cleanup_after_repair_keeps_redirect() {
    let temp = tempfile::TempDir::new().expect("tempdir");
    let town = temp.path();
    let rig = town.join("gastown");
    mkdirs(&rig, &[".beads", "crew/max/.beads"]);
    write(&rig.join("crew/max/.beads/issues.db"), "stale");

    assert!(clean_stale_files(&rig.join("crew/max/.beads")).is_err());
    assert!(rig.join("crew/max/.beads/issues.db").exists());

    setup_redirect(town, &rig.join("crew/max")).unwrap();
    let removed = clean_stale_files(&rig.join("crew/max/.beads")).unwrap();
    assert_eq!(removed, vec![rig.join("crew/max/.beads/issues.db")]);
    assert!(rig.join("crew/max/.beads/redirect").exists());
}
