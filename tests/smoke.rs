//! Smoke tests -- verify the binary runs and key subcommands exist.

use assert_cmd::Command;

#[test]
fn test_cli_help() {
    Command::cargo_bin("railwatch")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicates::str::contains(
            "Depot maintenance tracking and fleet health scoring",
        ));
}

#[test]
fn test_cli_version() {
    Command::cargo_bin("railwatch")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicates::str::contains("railwatch"));
}

#[test]
fn test_score_subcommand_exists() {
    Command::cargo_bin("railwatch")
        .unwrap()
        .args(["score", "--help"])
        .assert()
        .success()
        .stdout(predicates::str::contains("Dry-run"));
}

#[test]
fn test_report_subcommand_exists() {
    Command::cargo_bin("railwatch")
        .unwrap()
        .args(["report", "--help"])
        .assert()
        .success();
}

#[test]
fn test_recalc_subcommand_exists() {
    Command::cargo_bin("railwatch")
        .unwrap()
        .args(["recalc", "--help"])
        .assert()
        .success();
}

#[test]
fn test_score_dry_run_against_temp_db() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("railwatch.db");

    // First report on a seeded component: 95 * (0.5 + 0.3*1.0) = 76.
    Command::cargo_bin("railwatch")
        .unwrap()
        .args([
            "--db",
            db.to_str().unwrap(),
            "score",
            "--train",
            "Z2M-01",
            "--component",
            "frein",
            "--severity",
            "Urgent",
            "--immobilized",
        ])
        .assert()
        .success()
        .stdout(predicates::str::contains("76/100"))
        .stdout(predicates::str::contains("moyenne"));
}

#[test]
fn test_report_then_recalc_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("railwatch.db");
    let db = db.to_str().unwrap();

    Command::cargo_bin("railwatch")
        .unwrap()
        .args([
            "--db", db, "report", "--train", "Z2M-05", "--component", "moteur",
            "--severity", "Urgent", "--immobilized",
        ])
        .assert()
        .success()
        .stdout(predicates::str::contains("health now"));

    // 90 * 0.8 = 72 criticality -> health 28.
    Command::cargo_bin("railwatch")
        .unwrap()
        .args(["--db", db, "recalc", "--train", "Z2M-05"])
        .assert()
        .success()
        .stdout(predicates::str::contains("Z2M-05 : 28%"));
}
