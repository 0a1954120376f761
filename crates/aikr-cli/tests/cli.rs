//! CLI command integration tests.
//! Each test uses a temp directory via AIKR_DATA_DIR for full isolation.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const ANIMALS: &str = "\
// taxonomy
<cat --> mammal>. %1.0;0.9%
<mammal --> has-fur>.
<cat --> has-fur>?
";

fn aikr_cmd(data_dir: &TempDir) -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("aikr").unwrap();
    cmd.env("AIKR_DATA_DIR", data_dir.path());
    cmd
}

fn ingest_animals(dir: &TempDir) {
    let input = dir.path().join("animals.nal");
    std::fs::write(&input, ANIMALS).unwrap();
    aikr_cmd(dir)
        .arg("ingest")
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("3 statements, 0 rejected"));
}

fn extract_stat_value<'a>(stdout: &'a str, label: &str) -> &'a str {
    stdout
        .lines()
        .find(|l| l.starts_with(label))
        .and_then(|l| l.split_whitespace().nth(1))
        .unwrap_or("")
}

#[test]
fn stats_fresh_db() {
    let dir = TempDir::new().unwrap();
    aikr_cmd(&dir)
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("tick:       0"))
        .stdout(predicate::str::contains("concepts:   0"))
        .stdout(predicate::str::contains("beliefs:    0"));
}

#[test]
fn ingest_then_beliefs() {
    let dir = TempDir::new().unwrap();
    ingest_animals(&dir);

    aikr_cmd(&dir)
        .arg("beliefs")
        .assert()
        .success()
        .stdout(predicate::str::contains("<cat --> mammal>. %1.00;0.90%"))
        .stdout(predicate::str::contains("<mammal --> has-fur>. %1.00;0.90%"));

    aikr_cmd(&dir)
        .args(["beliefs", "--term", "mammal"])
        .assert()
        .success()
        .stdout(predicate::str::contains("<cat --> mammal>"));

    aikr_cmd(&dir)
        .args(["beliefs", "--term", "unicorn"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(no beliefs)"));
}

#[test]
fn ingest_reports_bad_lines() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("bad.nal");
    std::fs::write(&input, "<cat --> mammal>.\n<cat --> >.\n<a --> b>? %1.0;0.9%\n").unwrap();
    aikr_cmd(&dir)
        .arg("ingest")
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 statements, 2 rejected"))
        .stderr(predicate::str::contains(":2:"))
        .stderr(predicate::str::contains(":3:"));
}

#[test]
fn run_advances_tick() {
    let dir = TempDir::new().unwrap();
    ingest_animals(&dir);

    aikr_cmd(&dir)
        .args(["run", "--cycles", "20", "--seed", "7"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tick:       20"));

    let output = aikr_cmd(&dir).arg("stats").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(extract_stat_value(&stdout, "tick:"), "20");
    assert_ne!(extract_stat_value(&stdout, "concepts:"), "0");
}

#[test]
fn ask_unreachable_goal() {
    let dir = TempDir::new().unwrap();
    ingest_animals(&dir);

    aikr_cmd(&dir)
        .args(["ask", "<unicorn --> real>?", "--budget", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no solution (after 5 cycles)"));
}

#[test]
fn ask_derivable_goal_terminates() {
    let dir = TempDir::new().unwrap();
    ingest_animals(&dir);

    aikr_cmd(&dir)
        .args(["ask", "<cat --> has-fur>?", "--budget", "200"])
        .assert()
        .success()
        .stdout(predicate::str::contains("cycles)"));
}

#[test]
fn ask_rejects_malformed_statement() {
    let dir = TempDir::new().unwrap();
    aikr_cmd(&dir)
        .args(["ask", "<cat -->"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to parse statement"));
}

#[test]
fn export_import_roundtrip() {
    let dir = TempDir::new().unwrap();
    ingest_animals(&dir);

    let json = dir.path().join("memory.json");
    aikr_cmd(&dir)
        .arg("export")
        .arg(&json)
        .assert()
        .success()
        .stdout(predicate::str::contains("exported to"));
    let content = std::fs::read_to_string(&json).unwrap();
    assert!(content.contains("\"version\""));

    let fresh = TempDir::new().unwrap();
    aikr_cmd(&fresh)
        .arg("import")
        .arg(&json)
        .assert()
        .success()
        .stdout(predicate::str::contains("imported from"));

    aikr_cmd(&fresh)
        .arg("beliefs")
        .assert()
        .success()
        .stdout(predicate::str::contains("<cat --> mammal>"));
}

#[test]
fn invalid_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("aikr.toml");
    std::fs::write(&config, "bag_capacity = 0\n").unwrap();
    aikr_cmd(&dir)
        .arg("stats")
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load config"));
}
