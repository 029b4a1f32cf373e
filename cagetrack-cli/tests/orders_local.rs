use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use serde_json::Value;
use tempfile::TempDir;

fn cagetrack_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("cagetrack"));
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG");
    cmd
}

fn list_json(home: &Path) -> Vec<Value> {
    let out = cagetrack_cmd(home)
        .args(["order", "list", "--json"])
        .output()
        .expect("run order list");
    assert!(out.status.success());
    let parsed: Value = serde_json::from_slice(&out.stdout).expect("json output");
    parsed.as_array().cloned().unwrap_or_default()
}

fn count_for(home: &Path, cage: &str) -> u64 {
    let out = cagetrack_cmd(home)
        .args(["counts", "--json"])
        .output()
        .expect("run counts");
    assert!(out.status.success());
    let parsed: Value = serde_json::from_slice(&out.stdout).expect("json output");
    parsed
        .as_array()
        .expect("array")
        .iter()
        .find(|c| c["cage"] == cage)
        .and_then(|c| c["in_cage"].as_u64())
        .unwrap_or_else(|| panic!("no count for {cage}"))
}

#[test]
fn add_list_and_count_orders() {
    let home = TempDir::new().expect("home");

    cagetrack_cmd(home.path())
        .args(["order", "add", "  ORD-1  ", "--cage", "B-02"])
        .assert()
        .success()
        .stdout(contains("Scanned ORD-1 into B-02"));
    cagetrack_cmd(home.path())
        .args(["order", "add", "ORD-2"])
        .assert()
        .success()
        .stdout(contains("into A-01"));

    let orders = list_json(home.path());
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0]["id"], "ORD-1");
    assert_eq!(orders[0]["status"], "In Cage");

    assert_eq!(count_for(home.path(), "B-02"), 1);
    assert_eq!(count_for(home.path(), "A-01"), 1);
    assert_eq!(count_for(home.path(), "C-02"), 0);

    assert!(home.path().join(".cagetrack/state.yaml").is_file());
}

#[test]
fn duplicate_scan_names_the_existing_cage() {
    let home = TempDir::new().expect("home");
    cagetrack_cmd(home.path())
        .args(["order", "add", "ORD-9", "--cage", "A-03"])
        .assert()
        .success();

    cagetrack_cmd(home.path())
        .args(["order", "add", "ORD-9", "--cage", "A-04"])
        .assert()
        .failure()
        .stderr(contains("order ORD-9 is already in A-03"));
    assert_eq!(list_json(home.path()).len(), 1);
}

#[test]
fn empty_id_and_unknown_cage_are_rejected() {
    let home = TempDir::new().expect("home");
    cagetrack_cmd(home.path())
        .args(["order", "add", "   "])
        .assert()
        .failure()
        .stderr(contains("order id cannot be empty"));
    cagetrack_cmd(home.path())
        .args(["order", "add", "ORD-1", "--cage", "Z-99"])
        .assert()
        .failure()
        .stderr(contains("cage 'Z-99' is not registered"));
    assert!(list_json(home.path()).is_empty());
}

#[test]
fn destructive_commands_need_confirmation() {
    let home = TempDir::new().expect("home");
    cagetrack_cmd(home.path())
        .args(["bulk", "A-01", "2"])
        .assert()
        .success();

    cagetrack_cmd(home.path())
        .args(["reset-all"])
        .assert()
        .failure()
        .stderr(contains("without --yes"));
    cagetrack_cmd(home.path())
        .args(["retire", "A-01"])
        .assert()
        .failure()
        .stderr(contains("without --yes"));
    assert_eq!(list_json(home.path()).len(), 2);

    cagetrack_cmd(home.path())
        .args(["reset-all", "--yes"])
        .assert()
        .success()
        .stdout(contains("Deleted 2 order(s)"));
    cagetrack_cmd(home.path())
        .args(["reset-all", "--yes"])
        .assert()
        .failure()
        .stderr(contains("nothing to reset"));
}

#[test]
fn bulk_then_retire_completes_cage() {
    let home = TempDir::new().expect("home");
    cagetrack_cmd(home.path())
        .args(["bulk", "A-02", "3"])
        .assert()
        .success()
        .stdout(contains("Added 3 orders to A-02"));
    assert_eq!(count_for(home.path(), "A-02"), 3);

    cagetrack_cmd(home.path())
        .args(["retire", "A-02", "--yes"])
        .assert()
        .success()
        .stdout(contains("Completed 3 order(s)"));
    assert_eq!(count_for(home.path(), "A-02"), 0);
    assert!(list_json(home.path())
        .iter()
        .all(|o| o["status"] == "Completed"));

    cagetrack_cmd(home.path())
        .args(["retire", "A-02", "--yes"])
        .assert()
        .failure()
        .stderr(contains("has no orders with status 'In Cage'"));
}

#[test]
fn bulk_rejects_counts_outside_limits() {
    let home = TempDir::new().expect("home");
    cagetrack_cmd(home.path())
        .args(["bulk", "A-01", "0"])
        .assert()
        .failure()
        .stderr(contains("bulk count must be between 1 and 10000"));
    cagetrack_cmd(home.path())
        .args(["bulk", "A-01", "-4"])
        .assert()
        .failure()
        .stderr(contains("got -4"));
    cagetrack_cmd(home.path())
        .args(["bulk", "A-01", "9223372036854775807"])
        .assert()
        .failure()
        .stderr(contains("got 9223372036854775807"));
    assert!(list_json(home.path()).is_empty());
}

#[test]
fn delete_uses_the_compound_key() {
    let home = TempDir::new().expect("home");
    cagetrack_cmd(home.path())
        .args(["order", "add", "ORD-5"])
        .assert()
        .success();
    let created_at = list_json(home.path())[0]["createdAt"]
        .as_str()
        .expect("createdAt")
        .to_string();

    cagetrack_cmd(home.path())
        .args(["order", "delete", "ORD-5", "--created-at", "2001-01-01T00:00:00Z", "--yes"])
        .assert()
        .failure()
        .stderr(contains("no order 'ORD-5'"));

    cagetrack_cmd(home.path())
        .args(["order", "delete", "ORD-5", "--created-at", &created_at, "--yes"])
        .assert()
        .success()
        .stdout(contains("Deleted ORD-5"));
    assert!(list_json(home.path()).is_empty());
}

#[test]
fn cage_rename_moves_orders() {
    let home = TempDir::new().expect("home");
    cagetrack_cmd(home.path())
        .args(["bulk", "C-01", "2"])
        .assert()
        .success();

    cagetrack_cmd(home.path())
        .args(["cage", "rename", "C-01", "C-10"])
        .assert()
        .success()
        .stdout(contains("Renamed C-01 to C-10 (2 order(s) updated)"));
    assert_eq!(count_for(home.path(), "C-10"), 2);

    cagetrack_cmd(home.path())
        .args(["cage", "list"])
        .assert()
        .success()
        .stdout(contains("C-10").and(contains("C-01\n").not()));

    cagetrack_cmd(home.path())
        .args(["cage", "rename", "C-10", "A-01"])
        .assert()
        .failure()
        .stderr(contains("the new name is already registered"));
}

#[test]
fn cage_reset_reports_orphans() {
    let home = TempDir::new().expect("home");
    cagetrack_cmd(home.path())
        .args(["cage", "add", "X-01"])
        .assert()
        .success();
    cagetrack_cmd(home.path())
        .args(["cage", "add", "X-01"])
        .assert()
        .failure()
        .stderr(contains("already registered"));
    cagetrack_cmd(home.path())
        .args(["order", "add", "ORD-X", "--cage", "X-01"])
        .assert()
        .success();

    cagetrack_cmd(home.path())
        .args(["cage", "reset", "--yes"])
        .assert()
        .success()
        .stdout(contains("Restored 19 default cages").and(contains("X-01")));

    cagetrack_cmd(home.path())
        .args(["cage", "list"])
        .assert()
        .success()
        .stdout(contains("Not registered").and(contains("  X-01")));
    assert_eq!(list_json(home.path())[0]["cage"], "X-01");
}

#[test]
fn export_writes_csv_sheet() {
    let home = TempDir::new().expect("home");
    let out = TempDir::new().expect("out");

    cagetrack_cmd(home.path())
        .args(["export", "--out"])
        .arg(out.path())
        .assert()
        .failure()
        .stderr(contains("nothing to export"));

    cagetrack_cmd(home.path())
        .args(["bulk", "B-01", "2"])
        .assert()
        .success();
    cagetrack_cmd(home.path())
        .args(["export", "--out"])
        .arg(out.path())
        .assert()
        .success()
        .stdout(contains("Exported 2 order(s)"));

    let files: Vec<_> = fs::read_dir(out.path())
        .expect("read out dir")
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .collect();
    assert_eq!(files.len(), 1);
    let name = files[0].file_name().and_then(|n| n.to_str()).expect("name");
    assert!(name.starts_with("cagetrack_orders_all_"));
    assert!(name.ends_with(".csv"));

    let text = fs::read_to_string(&files[0]).expect("read sheet");
    assert!(text.starts_with("id,cage,createdAt,status\n"));
    assert_eq!(text.lines().count(), 3);
}

#[test]
fn export_writes_filtered_xlsx_workbook() {
    let home = TempDir::new().expect("home");
    let out = TempDir::new().expect("out");

    cagetrack_cmd(home.path())
        .args(["bulk", "C-03", "3"])
        .assert()
        .success();
    cagetrack_cmd(home.path())
        .args(["export", "--format", "xlsx", "--start", "2000-01-01", "--out"])
        .arg(out.path())
        .assert()
        .success()
        .stdout(contains("Exported 3 order(s)"));

    let sheet = out
        .path()
        .join("cagetrack_orders_filtered_2000-01-01_to_end.xlsx");
    let bytes = fs::read(&sheet).expect("read workbook");
    assert!(bytes.starts_with(b"PK"));
    assert_eq!(fs::read_dir(out.path()).expect("read out dir").count(), 1);
}

#[test]
fn duplicate_policy_comes_from_config() {
    let home = TempDir::new().expect("home");
    let root = home.path().join(".cagetrack");
    fs::create_dir_all(&root).expect("root");
    fs::write(root.join("config.yaml"), "duplicate_policy: all_statuses\n").expect("config");

    cagetrack_cmd(home.path())
        .args(["order", "add", "ORD-1", "--cage", "A-01"])
        .assert()
        .success();
    cagetrack_cmd(home.path())
        .args(["retire", "A-01", "--yes"])
        .assert()
        .success();
    cagetrack_cmd(home.path())
        .args(["order", "add", "ORD-1", "--cage", "A-02"])
        .assert()
        .failure()
        .stderr(contains("Completed"));
}
