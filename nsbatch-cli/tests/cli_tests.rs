use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;

/// Check if running as root
fn is_root() -> bool {
    nix::unistd::geteuid().is_root()
}

fn nsbatch() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_nsbatch"));
    cmd.env_remove("RUST_LOG");
    cmd
}

/// Fresh scratch directory for one test
fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("nsbatch-cli-{name}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn stdout_of(cmd: &mut Command) -> String {
    let output = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8(output).unwrap()
}

#[test]
fn test_help_command() {
    nsbatch()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Batch provisioner"))
        .stdout(predicate::str::contains("--range"))
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--strict"));
}

#[test]
fn test_version_command() {
    nsbatch()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("nsbatch"));
}

#[test]
fn test_no_arguments_prints_usage() {
    nsbatch()
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("Exec:").not());
}

#[test]
fn test_missing_workers_prints_usage_and_stops() {
    nsbatch()
        .args(["--dry-run", "create"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("Exec:").not());
}

#[test]
fn test_unknown_mode_does_nothing() {
    nsbatch()
        .args(["frobnicate", "4"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Exec:").not())
        .stderr(predicate::str::contains("Unknown mode"));
}

#[test]
fn test_dry_run_create_order() {
    let stdout = stdout_of(nsbatch().args(["--dry-run", "-r", "0..2", "create", "1"]));

    let expected = [
        "Creating namespaces: [0, 2)",
        "Exec: modprobe ip_conntrack",
        "Exec: ip netns add test-router-0",
        "Exec: ip link add test-eth-00 type dummy",
        "Exec: ip link set test-eth-00 netns test-router-0",
        "Exec: ip netns exec test-router-0 ifconfig test-eth-00 up",
        "Exec: ip link add test-eth-01 type dummy",
        "namespace: test-router-0 created",
        "Exec: ip netns add test-router-1",
        "Exec: ip netns exec test-router-1 ifconfig test-eth-11 up",
        "namespace: test-router-1 created",
        "create: 1 ranges, 2 namespaces, 15 commands, 0 failed",
    ];

    let mut from = 0;
    for line in expected {
        let at = stdout[from..]
            .find(line)
            .unwrap_or_else(|| panic!("missing or out of order: {line}\n{stdout}"));
        from += at + line.len();
    }
}

#[test]
fn test_dry_run_delete() {
    let stdout = stdout_of(nsbatch().args(["--dry-run", "-r", "5..6", "delete", "2"]));

    assert!(stdout.contains("Deleting namespaces: [5, 6)"));
    assert!(stdout.contains("Exec: ip netns del test-router-5"));
    assert!(stdout.contains("Exec: ip link del test-eth-50"));
    assert!(stdout.contains("Exec: ip link del test-eth-51"));
    assert!(!stdout.contains("modprobe"));
    assert_eq!(stdout.matches("Exec:").count(), 3);
}

#[test]
fn test_dry_run_options() {
    let stdout = stdout_of(nsbatch().args([
        "--dry-run",
        "-r",
        "1..2",
        "-i",
        "3",
        "--delimited-names",
        "--module",
        "nf_conntrack",
        "--strict",
        "create",
        "1",
    ]));

    assert!(stdout.contains("Exec: modprobe nf_conntrack"));
    assert!(stdout.contains("Exec: ip link add test-eth-1-2 type dummy"));
    assert!(!stdout.contains("test-eth-13"));
}

#[test]
fn test_json_report() {
    let stdout = stdout_of(nsbatch().args([
        "--dry-run", "--json", "-r", "0..2", "-r", "10..11", "delete", "2",
    ]));

    assert!(!stdout.contains("Exec:"));
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["mode"], "delete");
    assert_eq!(report["ranges"].as_array().unwrap().len(), 2);
    assert_eq!(report["ranges"][0]["range"], serde_json::json!([0, 2]));
    assert_eq!(report["ranges"][1]["namespaces"], 1);
}

#[test]
fn test_config_file() {
    let dir = scratch_dir("config");
    let path = dir.join("workload.json");
    std::fs::write(
        &path,
        r#"{"ranges": [[7, 8]], "interfaces_per_namespace": 1, "naming": "delimited"}"#,
    )
    .unwrap();

    let stdout = stdout_of(nsbatch().arg("--dry-run").arg("-c").arg(&path).args(["create", "1"]));
    std::fs::remove_dir_all(&dir).unwrap();

    assert!(stdout.contains("Exec: ip link add test-eth-7-0 type dummy"));
    assert_eq!(stdout.matches("Exec:").count(), 5);
}

#[test]
fn test_missing_config_file() {
    nsbatch()
        .args(["--dry-run", "-c", "/nonexistent/nsbatch.json", "create", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config"));
}

#[test]
fn test_zero_workers_rejected() {
    nsbatch()
        .args(["--dry-run", "-r", "0..2", "create", "0"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Exec:").not())
        .stderr(predicate::str::contains("worker count"));
}

#[test]
fn test_invalid_range_rejected() {
    nsbatch()
        .args(["--dry-run", "-r", "5..2", "create", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("5..2"));
}

#[test]
fn test_overlapping_ranges_rejected() {
    nsbatch()
        .args(["--dry-run", "-r", "0..10", "-r", "5..15", "create", "1"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Exec:").not())
        .stderr(predicate::str::contains("overlap"));
}

#[test]
fn test_status_mode() {
    let dir = scratch_dir("status");
    for name in ["test-router-1", "test-router-42", "unrelated"] {
        std::fs::write(dir.join(name), b"").unwrap();
    }

    let stdout = stdout_of(
        nsbatch()
            .arg("--netns-dir")
            .arg(&dir)
            .args(["-r", "0..3", "status", "1"]),
    );
    std::fs::remove_dir_all(&dir).unwrap();

    assert!(stdout.contains("status: 3 expected, 1 present, 2 missing, 1 unexpected"));
    assert!(stdout.contains("unexpected: test-router-42"));
    assert!(!stdout.contains("Exec:"));
}

#[test]
fn test_status_links_skipped_on_dry_run() {
    let dir = scratch_dir("links-dry");
    std::fs::write(dir.join("test-router-0"), b"").unwrap();

    nsbatch()
        .arg("--netns-dir")
        .arg(&dir)
        .args(["--links", "--dry-run", "-r", "0..1", "status", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("status: 1 expected, 1 present"))
        .stdout(predicate::str::contains("link problems").not())
        .stderr(predicate::str::contains("skipping the link check"));
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_status_links_with_no_namespaces() {
    // Nothing present, so no namespace is entered
    let dir = scratch_dir("links-empty");

    let stdout = stdout_of(
        nsbatch()
            .arg("--netns-dir")
            .arg(&dir)
            .args(["--links", "-r", "0..2", "status", "2"]),
    );
    std::fs::remove_dir_all(&dir).unwrap();

    assert!(stdout.contains("status: 2 expected, 0 present, 2 missing, 0 unexpected, 0 with link problems"));
}

#[test]
fn test_status_json_with_missing_dir() {
    let stdout = stdout_of(nsbatch().args([
        "--json",
        "--netns-dir",
        "/nonexistent/netns",
        "-r",
        "0..2",
        "status",
        "1",
    ]));

    let status: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(status["expected"], 2);
    assert_eq!(status["missing"], serde_json::json!([0, 1]));
    assert!(status.get("links").is_none());
}

#[test]
fn test_strict_failure_exits_nonzero() {
    // As root this would really create test-router-0
    if is_root() {
        return;
    }

    // Without privileges either modprobe or `ip netns add` is refused
    nsbatch()
        .args(["--strict", "-r", "0..1", "create", "1"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("1 ranges aborted"))
        .stdout(predicate::str::contains("[0, 1): "))
        .stderr(predicate::str::contains("Not running as root"));
}

#[test]
fn test_best_effort_failure_exits_zero() {
    if is_root() {
        return;
    }

    nsbatch()
        .args(["-r", "0..1", "-i", "1", "delete", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Exec: ip netns del test-router-0"))
        .stdout(predicate::str::contains("0 failed").not())
        .stdout(predicate::str::contains("ranges aborted").not());
}
