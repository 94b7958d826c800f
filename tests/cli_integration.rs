//! Integration tests for the birdfuse binary.

#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const VISUAL_EVENTS: &str = r#"{"id":"v1","timestamp":"2025-05-01T08:00:00Z","species":"Cyanocitta cristata (Blue Jay)","confidence":0.95}
{"id":"v2","timestamp":"2025-05-01T08:10:00Z","species":[{"name":"Passer domesticus (House Sparrow)","confidence":0.9},{"name":"Passer montanus (Eurasian Tree Sparrow)","confidence":0.05}]}
"#;

const AUDIO_EVENTS: &str = r#"{"id":"a1","timestamp":"2025-05-01T08:00:02Z","common_name":"Blue Jay","scientific_name":"Cyanocitta cristata","confidence":0.78}
{"id":"a2","timestamp":"2025-05-01T09:00:00Z","common_name":"Northern Cardinal","species":"Cardinalis cardinalis","confidence":0.8}
"#;

/// Isolated home, config and data directories for one test.
struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn db(&self) -> PathBuf {
        self.path().join("data").join("birds.db")
    }

    fn cmd(&self) -> assert_cmd::Command {
        let mut cmd = cargo_bin_cmd!("birdfuse");
        cmd.env("HOME", self.path())
            .env("XDG_CONFIG_HOME", self.path().join("config"))
            .env("XDG_DATA_HOME", self.path().join("share"))
            .env("NO_COLOR", "1")
            .env_remove("RUST_LOG")
            .env_remove("BIRDFUSE_DB")
            .env_remove("BIRDFUSE_WINDOW")
            .env_remove("BIRDFUSE_FUSION");
        cmd.arg("--db").arg(self.db());
        cmd
    }

    fn ingest(&self) -> assert_cmd::assert::Assert {
        let visual = self.path().join("visual.ndjson");
        let audio = self.path().join("audio.ndjson");
        std::fs::write(&visual, VISUAL_EVENTS).unwrap();
        std::fs::write(&audio, AUDIO_EVENTS).unwrap();

        self.cmd()
            .arg("ingest")
            .arg("--visual")
            .arg(&visual)
            .arg("--audio")
            .arg(&audio)
            .arg("--no-progress")
            .assert()
    }
}

#[test]
fn test_ingest_then_list_sightings() {
    let sandbox = Sandbox::new();
    sandbox
        .ingest()
        .success()
        .stderr(predicate::str::contains("Correlated 1 sightings"));

    assert!(sandbox.db().exists());
    assert!(!Path::new(&format!("{}.birdfuse.lock", sandbox.db().display())).exists());

    sandbox
        .cmd()
        .arg("sightings")
        .assert()
        .success()
        .stdout(predicate::str::contains("Blue Jay (Cyanocitta cristata)"))
        .stdout(predicate::str::contains("+2.0s"));
}

#[test]
fn test_stats_json() {
    let sandbox = Sandbox::new();
    sandbox.ingest().success();

    sandbox
        .cmd()
        .args(["stats", "--date", "2025-05-01", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"Blue Jay\""))
        .stdout(predicate::str::contains("\"correlated_count\": 1"))
        .stdout(predicate::str::contains("\"House Sparrow\""))
        .stdout(predicate::str::contains("\"Northern Cardinal\""));
}

#[test]
fn test_today_feed_and_digest() {
    let sandbox = Sandbox::new();
    sandbox.ingest().success();

    sandbox
        .cmd()
        .args(["today", "--date", "2025-05-01"])
        .assert()
        .success()
        .stdout(predicate::str::contains("08:10:00  visual"))
        .stdout(predicate::str::contains("House Sparrow"));

    sandbox
        .cmd()
        .args(["digest", "--date", "2025-05-01"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "BIRD WATCHER DAILY DIGEST - Thursday, May 01, 2025",
        ))
        .stdout(predicate::str::contains("1. Blue Jay"));
}

#[test]
fn test_export_ebird_to_stdout() {
    let sandbox = Sandbox::new();
    sandbox.ingest().success();

    sandbox
        .cmd()
        .args([
            "export-ebird",
            "--start",
            "2025-05-01",
            "--end",
            "2025-05-01",
            "--no-csv-bom",
        ])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("Common Name,Scientific Name,Count"))
        .stdout(predicate::str::contains("Blue Jay,Cyanocitta cristata,1"))
        .stdout(predicate::str::contains("05/01/2025,08:00"));
}

#[test]
fn test_export_rejects_reversed_range() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["export-ebird", "--start", "2025-05-02", "--end", "2025-05-01"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("is after end date"));
}

#[test]
fn test_ingest_refuses_locked_store() {
    let sandbox = Sandbox::new();
    std::fs::create_dir_all(sandbox.db().parent().unwrap()).unwrap();
    let lock = format!("{}.birdfuse.lock", sandbox.db().display());
    std::fs::write(&lock, "{}").unwrap();

    sandbox
        .ingest()
        .failure()
        .stderr(predicate::str::contains("locked by another process"));
    assert!(Path::new(&lock).exists());
}

#[test]
fn test_both_streams_on_stdin_rejected() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["ingest", "--visual", "-", "--audio", "-", "--no-progress"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot both read standard input"));
}

#[test]
fn test_invalid_window_rejected_by_parser() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["ingest", "--visual", "v", "--audio", "a", "--window", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("window"));
}

#[test]
fn test_prune_requires_retention() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .arg("prune")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no retention period"));
}

#[test]
fn test_prune_keeps_recent_data() {
    let sandbox = Sandbox::new();
    sandbox.ingest().success();

    sandbox
        .cmd()
        .args(["prune", "--older-than-days", "36500"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 0 row(s)"));
}

#[test]
fn test_config_path_uses_platform_dir() {
    let sandbox = Sandbox::new();
    sandbox
        .cmd()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}
