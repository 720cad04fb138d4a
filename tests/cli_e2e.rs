//! End-to-end CLI tests for the chunkstore binary.

// `Command::cargo_bin` is deprecated in assert_cmd >=2.0.17 in favor of
// `cargo::cargo_bin_cmd!` macro. Suppressed until migration to the new API.
#![allow(deprecated)]

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Binary command isolated from the user's config and log settings.
fn chunkstore(config_home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("chunkstore").unwrap();
    cmd.env("XDG_CONFIG_HOME", config_home).env_remove("RUST_LOG");
    cmd
}

fn write_chunkstore_config(config_home: &Path, contents: &str) {
    let config_dir = config_home.join("chunkstore");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(config_dir.join("config.toml"), contents).unwrap();
}

fn toml_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "\\\\")
}

fn seed_chunks(root: &Path, name: &str, chunks: &[(u64, &[u8])]) {
    let dir = root.join(format!("{name}.chunk"));
    fs::create_dir_all(&dir).unwrap();
    for (ordinal, bytes) in chunks {
        fs::write(dir.join(format!("{name}.chunk_{ordinal}")), bytes).unwrap();
    }
}

#[test]
fn test_cli_merge_relative_chunk_dir() {
    let temp = TempDir::new().unwrap();
    seed_chunks(temp.path(), "song.mp3", &[(1, b"ab"), (2, b"cd")]);

    chunkstore(temp.path())
        .current_dir(temp.path())
        .args(["merge", "song.mp3.chunk"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Merged song.mp3 (2 chunks, 4 bytes)"));

    assert_eq!(fs::read(temp.path().join("song.mp3")).unwrap(), b"abcd");
}

#[test]
fn test_cli_merge_rejects_absolute_path() {
    let temp = TempDir::new().unwrap();
    seed_chunks(temp.path(), "song.mp3", &[(1, b"ab")]);
    let absolute = temp.path().join("song.mp3.chunk");

    chunkstore(temp.path())
        .arg("merge")
        .arg(&absolute)
        .assert()
        .failure()
        .stderr(predicate::str::contains("must be relative"));

    assert!(absolute.join("song.mp3.chunk_1").exists());
}

#[test]
fn test_cli_merge_strict_fails_on_gap() {
    let temp = TempDir::new().unwrap();
    seed_chunks(temp.path(), "a.bin", &[(1, b"a"), (3, b"c")]);

    chunkstore(temp.path())
        .args(["merge", "a.bin.chunk", "--strict", "--root"])
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("has a gap"));
}

#[test]
fn test_cli_merge_all_uses_configured_storage_root() {
    let config_home = TempDir::new().unwrap();
    let storage = TempDir::new().unwrap();
    seed_chunks(storage.path(), "one.txt", &[(1, b"1")]);
    seed_chunks(storage.path(), "two.txt", &[(1, b"2"), (2, b"2")]);
    write_chunkstore_config(
        config_home.path(),
        &format!("storage_root = \"{}\"\n", toml_path(storage.path())),
    );

    chunkstore(config_home.path())
        .arg("merge-all")
        .assert()
        .success()
        .stdout(predicate::str::contains("Merged one.txt"))
        .stdout(predicate::str::contains("Merged two.txt"));

    assert_eq!(fs::read(storage.path().join("two.txt")).unwrap(), b"22");
}

#[test]
fn test_cli_merge_all_partial_failure_exits_nonzero() {
    let temp = TempDir::new().unwrap();
    seed_chunks(temp.path(), "good.bin", &[(1, b"g")]);
    seed_chunks(temp.path(), "empty.bin", &[(2, b"orphan")]);

    chunkstore(temp.path())
        .arg("merge-all")
        .arg(temp.path())
        .assert()
        .failure()
        .stdout(predicate::str::contains("Merged good.bin"))
        .stderr(predicate::str::contains("Failed empty.bin.chunk"));

    assert!(temp.path().join("empty.bin.chunk").exists());
}

#[test]
fn test_cli_merge_all_config_policy_rejects_gaps() {
    let temp = TempDir::new().unwrap();
    seed_chunks(temp.path(), "a.bin", &[(1, b"a"), (3, b"c")]);
    write_chunkstore_config(temp.path(), "merge_policy = \"reject_gaps\"\n");

    chunkstore(temp.path())
        .arg("merge-all")
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("has a gap"));
}

#[test]
fn test_cli_merge_all_empty_root() {
    let temp = TempDir::new().unwrap();

    chunkstore(temp.path())
        .arg("merge-all")
        .arg(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("No chunk directories found"));
}

#[test]
fn test_cli_plan_prints_schedule() {
    let temp = TempDir::new().unwrap();

    chunkstore(temp.path())
        .args([
            "plan",
            "--name",
            "video.mp4",
            "--total-size",
            "100",
            "--chunk-size",
            "30",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("90-"))
        .stdout(predicate::str::contains("100-"))
        .stdout(predicate::str::contains("video.mp4.chunk_5"));
}

#[test]
fn test_cli_plan_json_uses_configured_chunk_size() {
    let temp = TempDir::new().unwrap();
    write_chunkstore_config(temp.path(), "chunk_size = 50\n");

    let output = chunkstore(temp.path())
        .args(["plan", "--name", "x.bin", "--total-size", "100", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let tasks: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let boundaries: Vec<&str> = tasks
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["boundary"].as_str().unwrap())
        .collect();
    assert_eq!(boundaries, ["0-", "50-", "100-"]);
}

#[test]
fn test_cli_invalid_config_is_reported() {
    let temp = TempDir::new().unwrap();
    write_chunkstore_config(temp.path(), "chunk_size = nope\n");

    chunkstore(temp.path())
        .args(["plan", "--name", "x", "--total-size", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse config file"));
}
