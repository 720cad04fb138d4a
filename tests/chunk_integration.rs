//! Integration tests for the chunk module.
//!
//! These tests drive a task through its whole schedule, write each chunk the
//! way a transfer layer would, and merge the result.

use std::fs;
use std::path::Path;

use chunkstore_core::chunk::{
    ChunkError, ChunkStore, ChunkTask, MergePolicy, advance, chunk_file_name,
    expected_chunk_count, parse_chunk_file_name,
};
use tempfile::TempDir;

/// Simulates the transfer layer: writes `task.byte_len()` bytes of `source`
/// starting at the boundary into `task.path`.
fn transfer(task: &ChunkTask, source: &[u8]) {
    let start = usize::try_from(task.parsed_boundary().unwrap().start).unwrap();
    let len = usize::try_from(task.byte_len().unwrap()).unwrap();
    fs::create_dir_all(task.path.parent().unwrap()).unwrap();
    fs::write(&task.path, &source[start..start + len]).unwrap();
}

fn source_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[test]
fn test_download_then_merge_reproduces_source() {
    let temp = TempDir::new().expect("failed to create temp dir");
    let source = source_bytes(1000);

    let mut task = ChunkTask::first_chunk("data.bin", temp.path(), 1000, 128);
    let mut transfers = 0;
    loop {
        transfer(&task, &source);
        transfers += 1;
        if !advance(&mut task).expect("advance should succeed") {
            break;
        }
    }
    // Eight 128-byte ranges cover 1000 bytes, then one empty range at the end.
    assert_eq!(transfers, 9);

    let merged = ChunkStore::new(temp.path())
        .merge_one("data.bin.chunk")
        .expect("merge should succeed");

    assert_eq!(fs::read(&merged.output).unwrap(), source);
    assert_eq!(merged.bytes, 1000);
    assert!(!temp.path().join("data.bin.chunk").exists());
}

#[test]
fn test_expected_count_merge_matches_download() {
    let temp = TempDir::new().expect("failed to create temp dir");
    let source = source_bytes(100);

    let mut task = ChunkTask::first_chunk("clip.mp4", temp.path(), 100, 30);
    loop {
        transfer(&task, &source);
        if !advance(&mut task).unwrap() {
            break;
        }
    }

    let expected = expected_chunk_count(100, 30).unwrap();
    let merged = ChunkStore::new(temp.path())
        .with_policy(MergePolicy::Expect(expected))
        .merge_one("clip.mp4.chunk")
        .unwrap();
    assert_eq!(merged.chunks, 4);
    assert_eq!(fs::read(temp.path().join("clip.mp4")).unwrap(), source);
}

#[test]
fn test_interrupted_download_merges_with_gap_truncation() {
    let temp = TempDir::new().expect("failed to create temp dir");
    let chunk_dir = temp.path().join("report.pdf.chunk");
    fs::create_dir(&chunk_dir).unwrap();
    for (index, bytes) in [(0u64, b"B0"), (1, b"B1"), (3, b"B3")] {
        fs::write(chunk_dir.join(chunk_file_name("report.pdf", index)), bytes).unwrap();
    }

    let report = chunkstore_core::merge_all(temp.path()).unwrap();
    assert!(report.is_clean());
    assert_eq!(fs::read(temp.path().join("report.pdf")).unwrap(), b"B0B1");
    assert!(!chunk_dir.exists());
}

#[test]
fn test_strict_sweep_reports_gap_and_merges_the_rest() {
    let temp = TempDir::new().expect("failed to create temp dir");
    let gappy = temp.path().join("a.bin.chunk");
    fs::create_dir(&gappy).unwrap();
    fs::write(gappy.join("a.bin.chunk_1"), b"a").unwrap();
    fs::write(gappy.join("a.bin.chunk_3"), b"c").unwrap();
    let whole = temp.path().join("b.bin.chunk");
    fs::create_dir(&whole).unwrap();
    fs::write(whole.join("b.bin.chunk_1"), b"b").unwrap();

    let report = ChunkStore::new(temp.path())
        .with_policy(MergePolicy::RejectGaps)
        .merge_all()
        .unwrap();

    assert_eq!(report.merged.len(), 1);
    assert_eq!(report.merged[0].resource_name, "b.bin");
    assert_eq!(report.failures.len(), 1);
    assert!(matches!(
        report.failures[0].error,
        ChunkError::Gap { missing: 2, found: 1, .. }
    ));
    assert!(gappy.join("a.bin.chunk_3").exists());
}

#[test]
fn test_sweep_leaves_unrelated_merging_files_alone() {
    let temp = TempDir::new().expect("failed to create temp dir");
    fs::write(temp.path().join("x.bin.merging"), b"someone else's file").unwrap();
    let chunk_dir = temp.path().join("x.bin.chunk");
    fs::create_dir(&chunk_dir).unwrap();
    fs::write(chunk_dir.join("x.bin.chunk_1"), b"whole").unwrap();

    let report = chunkstore_core::merge_all(temp.path()).unwrap();
    assert!(report.is_clean());
    assert_eq!(fs::read(temp.path().join("x.bin")).unwrap(), b"whole");
    assert_eq!(
        fs::read(temp.path().join("x.bin.merging")).unwrap(),
        b"someone else's file"
    );
}

#[test]
fn test_rooted_merge_path_is_rejected() {
    let temp = TempDir::new().expect("failed to create temp dir");
    let chunk_dir = temp.path().join("x.bin.chunk");
    fs::create_dir(&chunk_dir).unwrap();
    fs::write(chunk_dir.join("x.bin.chunk_1"), b"keep").unwrap();

    let err = chunkstore_core::merge_one(&chunk_dir).unwrap_err();
    assert!(matches!(err, ChunkError::InvalidPath { .. }));
    assert!(Path::new(&chunk_dir).join("x.bin.chunk_1").exists());
}

#[test]
fn test_advanced_paths_stay_in_chunk_directory() {
    let temp = TempDir::new().expect("failed to create temp dir");
    let first = ChunkTask::first_chunk("a.b.c", temp.path(), 50, 10);
    let chunk_dir = first.path.parent().unwrap().to_path_buf();

    for (position, task) in chunkstore_core::schedule(first).enumerate() {
        let task = task.unwrap();
        assert_eq!(task.path.parent().unwrap(), chunk_dir);
        let info = parse_chunk_file_name(task.path.file_name().unwrap().to_str().unwrap()).unwrap();
        assert_eq!(info.resource_name, "a.b.c");
        assert_eq!(info.chunk_index, position as u64);
        assert_eq!(task.chunk_index, Some(position as u64));
    }
}
