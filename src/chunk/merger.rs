//! Reassembling chunk directories into finished files.
//!
//! A chunk directory `<name>.chunk` is merged by concatenating
//! `<name>.chunk_1`, `<name>.chunk_2`, ... in ordinal order into `<name>` next
//! to the directory, then removing the directory. The merged bytes are written
//! to a uniquely named temporary sibling and renamed into place before
//! anything is deleted, so a crash at any point leaves either the chunks, the
//! output, or both. No file other than `<name>` is ever replaced.
//!
//! By default collection stops at the first missing ordinal: chunks after a
//! gap are never read and the output is silently truncated. Use
//! [`MergePolicy::RejectGaps`] or [`MergePolicy::Expect`] to fail instead.

use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Component, Path, PathBuf};

use tempfile::{Builder, NamedTempFile};
use tracing::{debug, info, instrument, warn};

use super::error::ChunkError;
use super::naming::{
    chunk_file_name, is_chunk_dir_name, parse_chunk_file_name, resource_name_from_dir_name,
};

/// Suffix of the temporary file a merge writes before renaming it into place.
const MERGING_SUFFIX: &str = ".merging";

/// How a merge treats missing chunk ordinals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergePolicy {
    /// Merge the contiguous run starting at ordinal 1 and ignore anything after a gap.
    ///
    /// A directory without ordinal 1 is not merged into an empty file: it
    /// fails with [`ChunkError::NoChunks`] and is left on disk.
    #[default]
    StopAtGap,
    /// Fail with [`ChunkError::Gap`] if any chunk exists beyond the first missing ordinal.
    RejectGaps,
    /// Merge exactly ordinals `1..=n`; fail with [`ChunkError::Gap`] if any is missing.
    Expect(u64),
}

/// A resource that was merged successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedResource {
    /// Name of the merged resource.
    pub resource_name: String,
    /// Path of the merged output file.
    pub output: PathBuf,
    /// Number of chunks concatenated.
    pub chunks: u64,
    /// Size of the merged output in bytes.
    pub bytes: u64,
}

/// A chunk directory whose merge failed during a sweep.
#[derive(Debug)]
pub struct MergeFailure {
    /// The chunk directory, relative to the store root.
    pub chunk_dir: PathBuf,
    /// Why the merge failed.
    pub error: ChunkError,
}

/// Outcome of [`ChunkStore::merge_all`].
#[derive(Debug, Default)]
pub struct MergeReport {
    /// Resources merged in this sweep.
    pub merged: Vec<MergedResource>,
    /// Chunk directories that could not be merged. Each is left on disk.
    pub failures: Vec<MergeFailure>,
}

impl MergeReport {
    /// Returns true when every chunk directory in the sweep merged.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Chunk storage rooted at one directory.
///
/// Chunk directory paths handed to [`ChunkStore::merge_one`] are resolved
/// against the root and may not escape it.
#[derive(Debug, Clone)]
pub struct ChunkStore {
    root: PathBuf,
    policy: MergePolicy,
}

impl ChunkStore {
    /// Creates a store rooted at `root` using [`MergePolicy::StopAtGap`].
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            policy: MergePolicy::default(),
        }
    }

    /// Sets the merge policy.
    #[must_use]
    pub fn with_policy(mut self, policy: MergePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns the storage root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the active merge policy.
    #[must_use]
    pub fn policy(&self) -> MergePolicy {
        self.policy
    }

    /// Merges one chunk directory, given relative to the store root.
    ///
    /// Writes `<name>` into the chunk directory's parent, replacing any file
    /// already there, then removes the chunk directory.
    ///
    /// # Errors
    ///
    /// - [`ChunkError::InvalidPath`] if the path is rooted, contains `..`, or is not a directory
    /// - [`ChunkError::Parse`] if the directory name does not end in `.chunk`
    /// - [`ChunkError::NoChunks`] if the first chunk is missing
    /// - [`ChunkError::Gap`] if the merge policy rejects the ordinals found
    /// - [`ChunkError::Io`] if any read, write, or removal fails
    ///
    /// Nothing is removed unless the output was fully written.
    pub fn merge_one(&self, chunk_dir: impl AsRef<Path>) -> Result<MergedResource, ChunkError> {
        self.merge_dir(chunk_dir.as_ref())
    }

    #[instrument(skip_all, fields(root = %self.root.display(), chunk_dir = %relative.display()))]
    fn merge_dir(&self, relative: &Path) -> Result<MergedResource, ChunkError> {
        ensure_contained(relative)?;
        let dir_name = relative
            .file_name()
            .ok_or_else(|| {
                ChunkError::invalid_path(relative, "chunk directory path has no file name")
            })?
            .to_str()
            .ok_or_else(|| {
                ChunkError::invalid_path(relative, "chunk directory name is not valid UTF-8")
            })?;
        let resource_name = resource_name_from_dir_name(dir_name)?;

        let chunk_dir = self.root.join(relative);
        let metadata = fs::metadata(&chunk_dir).map_err(|e| ChunkError::io(&chunk_dir, e))?;
        if !metadata.is_dir() {
            return Err(ChunkError::invalid_path(&chunk_dir, "not a directory"));
        }
        let output_dir = chunk_dir.parent().map(Path::to_path_buf).unwrap_or_default();

        let chunks = self.collect_chunks(&chunk_dir, resource_name)?;
        let output = output_dir.join(resource_name);
        let bytes = write_merged(&chunks, &output_dir, resource_name, &output)?;

        fs::remove_dir_all(&chunk_dir).map_err(|e| {
            warn!(error = %e, "merged output written but chunk directory could not be removed");
            ChunkError::io(&chunk_dir, e)
        })?;

        let chunks = chunks.len() as u64;
        info!(
            resource = resource_name,
            output = %output.display(),
            chunks,
            bytes,
            "merged chunks"
        );
        Ok(MergedResource {
            resource_name: resource_name.to_string(),
            output,
            chunks,
            bytes,
        })
    }

    /// Lists the contiguous chunk files from ordinal 1 and applies the merge policy.
    fn collect_chunks(
        &self,
        chunk_dir: &Path,
        resource_name: &str,
    ) -> Result<Vec<PathBuf>, ChunkError> {
        let limit = match self.policy {
            MergePolicy::Expect(n) => n,
            _ => u64::MAX,
        };

        let mut chunks = Vec::new();
        let mut index = 0;
        while index < limit {
            let path = chunk_dir.join(chunk_file_name(resource_name, index));
            match fs::metadata(&path) {
                Ok(meta) if meta.is_file() => chunks.push(path),
                Ok(_) => break,
                Err(e) if e.kind() == ErrorKind::NotFound => break,
                Err(e) => return Err(ChunkError::io(&path, e)),
            }
            index += 1;
        }
        let found = chunks.len() as u64;
        debug!(found, "collected chunk files");

        match self.policy {
            MergePolicy::StopAtGap => {}
            MergePolicy::RejectGaps => {
                if has_chunk_beyond(chunk_dir, resource_name, found)? {
                    return Err(ChunkError::gap(chunk_dir, found + 1, found));
                }
            }
            MergePolicy::Expect(expected) => {
                if found < expected {
                    return Err(ChunkError::gap(chunk_dir, found + 1, found));
                }
                if expected == 0 {
                    return Ok(chunks);
                }
            }
        }

        if chunks.is_empty() {
            return Err(ChunkError::no_chunks(chunk_dir));
        }
        Ok(chunks)
    }

    /// Merges every chunk directory directly under the root.
    ///
    /// A failing directory is recorded in the report and left on disk; the
    /// sweep continues with the next one. Entries that are not directories, or
    /// whose names do not end in `.chunk`, are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ChunkError::Io`] only if the root itself cannot be listed.
    #[instrument(skip_all, fields(root = %self.root.display()))]
    pub fn merge_all(&self) -> Result<MergeReport, ChunkError> {
        let list_root = if self.root.as_os_str().is_empty() {
            Path::new(".")
        } else {
            self.root.as_path()
        };
        let entries = fs::read_dir(list_root).map_err(|e| ChunkError::io(&self.root, e))?;

        let mut names = Vec::new();
        let mut report = MergeReport::default();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "failed to read storage root entry");
                    report.failures.push(MergeFailure {
                        chunk_dir: PathBuf::new(),
                        error: ChunkError::io(&self.root, e),
                    });
                    continue;
                }
            };
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                debug!(entry = ?entry.file_name(), "skipping non UTF-8 entry");
                continue;
            };
            if !is_chunk_dir_name(&name) {
                continue;
            }
            match entry.file_type() {
                Ok(file_type) if file_type.is_dir() => names.push(name),
                Ok(_) => debug!(entry = %name, "skipping non-directory chunk entry"),
                Err(e) => report.failures.push(MergeFailure {
                    chunk_dir: PathBuf::from(&name),
                    error: ChunkError::io(entry.path(), e),
                }),
            }
        }
        names.sort();

        for name in names {
            match self.merge_one(&name) {
                Ok(merged) => report.merged.push(merged),
                Err(error) => {
                    warn!(chunk_dir = %name, error = %error, "merge failed, leaving chunks in place");
                    report.failures.push(MergeFailure {
                        chunk_dir: PathBuf::from(name),
                        error,
                    });
                }
            }
        }

        info!(
            merged = report.merged.len(),
            failed = report.failures.len(),
            "merge sweep finished"
        );
        Ok(report)
    }
}

/// Merges a chunk directory given relative to the working directory.
///
/// # Errors
///
/// See [`ChunkStore::merge_one`].
pub fn merge_one(chunk_dir: impl AsRef<Path>) -> Result<MergedResource, ChunkError> {
    ChunkStore::new(PathBuf::new()).merge_one(chunk_dir)
}

/// Merges every chunk directory directly under `root` with the default policy.
///
/// # Errors
///
/// See [`ChunkStore::merge_all`].
pub fn merge_all(root: impl Into<PathBuf>) -> Result<MergeReport, ChunkError> {
    ChunkStore::new(root).merge_all()
}

fn ensure_contained(path: &Path) -> Result<(), ChunkError> {
    if path.as_os_str().is_empty() {
        return Err(ChunkError::invalid_path(path, "chunk directory path is empty"));
    }
    for component in path.components() {
        match component {
            Component::RootDir | Component::Prefix(_) => {
                return Err(ChunkError::invalid_path(
                    path,
                    "chunk directory path must be relative",
                ));
            }
            Component::ParentDir => {
                return Err(ChunkError::invalid_path(
                    path,
                    "chunk directory path must not contain '..'",
                ));
            }
            Component::CurDir | Component::Normal(_) => {}
        }
    }
    Ok(())
}

fn has_chunk_beyond(
    chunk_dir: &Path,
    resource_name: &str,
    found: u64,
) -> Result<bool, ChunkError> {
    let entries = fs::read_dir(chunk_dir).map_err(|e| ChunkError::io(chunk_dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| ChunkError::io(chunk_dir, e))?;
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if let Ok(info) = parse_chunk_file_name(&name)
            && info.resource_name == resource_name
            && info.chunk_index >= found
        {
            debug!(chunk = %name, "chunk found beyond gap");
            return Ok(true);
        }
    }
    Ok(false)
}

/// Concatenates `chunks` into `output` through a temporary sibling file.
///
/// The temporary file is removed on every error path when it is dropped.
fn write_merged(
    chunks: &[PathBuf],
    output_dir: &Path,
    resource_name: &str,
    output: &Path,
) -> Result<u64, ChunkError> {
    let staging_dir = if output_dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        output_dir
    };
    let mut staging = Builder::new()
        .prefix(&format!(".{resource_name}."))
        .suffix(MERGING_SUFFIX)
        .tempfile_in(staging_dir)
        .map_err(|e| ChunkError::io(staging_dir, e))?;
    debug!(staging = %staging.path().display(), "staging merged output");

    let bytes = write_staging(chunks, &mut staging)?;
    staging
        .persist(output)
        .map_err(|e| ChunkError::io(output, e.error))?;
    Ok(bytes)
}

fn write_staging(chunks: &[PathBuf], staging: &mut NamedTempFile) -> Result<u64, ChunkError> {
    let staging_path = staging.path().to_path_buf();
    let mut writer = BufWriter::new(staging.as_file_mut());
    let mut bytes = 0u64;
    for chunk in chunks {
        let data = fs::read(chunk).map_err(|e| ChunkError::io(chunk, e))?;
        writer
            .write_all(&data)
            .map_err(|e| ChunkError::io(&staging_path, e))?;
        bytes += data.len() as u64;
        debug!(chunk = %chunk.display(), len = data.len(), "appended chunk");
    }
    let file = writer
        .into_inner()
        .map_err(|e| ChunkError::io(&staging_path, e.into_error()))?;
    file.sync_all().map_err(|e| ChunkError::io(&staging_path, e))?;
    Ok(bytes)
}
