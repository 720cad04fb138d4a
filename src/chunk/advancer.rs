//! Advancing a chunked download task from one byte range to the next.
//!
//! The scheduler calls [`advance`] once per completed chunk transfer. Each call
//! moves the task's boundary forward by one chunk, bumps its index, and points
//! its path at the next chunk file, until the whole resource has been fetched
//! and it returns `false`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::error::ChunkError;
use super::naming::{chunk_dir_name, chunk_file_name, parse_chunk_file_name};

const BOUNDARY_EXPECTED: &str = "'<start>-' or '<start>-<end>'";

/// HTTP range-style byte boundary: `"<start>-"` or `"<start>-<end>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Boundary {
    /// First byte offset of the range.
    pub start: u64,
    /// Inclusive last byte offset, or `None` for an open range.
    pub end: Option<u64>,
}

impl Boundary {
    /// Creates an open-ended boundary starting at `start`.
    #[must_use]
    pub fn open(start: u64) -> Self {
        Self { start, end: None }
    }
}

impl FromStr for Boundary {
    type Err = ChunkError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (start, end) = value
            .split_once('-')
            .ok_or_else(|| ChunkError::parse(value, BOUNDARY_EXPECTED))?;
        let start =
            parse_offset(start).ok_or_else(|| ChunkError::parse(value, BOUNDARY_EXPECTED))?;
        let end = if end.is_empty() {
            None
        } else {
            let end = parse_offset(end)
                .filter(|end| *end >= start)
                .ok_or_else(|| ChunkError::parse(value, BOUNDARY_EXPECTED))?;
            Some(end)
        };
        Ok(Self { start, end })
    }
}

fn parse_offset(raw: &str) -> Option<u64> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "{}-{end}", self.start),
            None => write!(f, "{}-", self.start),
        }
    }
}

/// Transfer state of one in-flight chunk, owned by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkTask {
    /// Whether the resource is fetched in chunks at all.
    pub is_chunk: bool,
    /// 0-based chunk index; required when `is_chunk` is true.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_index: Option<u64>,
    /// Byte range of this chunk, see [`Boundary`].
    pub boundary: String,
    /// Full resource size in bytes.
    pub total_size: u64,
    /// Size of every chunk except possibly the last.
    pub chunk_size: u64,
    /// Name of the resource being downloaded.
    pub resource_name: String,
    /// Chunk file this task writes.
    pub path: PathBuf,
}

impl ChunkTask {
    /// Builds the task for the first chunk of a resource stored under `storage_dir`.
    ///
    /// The chunk file lands at `storage_dir/<name>.chunk/<name>.chunk_1`.
    #[must_use]
    pub fn first_chunk(
        resource_name: impl Into<String>,
        storage_dir: impl AsRef<Path>,
        total_size: u64,
        chunk_size: u64,
    ) -> Self {
        let resource_name = resource_name.into();
        let path = storage_dir
            .as_ref()
            .join(chunk_dir_name(&resource_name))
            .join(chunk_file_name(&resource_name, 0));
        Self {
            is_chunk: true,
            chunk_index: Some(0),
            boundary: Boundary::open(0).to_string(),
            total_size,
            chunk_size,
            resource_name,
            path,
        }
    }

    /// Builds a task that fetches the whole resource in one transfer.
    #[must_use]
    pub fn whole_file(
        resource_name: impl Into<String>,
        path: impl Into<PathBuf>,
        total_size: u64,
    ) -> Self {
        Self {
            is_chunk: false,
            chunk_index: None,
            boundary: Boundary::open(0).to_string(),
            total_size,
            chunk_size: total_size,
            resource_name: resource_name.into(),
            path: path.into(),
        }
    }

    /// Parses the task's boundary string.
    ///
    /// # Errors
    ///
    /// Returns [`ChunkError::Parse`] if the boundary is malformed.
    pub fn parsed_boundary(&self) -> Result<Boundary, ChunkError> {
        self.boundary.parse()
    }

    /// Number of bytes this task is expected to transfer.
    ///
    /// # Errors
    ///
    /// Returns [`ChunkError::Parse`] if the boundary is malformed.
    pub fn byte_len(&self) -> Result<u64, ChunkError> {
        let start = self.parsed_boundary()?.start;
        Ok(self.chunk_size.min(self.total_size.saturating_sub(start)))
    }
}

/// Number of chunk files needed to hold `total_size` bytes, or `None` for a zero chunk size.
#[must_use]
pub fn expected_chunk_count(total_size: u64, chunk_size: u64) -> Option<u64> {
    (chunk_size > 0).then(|| total_size.div_ceil(chunk_size))
}

/// Advances a task to its next chunk in place.
///
/// Returns `Ok(true)` when the task should be fetched: a non-chunked task is
/// left untouched, a chunked one has its boundary, index, and path moved to
/// the next chunk. When less than a full chunk remains, `chunk_size` shrinks
/// to the remainder and the boundary jumps to `total_size`. `Ok(false)` means
/// the boundary start has reached `total_size` and nothing remains to fetch.
///
/// The task is only modified on `Ok(true)`; on error it is left as it was.
///
/// # Errors
///
/// - [`ChunkError::InvalidState`] if a chunked task has no index or a zero chunk size
/// - [`ChunkError::Parse`] if the boundary is malformed
/// - [`ChunkError::InvalidPath`] if the task path is not a chunk file path
#[instrument(
    level = "debug",
    skip_all,
    fields(resource = %task.resource_name, boundary = %task.boundary)
)]
pub fn advance(task: &mut ChunkTask) -> Result<bool, ChunkError> {
    if !task.is_chunk {
        return Ok(true);
    }
    let chunk_index = task
        .chunk_index
        .ok_or_else(|| ChunkError::invalid_state("chunked task has no chunk index"))?;
    if task.chunk_size == 0 {
        return Err(ChunkError::invalid_state("chunked task has a zero chunk size"));
    }

    let start = task.parsed_boundary()?.start;
    if task.total_size <= start {
        debug!(total_size = task.total_size, "all chunks fetched");
        return Ok(false);
    }

    let chunk_dir = chunk_dir_of(&task.path)?;
    let next_index = chunk_index
        .checked_add(1)
        .ok_or_else(|| ChunkError::invalid_state("chunk index overflow"))?;

    let (next_start, next_chunk_size) =
        if start.saturating_add(task.chunk_size) < task.total_size {
            (start + task.chunk_size, task.chunk_size)
        } else {
            (task.total_size, task.total_size - start)
        };

    task.chunk_size = next_chunk_size;
    task.chunk_index = Some(next_index);
    task.boundary = Boundary::open(next_start).to_string();
    task.path = chunk_dir.join(chunk_file_name(&task.resource_name, next_index));

    debug!(
        chunk_index = next_index,
        next_boundary = %task.boundary,
        chunk_size = task.chunk_size,
        "advanced to next chunk"
    );
    Ok(true)
}

fn chunk_dir_of(path: &Path) -> Result<PathBuf, ChunkError> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| ChunkError::invalid_path(path, "task path has no file name"))?;
    parse_chunk_file_name(file_name)
        .map_err(|_| ChunkError::invalid_path(path, "task path is not a chunk file"))?;
    Ok(path.parent().map(Path::to_path_buf).unwrap_or_default())
}

/// Iterator over every task a chunked download goes through.
///
/// Yields the starting task, then each advanced task, and stops once
/// [`advance`] reports completion. A non-chunked task is yielded once.
#[derive(Debug)]
pub struct ChunkSchedule {
    pending: Option<Result<ChunkTask, ChunkError>>,
}

/// Builds the schedule that starts at `first`.
#[must_use]
pub fn schedule(first: ChunkTask) -> ChunkSchedule {
    ChunkSchedule {
        pending: Some(Ok(first)),
    }
}

impl Iterator for ChunkSchedule {
    type Item = Result<ChunkTask, ChunkError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.pending.take()? {
            Ok(task) => {
                if task.is_chunk {
                    let mut next = task.clone();
                    self.pending = match advance(&mut next) {
                        Ok(true) => Some(Ok(next)),
                        Ok(false) => None,
                        Err(error) => Some(Err(error)),
                    };
                }
                Some(Ok(task))
            }
            Err(error) => Some(Err(error)),
        }
    }
}
