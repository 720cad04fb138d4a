//! Error types for the chunk module.
//!
//! Every failure carries the name, path, or task field that caused it so a
//! scheduler log line is enough to find the offending chunk.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while naming, merging, or advancing chunks.
#[derive(Debug, Error)]
pub enum ChunkError {
    /// A name or boundary does not follow the chunk naming convention.
    #[error("cannot parse '{input}': expected {expected}")]
    Parse {
        /// The rejected input.
        input: String,
        /// What the input should have looked like.
        expected: &'static str,
    },

    /// A path is rooted, escapes the storage root, or is not a chunk path.
    #[error("invalid chunk path {path}: {reason}")]
    InvalidPath {
        /// The rejected path.
        path: PathBuf,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// A chunked task is missing or carries an unusable field.
    #[error("invalid chunk task: {reason}")]
    InvalidState {
        /// Which field is wrong.
        reason: &'static str,
    },

    /// File system error while reading chunks, writing output, or cleaning up.
    #[error("IO error at {path}: {source}")]
    Io {
        /// The file or directory where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Chunk ordinals are not contiguous under the active merge policy.
    #[error("chunk directory {chunk_dir} has a gap: ordinal {missing} is missing, {found} found")]
    Gap {
        /// The chunk directory being merged.
        chunk_dir: PathBuf,
        /// First missing 1-based ordinal.
        missing: u64,
        /// Number of contiguous chunks found before the gap.
        found: u64,
    },

    /// The chunk directory holds no first chunk, so there is nothing to merge.
    #[error("chunk directory {chunk_dir} contains no chunks")]
    NoChunks {
        /// The chunk directory being merged.
        chunk_dir: PathBuf,
    },
}

impl ChunkError {
    /// Creates a parse error.
    pub fn parse(input: impl Into<String>, expected: &'static str) -> Self {
        Self::Parse {
            input: input.into(),
            expected,
        }
    }

    /// Creates an invalid path error.
    pub fn invalid_path(path: impl Into<PathBuf>, reason: &'static str) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason,
        }
    }

    /// Creates an invalid task state error.
    #[must_use]
    pub fn invalid_state(reason: &'static str) -> Self {
        Self::InvalidState { reason }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a gap error.
    pub fn gap(chunk_dir: impl Into<PathBuf>, missing: u64, found: u64) -> Self {
        Self::Gap {
            chunk_dir: chunk_dir.into(),
            missing,
            found,
        }
    }

    /// Creates an empty chunk directory error.
    pub fn no_chunks(chunk_dir: impl Into<PathBuf>) -> Self {
        Self::NoChunks {
            chunk_dir: chunk_dir.into(),
        }
    }

    /// Returns true when retrying the same call may succeed.
    ///
    /// Only IO failures qualify; every other variant needs the caller to
    /// change its input first.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io { .. })
    }
}
