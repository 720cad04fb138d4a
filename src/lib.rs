//! Chunkstore Core Library
//!
//! On-disk storage for resumable, segmented downloads: how chunk files are
//! named, how a download task steps from one byte range to the next, and how
//! a finished set of chunks is merged back into one file.
//!
//! # Architecture
//!
//! - [`chunk`] - chunk naming, task advancing, and merging
//!
//! The HTTP transfer layer and the scheduler that drives it live outside this
//! crate; they hand [`ChunkTask`] values in and call the merge functions once
//! chunks are on disk.

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod chunk;

// Re-export commonly used types
pub use chunk::{
    Boundary, ChunkError, ChunkInfo, ChunkStore, ChunkTask, MergePolicy, MergeReport,
    MergedResource, advance, chunk_dir_name, chunk_file_name, merge_all, merge_one,
    parse_chunk_file_name, schedule,
};
