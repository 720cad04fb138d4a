//! Chunked download storage.
//!
//! A resource fetched in byte-range segments is stored as one file per chunk
//! inside a `<name>.chunk` directory until every segment has arrived, then
//! merged into a single `<name>` file.
//!
//! # Components
//!
//! - [`naming`] - chunk directory and file names, and parsing them back
//! - [`advancer`] - moving a [`ChunkTask`] to its next byte range
//! - [`merger`] - concatenating chunk directories into finished files
//!
//! # Example
//!
//! ```no_run
//! use chunkstore_core::chunk::{ChunkStore, ChunkTask, advance};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut task = ChunkTask::first_chunk("video.mp4", "downloads", 100, 30);
//! loop {
//!     // ... transfer `task.boundary` into `task.path` ...
//!     if !advance(&mut task)? {
//!         break;
//!     }
//! }
//!
//! let report = ChunkStore::new("downloads").merge_all()?;
//! println!("merged {} resources", report.merged.len());
//! # Ok(())
//! # }
//! ```

pub mod advancer;
mod error;
pub mod merger;
pub mod naming;

pub use advancer::{
    Boundary, ChunkSchedule, ChunkTask, advance, expected_chunk_count, schedule,
};
pub use error::ChunkError;
pub use merger::{
    ChunkStore, MergeFailure, MergePolicy, MergeReport, MergedResource, merge_all, merge_one,
};
pub use naming::{
    CHUNK_SUFFIX, ChunkInfo, chunk_dir_name, chunk_file_name, is_chunk_dir_name,
    parse_chunk_file_name, resource_name_from_dir_name,
};
