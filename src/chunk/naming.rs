//! Chunk naming convention.
//!
//! A resource `paper.pdf` downloaded in segments lives in a directory
//! `paper.pdf.chunk` holding `paper.pdf.chunk_1`, `paper.pdf.chunk_2`, ...
//! File names carry a 1-based ordinal; [`ChunkInfo`] carries the 0-based index.

use std::sync::LazyLock;

use regex::Regex;

use super::error::ChunkError;

/// Suffix appended to a resource name to form its chunk directory name.
pub const CHUNK_SUFFIX: &str = ".chunk";

const CHUNK_FILE_EXPECTED: &str = "<resource>.chunk_<N> with N >= 1";

/// Greedy group 1 so the last `.chunk_<digits>` marker wins.
#[allow(clippy::expect_used)]
static CHUNK_FILE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    // Static pattern, safe to panic
    Regex::new(r"(?s)^(.+)\.chunk_([0-9]+)$").expect("chunk file regex is valid")
});

/// Decoded form of a chunk file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChunkInfo {
    /// Name of the resource the chunk belongs to.
    pub resource_name: String,
    /// 0-based chunk index (ordinal minus one).
    pub chunk_index: u64,
}

/// Returns the chunk directory name for a resource.
///
/// # Examples
///
/// ```
/// use chunkstore_core::chunk::chunk_dir_name;
///
/// assert_eq!(chunk_dir_name("paper.pdf"), "paper.pdf.chunk");
/// ```
#[must_use]
pub fn chunk_dir_name(resource_name: &str) -> String {
    format!("{resource_name}{CHUNK_SUFFIX}")
}

/// Returns the file name of the chunk at 0-based `chunk_index`.
///
/// # Examples
///
/// ```
/// use chunkstore_core::chunk::chunk_file_name;
///
/// assert_eq!(chunk_file_name("paper.pdf", 0), "paper.pdf.chunk_1");
/// ```
#[must_use]
pub fn chunk_file_name(resource_name: &str, chunk_index: u64) -> String {
    format!(
        "{}_{}",
        chunk_dir_name(resource_name),
        chunk_index.saturating_add(1)
    )
}

/// Parses a chunk file name back into its resource name and 0-based index.
///
/// # Errors
///
/// Returns [`ChunkError::Parse`] when the name has no `.chunk_<N>` suffix,
/// the ordinal is not a decimal number, the ordinal is `0`, or it does not
/// fit in a `u64`.
pub fn parse_chunk_file_name(name: &str) -> Result<ChunkInfo, ChunkError> {
    let captures = CHUNK_FILE_PATTERN
        .captures(name)
        .ok_or_else(|| ChunkError::parse(name, CHUNK_FILE_EXPECTED))?;

    let resource_name = captures.get(1).map_or("", |m| m.as_str());
    let ordinal = captures
        .get(2)
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .filter(|ordinal| *ordinal >= 1)
        .ok_or_else(|| ChunkError::parse(name, CHUNK_FILE_EXPECTED))?;

    Ok(ChunkInfo {
        resource_name: resource_name.to_string(),
        chunk_index: ordinal - 1,
    })
}

/// Returns true when `name` looks like a chunk directory name.
#[must_use]
pub fn is_chunk_dir_name(name: &str) -> bool {
    name.len() > CHUNK_SUFFIX.len() && name.ends_with(CHUNK_SUFFIX)
}

/// Strips the chunk suffix from a chunk directory name.
///
/// # Errors
///
/// Returns [`ChunkError::Parse`] when the name does not end in `.chunk` or
/// nothing remains once the suffix is removed.
pub fn resource_name_from_dir_name(dir_name: &str) -> Result<&str, ChunkError> {
    dir_name
        .strip_suffix(CHUNK_SUFFIX)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ChunkError::parse(dir_name, "<resource>.chunk"))
}
