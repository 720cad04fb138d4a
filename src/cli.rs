//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Default chunk size for `plan` when neither the flag nor the config sets one (4 MiB).
pub const DEFAULT_CHUNK_SIZE: u64 = 4 * 1024 * 1024;

/// Inspect and reassemble chunked downloads.
///
/// Chunks of a resource live in `<name>.chunk/<name>.chunk_<N>`; merging
/// concatenates them into `<name>` and removes the chunk directory.
#[derive(Parser, Debug)]
#[command(name = "chunkstore")]
#[command(author, version, about)]
pub struct Cli {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Read configuration from this file instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Merge one chunk directory into its resource file
    Merge(MergeArgs),
    /// Merge every chunk directory under a storage root
    MergeAll(MergeAllArgs),
    /// Print the chunk schedule for a resource
    Plan(PlanArgs),
}

#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Chunk directory, relative to the root (e.g. `video.mp4.chunk`)
    pub chunk_dir: PathBuf,

    /// Directory the chunk path is relative to (default: current directory)
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Fail instead of truncating when chunk ordinals have a gap
    #[arg(long)]
    pub strict: bool,
}

#[derive(Args, Debug)]
pub struct MergeAllArgs {
    /// Storage root to sweep (default: config `storage_root`, else current directory)
    pub root: Option<PathBuf>,

    /// Fail instead of truncating when chunk ordinals have a gap
    #[arg(long)]
    pub strict: bool,
}

#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Resource name
    #[arg(long)]
    pub name: String,

    /// Total resource size in bytes
    #[arg(long)]
    pub total_size: u64,

    /// Chunk size in bytes (default: config `chunk_size`, else 4 MiB)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub chunk_size: Option<u64>,

    /// Storage directory that holds the chunk directory
    #[arg(long, default_value = ".")]
    pub dir: PathBuf,

    /// Print tasks as JSON
    #[arg(long)]
    pub json: bool,
}
