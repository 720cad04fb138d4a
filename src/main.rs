//! CLI entry point for the chunkstore tool.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chunkstore_core::{ChunkStore, ChunkTask, MergePolicy, schedule};
use clap::Parser;
use tracing::{debug, info};

mod app_config;
mod cli;

use app_config::FileConfig;
use cli::{Cli, Command, DEFAULT_CHUNK_SIZE, MergeAllArgs, MergeArgs, PlanArgs};

fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let cli = Cli::parse();
    let config = app_config::load_config(cli.config.as_deref())?;

    // Priority: RUST_LOG env var > quiet flag > verbose flag > config verbosity > info
    let default_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => config.verbosity.map_or("info", |v| v.log_level()),
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?cli, ?config, "CLI arguments parsed");

    match cli.command {
        Command::Merge(args) => run_merge(&args, &config),
        Command::MergeAll(args) => run_merge_all(args, &config),
        Command::Plan(args) => run_plan(&args, &config),
    }
}

fn merge_policy(strict: bool, config: &FileConfig) -> MergePolicy {
    if strict {
        MergePolicy::RejectGaps
    } else {
        config
            .merge_policy
            .map_or(MergePolicy::StopAtGap, |setting| setting.to_policy())
    }
}

fn run_merge(args: &MergeArgs, config: &FileConfig) -> Result<ExitCode> {
    let store = ChunkStore::new(args.root.clone().unwrap_or_default())
        .with_policy(merge_policy(args.strict, config));
    let merged = store
        .merge_one(&args.chunk_dir)
        .with_context(|| format!("Failed to merge '{}'", args.chunk_dir.display()))?;

    println!(
        "Merged {} ({} chunks, {} bytes) -> {}",
        merged.resource_name,
        merged.chunks,
        merged.bytes,
        merged.output.display()
    );
    Ok(ExitCode::SUCCESS)
}

fn run_merge_all(args: MergeAllArgs, config: &FileConfig) -> Result<ExitCode> {
    let root = args
        .root
        .or_else(|| config.storage_root.clone())
        .unwrap_or_else(|| PathBuf::from("."));
    info!(root = %root.display(), "Sweeping storage root");

    let store = ChunkStore::new(&root).with_policy(merge_policy(args.strict, config));
    let report = store
        .merge_all()
        .with_context(|| format!("Failed to sweep '{}'", root.display()))?;

    for merged in &report.merged {
        println!(
            "Merged {} ({} chunks, {} bytes) -> {}",
            merged.resource_name,
            merged.chunks,
            merged.bytes,
            merged.output.display()
        );
    }
    for failure in &report.failures {
        eprintln!("Failed {}: {}", failure.chunk_dir.display(), failure.error);
    }
    if report.merged.is_empty() && report.failures.is_empty() {
        println!("No chunk directories found under {}", root.display());
    }

    Ok(if report.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn run_plan(args: &PlanArgs, config: &FileConfig) -> Result<ExitCode> {
    let chunk_size = args
        .chunk_size
        .or(config.chunk_size)
        .unwrap_or(DEFAULT_CHUNK_SIZE);
    let first = ChunkTask::first_chunk(&args.name, &args.dir, args.total_size, chunk_size);
    let tasks = schedule(first)
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to build chunk schedule")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&tasks)?);
        return Ok(ExitCode::SUCCESS);
    }

    for task in &tasks {
        println!(
            "#{:<6} {:<24} {:>12} bytes  {}",
            task.chunk_index.unwrap_or_default(),
            task.boundary,
            task.byte_len()?,
            task.path.display()
        );
    }
    Ok(ExitCode::SUCCESS)
}
