//! Application configuration loading for CLI defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chunkstore_core::MergePolicy;

/// Largest accepted chunk size (1 TiB).
pub const MAX_CHUNK_SIZE: u64 = 1 << 40;

/// TOML-style file configuration for chunkstore defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// Default storage root swept by `merge-all`.
    pub storage_root: Option<PathBuf>,
    /// Default chunk size in bytes for `plan`.
    pub chunk_size: Option<u64>,
    /// Default merge policy.
    pub merge_policy: Option<MergePolicySetting>,
    /// Default verbosity mode.
    pub verbosity: Option<VerbositySetting>,
}

impl FileConfig {
    /// Validates config values against CLI constraints.
    pub fn validate(&self) -> Result<()> {
        if let Some(chunk_size) = self.chunk_size
            && !(1..=MAX_CHUNK_SIZE).contains(&chunk_size)
        {
            bail!(
                "Invalid config value for `chunk_size`: {chunk_size}. Expected range: 1..={MAX_CHUNK_SIZE}"
            );
        }
        Ok(())
    }
}

/// Supported config merge policy labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicySetting {
    StopAtGap,
    RejectGaps,
}

impl MergePolicySetting {
    /// Maps the label onto the library policy.
    #[must_use]
    pub fn to_policy(self) -> MergePolicy {
        match self {
            Self::StopAtGap => MergePolicy::StopAtGap,
            Self::RejectGaps => MergePolicy::RejectGaps,
        }
    }
}

/// Supported config verbosity labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbositySetting {
    Default,
    Verbose,
    Quiet,
    Debug,
}

impl VerbositySetting {
    /// Returns the tracing filter level for this label.
    #[must_use]
    pub fn log_level(self) -> &'static str {
        match self {
            Self::Default => "info",
            Self::Verbose | Self::Debug => "debug",
            Self::Quiet => "error",
        }
    }
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/chunkstore/config.toml`
/// 2. `$HOME/.config/chunkstore/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    let non_empty = |name: &str| env::var_os(name).filter(|value| !value.is_empty());
    let config_home = non_empty("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| non_empty("HOME").map(|home| PathBuf::from(home).join(".config")))?;
    Some(config_home.join("chunkstore").join("config.toml"))
}

/// Loads config from `explicit` if given, else from the default path if present.
///
/// An explicit path that does not exist is an error; a missing default file is not.
pub fn load_config(explicit: Option<&Path>) -> Result<FileConfig> {
    if let Some(path) = explicit {
        return load_file_config(path);
    }
    match resolve_default_config_path() {
        Some(path) if path.exists() => load_file_config(&path),
        _ => Ok(FileConfig::default()),
    }
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_no, raw_line) in (1..).zip(raw.lines()) {
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((key, value)) = line.split_once('=').map(|(k, v)| (k.trim(), v.trim())) else {
            bail!("Invalid config syntax on line {line_no}: expected key = value");
        };
        let invalid = || format!("Invalid `{key}` value on line {line_no}");

        match key {
            "storage_root" => {
                cfg.storage_root = Some(PathBuf::from(parse_quoted(value).with_context(invalid)?));
            }
            "chunk_size" => {
                cfg.chunk_size = Some(parse_integer_u64(value).with_context(invalid)?);
            }
            "merge_policy" => {
                let label = parse_quoted(value).with_context(invalid)?;
                cfg.merge_policy = Some(parse_merge_policy(label).with_context(invalid)?);
            }
            "verbosity" => {
                let label = parse_quoted(value).with_context(invalid)?;
                cfg.verbosity = Some(parse_verbosity(label).with_context(invalid)?);
            }
            unknown => bail!("Unknown configuration key: '{unknown}' on line {line_no}"),
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

/// Cuts a line at the first `#` that is not inside a double-quoted string.
fn strip_inline_comment(line: &str) -> &str {
    let mut quotes = 0usize;
    let cut = line.find(|ch: char| {
        if ch == '"' {
            quotes += 1;
        }
        ch == '#' && quotes % 2 == 0
    });
    cut.map_or(line, |index| &line[..index])
}

fn parse_quoted(raw_value: &str) -> Result<&str> {
    raw_value
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .context("Expected double-quoted string")
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let digits = raw_value.replace('_', "");
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        bail!("Expected non-negative integer, got '{raw_value}'");
    }
    digits
        .parse::<u64>()
        .context("Integer value out of range for u64")
}

fn parse_merge_policy(value: &str) -> Result<MergePolicySetting> {
    match value {
        "stop_at_gap" => Ok(MergePolicySetting::StopAtGap),
        "reject_gaps" => Ok(MergePolicySetting::RejectGaps),
        _ => bail!("Expected one of: stop_at_gap, reject_gaps"),
    }
}

fn parse_verbosity(value: &str) -> Result<VerbositySetting> {
    match value {
        "default" => Ok(VerbositySetting::Default),
        "verbose" => Ok(VerbositySetting::Verbose),
        "quiet" => Ok(VerbositySetting::Quiet),
        "debug" => Ok(VerbositySetting::Debug),
        _ => bail!("Expected one of: default, verbose, quiet, debug"),
    }
}
