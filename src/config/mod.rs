//! Configuration management
//!
//! Three layers, later ones win: built-in defaults, an optional TOML file
//! (`--config`), then command-line flags.

use crate::engine::{EngineSettings, DEFAULT_STRATEGY_THRESHOLD};
use crate::types::CopyError;
use clap::{ArgAction, Parser};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Global configuration for stagecopy
#[derive(Debug, Clone)]
pub struct Config {
    /// Source file or directory
    pub source: PathBuf,

    /// Destination directory (or file, when the source is a file)
    pub destination: PathBuf,

    /// Dry run (log what would happen, touch nothing)
    pub dry_run: bool,

    /// Replace targets that already exist
    pub overwrite: bool,

    /// Files at or above this many bytes use the staged strategy
    pub strategy_threshold: u64,

    /// Post-copy existence/size check
    pub verification_enabled: bool,

    /// Concurrent copies (1 = sequential)
    pub threads: usize,

    /// Operation log file
    pub log_file: Option<PathBuf>,

    /// Print the session summary as JSON
    pub json_summary: bool,

    /// `-v` count
    pub verbosity: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: PathBuf::new(),
            destination: PathBuf::new(),
            dry_run: false,
            overwrite: true,
            strategy_threshold: DEFAULT_STRATEGY_THRESHOLD,
            verification_enabled: true,
            threads: 1,
            log_file: None,
            json_summary: false,
            verbosity: 0,
        }
    }
}

impl Config {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), CopyError> {
        if !self.source.exists() {
            return Err(CopyError::Config(format!(
                "Source path does not exist: {:?}",
                self.source
            )));
        }

        if self.source == self.destination {
            return Err(CopyError::Config(
                "Source and destination cannot be the same".to_string(),
            ));
        }

        if self.strategy_threshold == 0 {
            return Err(CopyError::Config(
                "Strategy threshold must be greater than zero".to_string(),
            ));
        }

        if self.threads == 0 {
            return Err(CopyError::Config(
                "Thread count must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    /// The two settings the copy engine consumes
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            strategy_threshold: self.strategy_threshold,
            verification_enabled: self.verification_enabled,
        }
    }

    fn apply_file(&mut self, file: FileConfig) {
        if let Some(threshold) = file.strategy_threshold {
            self.strategy_threshold = threshold;
        }
        if let Some(enabled) = file.verification_enabled {
            self.verification_enabled = enabled;
        }
        if let Some(threads) = file.threads {
            self.threads = threads;
        }
        if let Some(overwrite) = file.overwrite {
            self.overwrite = overwrite;
        }
        if file.log_file.is_some() {
            self.log_file = file.log_file;
        }
    }
}

/// Settings accepted from a TOML config file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub strategy_threshold: Option<u64>,
    pub verification_enabled: Option<bool>,
    pub threads: Option<usize>,
    pub overwrite: Option<bool>,
    pub log_file: Option<PathBuf>,
}

impl FileConfig {
    pub fn parse(text: &str) -> Result<Self, CopyError> {
        toml::from_str(text).map_err(|e| CopyError::Config(format!("Invalid config file: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Self, CopyError> {
        let text = fs::read_to_string(path).map_err(|e| {
            CopyError::Config(format!("Cannot read config file {}: {}", path.display(), e))
        })?;
        Self::parse(&text)
    }
}

/// Command-line interface
#[derive(Debug, Parser)]
#[command(name = "stagecopy", version, about = "Copy files with staged backups, verification and rollback")]
pub struct Cli {
    /// Source file or directory
    pub source: PathBuf,

    /// Destination directory
    pub destination: PathBuf,

    /// Show every step without touching the filesystem
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Skip files whose target already exists
    #[arg(long)]
    pub no_overwrite: bool,

    /// Size at which the staged strategy is used (bytes, or with K/M/G suffix)
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub threshold: Option<u64>,

    /// Skip the post-copy size check
    #[arg(long)]
    pub no_verify: bool,

    /// Number of concurrent copies
    #[arg(short = 'j', long, value_name = "N")]
    pub threads: Option<usize>,

    /// Append the operation log to this file
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Read settings from a TOML file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print the session summary as JSON
    #[arg(long)]
    pub json: bool,

    /// Increase diagnostic output (-v, -vv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl TryFrom<Cli> for Config {
    type Error = CopyError;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        let mut config = Config {
            source: cli.source,
            destination: cli.destination,
            ..Config::default()
        };

        if let Some(path) = &cli.config {
            config.apply_file(FileConfig::load(path)?);
        }

        config.dry_run = cli.dry_run;
        config.json_summary = cli.json;
        config.verbosity = cli.verbose;
        if cli.no_overwrite {
            config.overwrite = false;
        }
        if cli.no_verify {
            config.verification_enabled = false;
        }
        if let Some(threshold) = cli.threshold {
            config.strategy_threshold = threshold;
        }
        if let Some(threads) = cli.threads {
            config.threads = threads;
        }
        if cli.log_file.is_some() {
            config.log_file = cli.log_file;
        }

        config.validate()?;
        Ok(config)
    }
}

/// Parse `1048576`, `512K`, `10M`, `2G` (binary multiples)
pub fn parse_size(text: &str) -> Result<u64, String> {
    let text = text.trim();
    let (digits, multiplier) = match text.char_indices().last() {
        Some((idx, c)) if c.is_ascii_alphabetic() => {
            let multiplier = match c.to_ascii_uppercase() {
                'K' => 1024,
                'M' => 1024 * 1024,
                'G' => 1024 * 1024 * 1024,
                _ => return Err(format!("unknown size suffix '{}'", c)),
            };
            (&text[..idx], multiplier)
        }
        _ => (text, 1),
    };

    let value: u64 = digits
        .trim()
        .parse()
        .map_err(|_| format!("invalid size '{}'", text))?;
    value
        .checked_mul(multiplier)
        .ok_or_else(|| format!("size '{}' is too large", text))
}
