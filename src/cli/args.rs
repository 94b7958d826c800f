//! CLI argument definitions.

use super::validators::{parse_confidence, parse_date, parse_duration, parse_window};
use crate::correlate::FusionPolicy;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Correlate camera and microphone bird detections into confirmed sightings.
#[derive(Debug, Parser)]
#[command(name = "birdfuse")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,

    /// Increase verbosity (-v: debug, -vv: trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log warnings and errors, hide progress.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Database file (overrides config).
    #[arg(long, global = true, env = "BIRDFUSE_DB")]
    pub db: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Correlate visual and audio event streams and store the results.
    Ingest(IngestArgs),
    /// Show per-species daily statistics.
    Stats(StatsArgs),
    /// Show the chronological detection feed of one day.
    Today(TodayArgs),
    /// List the most recent correlated sightings.
    Sightings(SightingsArgs),
    /// Print the daily digest.
    Digest(DigestArgs),
    /// Export correlated sightings as an eBird record-format CSV.
    ExportEbird(ExportArgs),
    /// Delete data older than the retention period.
    Prune(PruneArgs),
    /// Manage configuration.
    Config {
        /// Configuration action to perform.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommand actions.
#[derive(Debug, Clone, Copy, Subcommand)]
pub enum ConfigAction {
    /// Create default configuration file.
    Init,
    /// Display current configuration.
    Show,
    /// Print configuration file path.
    Path,
}

/// Arguments for the ingest command.
#[derive(Debug, Args)]
pub struct IngestArgs {
    /// Visual events, one JSON object per line (`-` for stdin).
    #[arg(long, env = "BIRDFUSE_VISUAL")]
    pub visual: PathBuf,

    /// Audio events, one JSON object per line (`-` for stdin).
    #[arg(long, env = "BIRDFUSE_AUDIO")]
    pub audio: PathBuf,

    /// Correlation window in seconds.
    #[arg(short, long, value_parser = parse_window, env = "BIRDFUSE_WINDOW")]
    pub window: Option<f64>,

    /// Minimum confidence for audio detections to be matched (0.0-1.0).
    #[arg(long, value_parser = parse_confidence, env = "BIRDFUSE_AUDIO_MIN_CONFIDENCE")]
    pub audio_min_confidence: Option<f32>,

    /// Drop visual events below this confidence (0.0-1.0).
    #[arg(long, value_parser = parse_confidence, env = "BIRDFUSE_VISUAL_THRESHOLD")]
    pub visual_threshold: Option<f32>,

    /// Fused confidence policy.
    #[arg(long, value_enum, env = "BIRDFUSE_FUSION")]
    pub fusion: Option<FusionPolicy>,

    /// Hide progress spinners.
    #[arg(long)]
    pub no_progress: bool,

    /// Remove locks older than this duration (e.g., 1h, 30m).
    #[arg(long, value_parser = parse_duration)]
    pub stale_lock_timeout: Option<Duration>,
}

/// Arguments for the stats command.
#[derive(Debug, Args)]
pub struct StatsArgs {
    /// Single day to show (default: the last `--days` days).
    #[arg(long, value_parser = parse_date, conflicts_with = "days")]
    pub date: Option<NaiveDate>,

    /// Number of days to show, today included.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub days: Option<u32>,

    /// Print JSON instead of tables.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the today command.
#[derive(Debug, Args)]
pub struct TodayArgs {
    /// Day to show (default: today, UTC).
    #[arg(long, value_parser = parse_date)]
    pub date: Option<NaiveDate>,

    /// Print JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the sightings command.
#[derive(Debug, Args)]
pub struct SightingsArgs {
    /// Maximum number of sightings to list.
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,

    /// Print JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the digest command.
#[derive(Debug, Args)]
pub struct DigestArgs {
    /// Day to summarize (default: today, UTC).
    #[arg(long, value_parser = parse_date)]
    pub date: Option<NaiveDate>,

    /// Write the digest to this file instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments for the export-ebird command.
#[derive(Debug, Args)]
pub struct ExportArgs {
    /// First day to export.
    #[arg(long, value_parser = parse_date, conflicts_with = "days")]
    pub start: Option<NaiveDate>,

    /// Last day to export, inclusive (default: today, UTC).
    #[arg(long, value_parser = parse_date)]
    pub end: Option<NaiveDate>,

    /// Export the last N days, today included.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub days: Option<u32>,

    /// Output file (default: stdout).
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Disable UTF-8 BOM in CSV output.
    #[arg(long)]
    pub no_csv_bom: bool,
}

/// Arguments for the prune command.
#[derive(Debug, Args)]
pub struct PruneArgs {
    /// Delete data older than this many days (default: `storage.retention_days`).
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub older_than_days: Option<u32>,
}
