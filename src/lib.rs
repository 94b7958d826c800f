//! Birdfuse - correlation of visual and audio bird detections.
//!
//! A camera classifier and a microphone classifier report detections
//! independently. This crate pairs them into confirmed sightings, keeps
//! every detection in a local database and derives daily statistics,
//! digests and eBird exports from it.

#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod constants;
pub mod correlate;
pub mod detection;
pub mod error;
pub mod locking;
pub mod output;
pub mod pipeline;
pub mod species;
pub mod stats;
pub mod store;
pub mod utils;

use clap::Parser;
use cli::{
    Cli, Command, ConfigAction, DigestArgs, ExportArgs, IngestArgs, PruneArgs, SightingsArgs,
    StatsArgs, TodayArgs,
};
use config::{Config, config_file_path, load_default_config, save_default_config};
use constants::report::{DEFAULT_SIGHTINGS_LIMIT, DEFAULT_STATS_DAYS};
use correlate::CorrelationEngine;
use locking::StoreLock;
use pipeline::{EventSource, IngestOptions};
use stats::DailyStats;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use store::{DeadLetter, RetryPolicy, SqliteStore};
use tracing::{info, warn};
use utils::date::{day_bounds, days_before, today_utc};

pub use error::{Error, Result};

/// Main entry point for the birdfuse CLI.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    // Install Ctrl+C handler to clean up lock files on interrupt
    if let Err(e) = ctrlc::set_handler(|| {
        locking::cleanup_all_locks();
        std::process::exit(130); // 128 + SIGINT(2)
    }) {
        warn!("Failed to install Ctrl+C handler: {e}");
    }

    if let Command::Config { action } = cli.command {
        return handle_config_command(action);
    }

    let mut config = load_default_config()?;
    if let Some(db) = &cli.db {
        config.storage.database = Some(db.clone());
    }
    config::validate_config(&config)?;

    match cli.command {
        Command::Ingest(args) => handle_ingest(&args, config, cli.quiet),
        Command::Stats(args) => handle_stats(&args, &config),
        Command::Today(args) => handle_today(&args, &config),
        Command::Sightings(args) => handle_sightings(&args, &config),
        Command::Digest(args) => handle_digest(&args, &config),
        Command::ExportEbird(args) => handle_export(&args, &config),
        Command::Prune(args) => handle_prune(&args, &config),
        Command::Config { action } => handle_config_command(action),
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter_str = if quiet {
        "warn"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_str));

    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

/// Apply ingest flags over the configuration file.
fn apply_ingest_overrides(config: &mut Config, args: &IngestArgs) -> Result<()> {
    let correlation = &mut config.correlation;
    if let Some(window) = args.window {
        correlation.window_seconds = window;
    }
    if let Some(confidence) = args.audio_min_confidence {
        correlation.audio_min_confidence = confidence;
    }
    if let Some(threshold) = args.visual_threshold {
        correlation.visual_confidence_threshold = threshold;
    }
    if let Some(fusion) = args.fusion {
        correlation.fusion = fusion;
    }
    config::validate_config(config)
}

fn open_store(config: &Config) -> Result<SqliteStore> {
    SqliteStore::open(&config.storage.database_path()?)
}

fn handle_ingest(args: &IngestArgs, mut config: Config, quiet: bool) -> Result<()> {
    apply_ingest_overrides(&mut config, args)?;

    let database = config.storage.database_path()?;
    let _lock = StoreLock::acquire(&database, args.stale_lock_timeout)?;
    let store = Arc::new(SqliteStore::open(&database)?);
    let engine = CorrelationEngine::new(&config.correlation)?;

    info!(
        "Correlation window {}s, fusion {}, audio minimum {:.2}, visual threshold {:.2}",
        config.correlation.window_seconds,
        config.correlation.fusion,
        config.correlation.audio_min_confidence,
        config.correlation.visual_confidence_threshold
    );

    let options = IngestOptions {
        visual: EventSource::from_arg(&args.visual),
        audio: EventSource::from_arg(&args.audio),
        visual_threshold: config.correlation.visual_confidence_threshold,
        audio_threshold: config.correlation.audio_min_confidence,
        progress: !quiet && !args.no_progress,
    };

    pipeline::ingest(
        &engine,
        store,
        RetryPolicy::from_config(&config.storage),
        DeadLetter::new(config.storage.dead_letter_path(&database)),
        &options,
    )?;
    Ok(())
}

fn handle_stats(args: &StatsArgs, config: &Config) -> Result<()> {
    let store = open_store(config)?;

    let days = if let Some(date) = args.date {
        vec![DailyStats {
            date,
            species: store.stats_for(date)?,
        }]
    } else {
        let count = args.days.unwrap_or(DEFAULT_STATS_DAYS);
        store.daily_stats_since(days_before(today_utc(), count.saturating_sub(1)))?
    };

    if args.json {
        println!("{}", output::to_json(&days)?);
    } else {
        print!("{}", output::render_stats(&days));
    }
    Ok(())
}

fn handle_today(args: &TodayArgs, config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let date = args.date.unwrap_or_else(today_utc);
    let records = store.detections_on(date)?;

    if args.json {
        println!("{}", output::to_json(&records)?);
    } else {
        println!("Detections on {date}");
        print!("{}", output::render_feed(&records));
    }
    Ok(())
}

fn handle_sightings(args: &SightingsArgs, config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let sightings = store.recent_sightings(args.limit.unwrap_or(DEFAULT_SIGHTINGS_LIMIT))?;

    if args.json {
        println!("{}", output::to_json(&sightings)?);
    } else {
        print!("{}", output::render_sightings(&sightings));
    }
    Ok(())
}

fn handle_digest(args: &DigestArgs, config: &Config) -> Result<()> {
    let store = open_store(config)?;
    let date = args.date.unwrap_or_else(today_utc);
    let stats = DailyStats {
        date,
        species: store.stats_for(date)?,
    };
    let records = store.detections_on(date)?;
    let digest = output::render_digest(date, &stats, &records);

    match &args.output {
        Some(path) => {
            std::fs::write(path, digest)?;
            info!("Wrote digest for {date} to {}", path.display());
        }
        None => print!("{digest}"),
    }
    Ok(())
}

fn handle_export(args: &ExportArgs, config: &Config) -> Result<()> {
    let end = args.end.unwrap_or_else(today_utc);
    let start = match (args.start, args.days) {
        (Some(start), _) => start,
        (None, Some(days)) => days_before(end, days.saturating_sub(1)),
        (None, None) => end,
    };
    if start > end {
        return Err(Error::InvalidArgument {
            message: format!("start date {start} is after end date {end}"),
        });
    }

    let store = open_store(config)?;
    let (from, _) = day_bounds(start);
    let (_, to) = day_bounds(end);
    let sightings = store.sightings_between(from, to)?;
    let rows = output::build_ebird_rows(&sightings, &config.export);
    let bom = !args.no_csv_bom;

    match &args.output {
        Some(path) => {
            output::write_ebird_file(path, &rows, bom)?;
            info!(
                "Exported {} eBird row(s) from {} sighting(s) to {}",
                rows.len(),
                sightings.len(),
                path.display()
            );
        }
        None => {
            let stdout = std::io::stdout();
            output::write_ebird_csv(stdout.lock(), &rows, bom).map_err(|source| {
                Error::CsvWrite {
                    path: PathBuf::from("-"),
                    source,
                }
            })?;
        }
    }
    Ok(())
}

fn handle_prune(args: &PruneArgs, config: &Config) -> Result<()> {
    let days = args
        .older_than_days
        .or(config.storage.retention_days)
        .ok_or_else(|| Error::InvalidArgument {
            message: "no retention period (use --older-than-days or set storage.retention_days)"
                .to_string(),
        })?;

    let database = config.storage.database_path()?;
    let _lock = StoreLock::acquire(&database, None)?;
    let store = SqliteStore::open(&database)?;
    let cutoff = days_before(today_utc(), days);
    let summary = store.prune_before(cutoff)?;

    println!(
        "Removed {} row(s) dated before {cutoff}: {} visual, {} audio, {} sightings, {} daily stats",
        summary.total(),
        summary.visual,
        summary.audio,
        summary.sightings,
        summary.stats
    );
    Ok(())
}

fn handle_config_command(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Init => {
            let path = config_file_path()?;
            if path.exists() {
                println!("Configuration file already exists: {}", path.display());
            } else {
                let saved_path = save_default_config(&Config::default())?;
                println!("Created configuration file: {}", saved_path.display());
                print_next_steps(&saved_path);
            }
            Ok(())
        }
        ConfigAction::Show => {
            let config = load_default_config()?;
            let text = toml::to_string_pretty(&config)
                .map_err(|source| Error::ConfigSerialize { source })?;
            print!("{text}");
            Ok(())
        }
        ConfigAction::Path => {
            let path = config_file_path()?;
            println!("{}", path.display());
            Ok(())
        }
    }
}

fn print_next_steps(config_path: &Path) {
    let mut out = std::io::stdout().lock();
    let _ = writeln!(out, "\nNext steps:");
    let _ = writeln!(
        out,
        "  edit {} to set the correlation window and export location",
        config_path.display()
    );
    let _ = writeln!(
        out,
        "  birdfuse ingest --visual camera.ndjson --audio birdnet.ndjson"
    );
}
