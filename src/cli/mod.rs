//! CLI argument parsing and command handling.

mod args;
mod validators;

pub use args::{
    Cli, Command, ConfigAction, DigestArgs, ExportArgs, IngestArgs, PruneArgs, SightingsArgs,
    StatsArgs, TodayArgs,
};
