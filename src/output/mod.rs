//! Reports, exports and progress display.

mod digest;
mod ebird;
pub mod progress;
mod report;

pub use digest::render_digest;
pub use ebird::{EbirdRow, build_ebird_rows, write_ebird_csv, write_ebird_file};
pub use report::{render_feed, render_sightings, render_stats, to_json};
