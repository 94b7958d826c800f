//! Application-wide constants.
//!
//! All magic numbers and strings are defined here to ensure consistency
//! and make changes easy to track.

use crate::correlate::FusionPolicy;

/// Application name used for config directories and user-facing messages.
pub const APP_NAME: &str = "birdfuse";

/// Default correlation window in seconds.
///
/// A visual and an audio detection are only considered the same bird when
/// their timestamps are at most this far apart.
pub const DEFAULT_CORRELATION_WINDOW_SECS: f64 = 30.0;

/// Default minimum confidence for audio detections to enter the window.
pub const DEFAULT_AUDIO_MIN_CONFIDENCE: f32 = 0.25;

/// Default minimum confidence for visual detections at the ingest boundary.
pub const DEFAULT_VISUAL_CONFIDENCE_THRESHOLD: f32 = 0.6;

/// Confidence fusion policy used when none is configured.
pub const DEFAULT_FUSION_POLICY: FusionPolicy = FusionPolicy::Max;

/// Upper bound on entries held in the audio window and the pending visual queue.
pub const DEFAULT_MAX_WINDOW_ENTRIES: usize = 10_000;

/// Maximum configurable correlation window (one hour).
pub const MAX_CORRELATION_WINDOW_SECS: f64 = 3600.0;

/// Labels that mark a visual detection as noise rather than a bird.
pub const BACKGROUND_LABELS: &[&str] = &["background", "non-bird", "none", "no bird"];

/// Database file name inside the data directory.
pub const DATABASE_FILE_NAME: &str = "birdfuse.db";

/// Dead-letter file name inside the data directory.
pub const DEAD_LETTER_FILE_NAME: &str = "failed_writes.jsonl";

/// Lock file extension appended to the database path.
pub const LOCK_FILE_EXTENSION: &str = ".birdfuse.lock";

/// Sink write retry defaults.
pub mod retry {
    /// Attempts per record before it is dead-lettered.
    pub const DEFAULT_ATTEMPTS: u32 = 5;
    /// Delay before the first retry in milliseconds.
    pub const DEFAULT_BASE_DELAY_MS: u64 = 100;
    /// Backoff ceiling in milliseconds.
    pub const DEFAULT_MAX_DELAY_MS: u64 = 5_000;
}

/// Confidence value bounds.
pub mod confidence {
    /// Minimum valid confidence value.
    pub const MIN: f32 = 0.0;
    /// Maximum valid confidence value.
    pub const MAX: f32 = 1.0;
    /// Decimal places for confidence formatting.
    pub const DECIMAL_PLACES: usize = 4;
}

/// eBird export constants.
pub mod ebird {
    /// Default location name.
    pub const DEFAULT_LOCATION_NAME: &str = "My Garden";
    /// Default latitude.
    pub const DEFAULT_LATITUDE: f64 = 47.3769;
    /// Default longitude.
    pub const DEFAULT_LONGITUDE: f64 = 8.5417;
    /// Observation protocol.
    pub const DEFAULT_PROTOCOL: &str = "eBird - Stationary Count";
    /// Observation duration in minutes.
    pub const DEFAULT_DURATION_MINUTES: u32 = 60;
    /// eBird expects US-style dates.
    pub const DATE_FORMAT: &str = "%m/%d/%Y";
    /// Start time format.
    pub const TIME_FORMAT: &str = "%H:%M";
}

/// Report defaults.
pub mod report {
    /// Default number of rows for `sightings`.
    pub const DEFAULT_SIGHTINGS_LIMIT: usize = 50;
    /// Default look-back for multi-day statistics.
    pub const DEFAULT_STATS_DAYS: u32 = 7;
    /// Width of digest banner lines.
    pub const DIGEST_WIDTH: usize = 60;
}

/// UTF-8 Byte Order Mark for Excel compatibility in CSV files.
pub const UTF8_BOM: &[u8; 3] = b"\xEF\xBB\xBF";
