//! Configuration type definitions.

use crate::constants::{
    DEAD_LETTER_FILE_NAME, DEFAULT_AUDIO_MIN_CONFIDENCE,
    DEFAULT_CORRELATION_WINDOW_SECS, DEFAULT_MAX_WINDOW_ENTRIES,
    DEFAULT_VISUAL_CONFIDENCE_THRESHOLD, ebird, retry,
};
use crate::correlate::FusionPolicy;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Correlation engine settings.
    pub correlation: CorrelationConfig,

    /// Persistence settings.
    pub storage: StorageConfig,

    /// eBird export settings.
    pub export: ExportConfig,
}

/// Correlation engine settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CorrelationConfig {
    /// Maximum time separation in seconds between matched detections.
    pub window_seconds: f64,

    /// Audio below this confidence never enters the window.
    pub audio_min_confidence: f32,

    /// Visual events below this confidence are dropped at ingest.
    pub visual_confidence_threshold: f32,

    /// How sighting confidence is derived.
    pub fusion: FusionPolicy,

    /// Bound on the audio window and the pending visual queue.
    pub max_window_entries: usize,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            window_seconds: DEFAULT_CORRELATION_WINDOW_SECS,
            audio_min_confidence: DEFAULT_AUDIO_MIN_CONFIDENCE,
            visual_confidence_threshold: DEFAULT_VISUAL_CONFIDENCE_THRESHOLD,
            fusion: FusionPolicy::default(),
            max_window_entries: DEFAULT_MAX_WINDOW_ENTRIES,
        }
    }
}

/// Persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file. Defaults to the platform data directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,

    /// Where records that could not be written are appended.
    /// Defaults to a file next to the database.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dead_letter: Option<PathBuf>,

    /// Write attempts per record.
    pub retry_attempts: u32,

    /// First retry delay in milliseconds.
    pub retry_base_delay_ms: u64,

    /// Backoff ceiling in milliseconds.
    pub retry_max_delay_ms: u64,

    /// Days of history kept by `prune` when no cutoff is given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retention_days: Option<u32>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: None,
            dead_letter: None,
            retry_attempts: retry::DEFAULT_ATTEMPTS,
            retry_base_delay_ms: retry::DEFAULT_BASE_DELAY_MS,
            retry_max_delay_ms: retry::DEFAULT_MAX_DELAY_MS,
            retention_days: None,
        }
    }
}

impl StorageConfig {
    /// Resolve the database path, falling back to the platform default.
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.database {
            Some(path) => Ok(path.clone()),
            None => super::default_database_path(),
        }
    }

    /// Resolve the dead-letter path for a given database.
    pub fn dead_letter_path(&self, database: &Path) -> PathBuf {
        self.dead_letter.clone().unwrap_or_else(|| {
            database
                .parent()
                .map_or_else(|| PathBuf::from(DEAD_LETTER_FILE_NAME), |dir| dir.join(DEAD_LETTER_FILE_NAME))
        })
    }
}

/// eBird export settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExportConfig {
    /// Location name written to every row.
    pub location_name: String,

    /// Observation point latitude.
    pub latitude: f64,

    /// Observation point longitude.
    pub longitude: f64,

    /// eBird protocol name.
    pub protocol: String,

    /// Observation duration in minutes.
    pub duration_minutes: u32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            location_name: ebird::DEFAULT_LOCATION_NAME.to_string(),
            latitude: ebird::DEFAULT_LATITUDE,
            longitude: ebird::DEFAULT_LONGITUDE,
            protocol: ebird::DEFAULT_PROTOCOL.to_string(),
            duration_minutes: ebird::DEFAULT_DURATION_MINUTES,
        }
    }
}
