//! Error types for birdfuse.

/// Result type alias for birdfuse operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for birdfuse.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration directory could not be determined.
    #[error("could not determine configuration directory for this platform")]
    ConfigDirNotFound,

    /// Data directory could not be determined.
    #[error("could not determine data directory for this platform")]
    DataDirNotFound,

    /// Failed to read configuration file.
    #[error("failed to read config file '{path}'")]
    ConfigRead {
        /// Path to the config file.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse configuration file.
    #[error("failed to parse config file '{path}'")]
    ConfigParse {
        /// Path to the config file.
        path: std::path::PathBuf,
        /// Underlying parse error.
        #[source]
        source: toml::de::Error,
    },

    /// Configuration validation failed.
    #[error("configuration validation failed: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    /// Failed to write configuration file.
    #[error("failed to write config file '{path}'")]
    ConfigWrite {
        /// Path to the config file.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to serialize configuration.
    #[error("failed to serialize config")]
    ConfigSerialize {
        /// Underlying serialization error.
        #[source]
        source: toml::ser::Error,
    },

    /// A detection event was rejected at the ingest boundary.
    #[error("invalid {kind} event: {message}")]
    InvalidEvent {
        /// Event kind (`visual` or `audio`).
        kind: &'static str,
        /// Description of the problem.
        message: String,
    },

    /// Command-line arguments are inconsistent.
    #[error("invalid arguments: {message}")]
    InvalidArgument {
        /// Description of the problem.
        message: String,
    },

    /// Failed to open an event stream.
    #[error("failed to open event stream '{path}'")]
    EventStreamOpen {
        /// Path to the stream.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Database operation failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Failed to open the database.
    #[error("failed to open database '{path}'")]
    DatabaseOpen {
        /// Path to the database file.
        path: std::path::PathBuf,
        /// Underlying database error.
        #[source]
        source: rusqlite::Error,
    },

    /// Schema migration failed.
    #[error("schema migration failed: {message}")]
    Migration {
        /// Description of the failure.
        message: String,
    },

    /// Database is locked by another correlator process.
    #[error("database is locked by another process: {path}")]
    StoreLocked {
        /// Path to the lock file.
        path: std::path::PathBuf,
    },

    /// Failed to create lock file.
    #[error("failed to create lock file '{path}'")]
    LockCreate {
        /// Path to the lock file.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to remove lock file.
    #[error("failed to remove lock file '{path}'")]
    LockRemove {
        /// Path to the lock file.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a dead-letter record.
    #[error("failed to write dead-letter file '{path}'")]
    DeadLetterWrite {
        /// Path to the dead-letter file.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write CSV output.
    #[error("failed to write CSV output '{path}'")]
    CsvWrite {
        /// Path to the CSV file.
        path: std::path::PathBuf,
        /// Underlying CSV error.
        #[source]
        source: csv::Error,
    },

    /// Failed to serialize JSON.
    #[error("failed to serialize JSON")]
    JsonSerialize {
        /// Underlying serialization error.
        #[source]
        source: serde_json::Error,
    },

    /// Writer thread went away while records were still being sent.
    #[error("sink writer channel closed unexpectedly")]
    WriterChannelClosed,

    /// Internal error (for unexpected failures).
    #[error("internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },
}

impl Error {
    /// Build an [`Error::InvalidEvent`] for a visual event.
    pub fn invalid_visual(message: impl Into<String>) -> Self {
        Self::InvalidEvent {
            kind: "visual",
            message: message.into(),
        }
    }

    /// Build an [`Error::InvalidEvent`] for an audio event.
    pub fn invalid_audio(message: impl Into<String>) -> Self {
        Self::InvalidEvent {
            kind: "audio",
            message: message.into(),
        }
    }
}
