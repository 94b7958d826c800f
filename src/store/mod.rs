//! Persistence of detections, sightings and daily statistics.

mod migrations;
mod retry;
mod sqlite;
mod writer;

pub use retry::{DeadLetter, RetryPolicy};
pub use sqlite::{PruneSummary, SqliteStore};
pub use writer::{SinkWriter, WriterStats};

use crate::detection::{AudioDetection, CorrelatedSighting, DetectionRecord, VisualDetection};
use crate::error::Result;

/// Destination for detection records.
///
/// Every insert is idempotent on the record `id` and returns whether a new
/// row was written. Implementations update daily statistics in the same
/// transaction as the row itself.
pub trait DetectionSink: Send + Sync {
    /// Store a visual detection.
    fn insert_visual(&self, detection: &VisualDetection) -> Result<bool>;

    /// Store an audio detection.
    fn insert_audio(&self, detection: &AudioDetection) -> Result<bool>;

    /// Store a correlated sighting.
    ///
    /// A sighting reusing an already consumed audio or visual detection is
    /// ignored like a duplicate.
    fn insert_sighting(&self, sighting: &CorrelatedSighting) -> Result<bool>;

    /// Store any record kind.
    fn insert_record(&self, record: &DetectionRecord) -> Result<bool> {
        match record {
            DetectionRecord::Visual(v) => self.insert_visual(v),
            DetectionRecord::Audio(a) => self.insert_audio(a),
            DetectionRecord::Correlated(s) => self.insert_sighting(s),
        }
    }
}
