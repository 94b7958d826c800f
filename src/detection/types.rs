//! Detection record types.

use crate::species::{SpeciesName, normalize};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A classified bird seen by the camera pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualDetection {
    /// Unique identifier.
    pub id: String,
    /// Capture time.
    pub timestamp: DateTime<Utc>,
    /// Classifier label, e.g. `"Cyanocitta cristata (Blue Jay)"`.
    pub species: String,
    /// Classification confidence (0.0 - 1.0).
    pub confidence: f32,
    /// Stored crop or frame.
    pub image_path: Option<String>,
}

impl VisualDetection {
    /// Parsed species identity of the label.
    pub fn species_name(&self) -> SpeciesName {
        normalize(&self.species)
    }
}

/// A bird call recognized by the audio pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioDetection {
    /// Unique identifier.
    pub id: String,
    /// Start of the analyzed audio window.
    pub timestamp: DateTime<Utc>,
    /// Common name of the species.
    pub common_name: String,
    /// Scientific name of the species.
    pub scientific_name: String,
    /// Recognition confidence (0.0 - 1.0).
    pub confidence: f32,
    /// Stored audio clip.
    pub audio_path: Option<String>,
    /// Producer tag (e.g. `birdnet`).
    pub source: Option<String>,
}

impl AudioDetection {
    /// Species identity from the separate name fields.
    pub fn species_name(&self) -> SpeciesName {
        SpeciesName::from_parts(Some(&self.common_name), Some(&self.scientific_name))
    }
}

/// A visual detection confirmed by an audio detection of the same species.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelatedSighting {
    /// Unique identifier.
    pub id: String,
    /// The visual detection this sighting is built on.
    pub visual_id: String,
    /// The audio detection consumed by this sighting.
    pub audio_id: String,
    /// Timestamp of the visual detection.
    pub timestamp: DateTime<Utc>,
    /// Visual classifier label.
    pub species: String,
    /// Common name of the species.
    pub common_name: String,
    /// Scientific name of the species.
    pub scientific_name: String,
    /// Fused confidence.
    pub confidence: f32,
    /// Confidence of the visual detection.
    pub visual_confidence: f32,
    /// Confidence of the audio detection.
    pub audio_confidence: f32,
    /// Stored crop or frame.
    pub image_path: Option<String>,
    /// Stored audio clip.
    pub audio_path: Option<String>,
    /// `audio.timestamp - visual.timestamp` in seconds.
    pub time_diff: f64,
}

/// Any of the three stored detection kinds, for chronological feeds.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DetectionRecord {
    /// Standalone visual detection.
    Visual(VisualDetection),
    /// Standalone audio detection.
    Audio(AudioDetection),
    /// Correlated sighting.
    Correlated(CorrelatedSighting),
}

impl DetectionRecord {
    /// Event time of the record.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Visual(v) => v.timestamp,
            Self::Audio(a) => a.timestamp,
            Self::Correlated(s) => s.timestamp,
        }
    }

    /// Short label of the record kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Visual(_) => "visual",
            Self::Audio(_) => "audio",
            Self::Correlated(_) => "correlated",
        }
    }

    /// Display name of the species involved.
    pub fn display_name(&self) -> String {
        match self {
            Self::Visual(v) => v
                .species_name()
                .display_name()
                .map_or_else(|| v.species.clone(), str::to_string),
            Self::Audio(a) => a.common_name.clone(),
            Self::Correlated(s) => s.common_name.clone(),
        }
    }

    /// Confidence of the record (fused for sightings).
    pub fn confidence(&self) -> f32 {
        match self {
            Self::Visual(v) => v.confidence,
            Self::Audio(a) => a.confidence,
            Self::Correlated(s) => s.confidence,
        }
    }
}

/// Signed difference `later - earlier` in fractional seconds.
pub fn seconds_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    let delta = later - earlier;
    #[allow(clippy::cast_precision_loss)]
    delta
        .num_microseconds()
        .map_or_else(|| delta.num_milliseconds() as f64 / 1e3, |us| us as f64 / 1e6)
}

/// Generate a new unique record identifier.
pub fn new_id() -> String {
    ulid::Ulid::new().to_string()
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_seconds_between_signed() {
        let a = Utc.timestamp_opt(100, 0).unwrap();
        let b = Utc.timestamp_opt(102, 500_000_000).unwrap();
        assert_eq!(seconds_between(a, b), 2.5);
        assert_eq!(seconds_between(b, a), -2.5);
    }

    #[test]
    fn test_new_id_unique() {
        assert_ne!(new_id(), new_id());
    }

    #[test]
    fn test_record_display_name_prefers_common() {
        let visual = VisualDetection {
            id: "v1".to_string(),
            timestamp: Utc.timestamp_opt(0, 0).unwrap(),
            species: "Parus major (Great Tit)".to_string(),
            confidence: 0.9,
            image_path: None,
        };
        assert_eq!(DetectionRecord::Visual(visual).display_name(), "Great Tit");
    }
}
