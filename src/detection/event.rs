//! Wire-format events from the visual and audio producers.
//!
//! Raw events mirror the JSON payloads one-to-one. `TryFrom` conversions
//! validate them into [`VisualDetection`] / [`AudioDetection`]; anything
//! malformed is rejected here, before it can reach the correlation window.

use super::types::{AudioDetection, VisualDetection, new_id};
use crate::constants::confidence;
use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;

/// Timestamp as either epoch seconds or an ISO-8601 string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    /// Seconds since the Unix epoch.
    Epoch(f64),
    /// ISO-8601 / RFC 3339 text. A missing offset means UTC.
    Text(String),
}

impl RawTimestamp {
    /// Resolve to a UTC timestamp.
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Epoch(secs) => epoch_to_utc(*secs),
            Self::Text(text) => parse_timestamp(text),
        }
    }
}

/// One ranked candidate from the visual species classifier.
#[derive(Debug, Clone, Deserialize)]
pub struct RankedSpecies {
    /// Classifier label.
    pub name: String,
    /// Candidate confidence.
    pub confidence: f32,
}

/// Species field of a visual event: a single label or a ranked list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawSpecies {
    /// Single label.
    Label(String),
    /// Ranked candidates, best first.
    Ranked(Vec<RankedSpecies>),
}

/// Visual detection as published by the camera pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct RawVisualEvent {
    /// Producer-assigned identifier.
    #[serde(default)]
    pub id: Option<String>,
    /// Capture time.
    pub timestamp: Option<RawTimestamp>,
    /// Species label or ranked candidates.
    #[serde(alias = "species_label", alias = "label")]
    pub species: Option<RawSpecies>,
    /// Confidence of the top label.
    #[serde(default)]
    pub confidence: Option<f32>,
    /// Stored crop or frame.
    #[serde(default, alias = "image")]
    pub image_path: Option<String>,
}

/// Audio detection as published by the call recognizer.
#[derive(Debug, Clone, Deserialize)]
pub struct RawAudioEvent {
    /// Producer-assigned identifier.
    #[serde(default)]
    pub id: Option<String>,
    /// Start of the analyzed window.
    pub timestamp: Option<RawTimestamp>,
    /// Common name.
    #[serde(default)]
    pub common_name: Option<String>,
    /// Scientific name.
    #[serde(default, alias = "species")]
    pub scientific_name: Option<String>,
    /// Recognition confidence.
    pub confidence: Option<f32>,
    /// Stored audio clip.
    #[serde(default)]
    pub audio_path: Option<String>,
    /// Producer tag.
    #[serde(default)]
    pub source: Option<String>,
}

impl TryFrom<RawVisualEvent> for VisualDetection {
    type Error = Error;

    fn try_from(raw: RawVisualEvent) -> Result<Self> {
        let timestamp = raw
            .timestamp
            .as_ref()
            .ok_or_else(|| Error::invalid_visual("missing timestamp"))?;
        let timestamp = timestamp
            .to_utc()
            .ok_or_else(|| Error::invalid_visual(format!("unparseable timestamp {timestamp:?}")))?;

        let (species, ranked_confidence) = match raw.species {
            Some(RawSpecies::Label(label)) => (label, None),
            Some(RawSpecies::Ranked(candidates)) => {
                let top = candidates
                    .into_iter()
                    .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
                    .ok_or_else(|| Error::invalid_visual("empty species candidate list"))?;
                (top.name, Some(top.confidence))
            }
            None => return Err(Error::invalid_visual("missing species")),
        };

        let species = species.trim().to_string();
        if species.is_empty() {
            return Err(Error::invalid_visual("empty species label"));
        }

        let confidence = raw
            .confidence
            .or(ranked_confidence)
            .ok_or_else(|| Error::invalid_visual("missing confidence"))?;
        validate_confidence(confidence).map_err(Error::invalid_visual)?;

        Ok(Self {
            id: resolve_id(raw.id),
            timestamp,
            species,
            confidence,
            image_path: raw.image_path.filter(|p| !p.trim().is_empty()),
        })
    }
}

impl TryFrom<RawAudioEvent> for AudioDetection {
    type Error = Error;

    fn try_from(raw: RawAudioEvent) -> Result<Self> {
        let timestamp = raw
            .timestamp
            .as_ref()
            .ok_or_else(|| Error::invalid_audio("missing timestamp"))?;
        let timestamp = timestamp
            .to_utc()
            .ok_or_else(|| Error::invalid_audio(format!("unparseable timestamp {timestamp:?}")))?;

        let common_name = raw.common_name.map(|s| s.trim().to_string()).unwrap_or_default();
        let scientific_name = raw
            .scientific_name
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
        if common_name.is_empty() && scientific_name.is_empty() {
            return Err(Error::invalid_audio("empty species"));
        }

        let confidence = raw
            .confidence
            .ok_or_else(|| Error::invalid_audio("missing confidence"))?;
        validate_confidence(confidence).map_err(Error::invalid_audio)?;

        Ok(Self {
            id: resolve_id(raw.id),
            timestamp,
            // Either name can stand in for the other when the producer only sent one.
            common_name: if common_name.is_empty() {
                scientific_name.clone()
            } else {
                common_name.clone()
            },
            scientific_name: if scientific_name.is_empty() {
                common_name
            } else {
                scientific_name
            },
            confidence,
            audio_path: raw.audio_path.filter(|p| !p.trim().is_empty()),
            source: raw.source,
        })
    }
}

/// Parse one NDJSON line into a validated visual detection.
pub fn parse_visual_line(line: &str) -> Result<VisualDetection> {
    let raw: RawVisualEvent = serde_json::from_str(line)
        .map_err(|e| Error::invalid_visual(format!("malformed JSON: {e}")))?;
    raw.try_into()
}

/// Parse one NDJSON line into a validated audio detection.
pub fn parse_audio_line(line: &str) -> Result<AudioDetection> {
    let raw: RawAudioEvent = serde_json::from_str(line)
        .map_err(|e| Error::invalid_audio(format!("malformed JSON: {e}")))?;
    raw.try_into()
}

/// Parse an ISO-8601 timestamp; naive timestamps are taken as UTC.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

#[allow(clippy::cast_possible_truncation)]
fn epoch_to_utc(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let micros = (secs * 1e6).round();
    if micros.abs() > i64::MAX as f64 {
        return None;
    }
    DateTime::from_timestamp_micros(micros as i64)
}

fn validate_confidence(value: f32) -> std::result::Result<(), String> {
    if value.is_nan() || !(confidence::MIN..=confidence::MAX).contains(&value) {
        return Err(format!(
            "confidence must be between {} and {}, got {value}",
            confidence::MIN,
            confidence::MAX
        ));
    }
    Ok(())
}

fn resolve_id(id: Option<String>) -> String {
    id.map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(new_id)
}
