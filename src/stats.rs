//! Per-day, per-species detection statistics.

use crate::detection::{AudioDetection, CorrelatedSighting, DetectionRecord, VisualDetection};
use crate::species::SpeciesName;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Counts for one species on one UTC calendar date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpeciesDayStats {
    /// Visual detections recorded.
    pub visual_count: u64,
    /// Audio detections recorded.
    pub audio_count: u64,
    /// Correlated sightings recorded.
    pub correlated_count: u64,
    /// Earliest detection of the day.
    pub first_seen: DateTime<Utc>,
    /// Latest detection of the day.
    pub last_seen: DateTime<Utc>,
}

impl SpeciesDayStats {
    /// Visual plus audio detections.
    pub fn total(&self) -> u64 {
        self.visual_count + self.audio_count
    }
}

/// All species statistics of one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyStats {
    /// UTC calendar date.
    pub date: NaiveDate,
    /// Statistics keyed by species display name.
    pub species: BTreeMap<String, SpeciesDayStats>,
}

impl DailyStats {
    /// Sum of visual detections across species.
    pub fn visual_total(&self) -> u64 {
        self.species.values().map(|s| s.visual_count).sum()
    }

    /// Sum of audio detections across species.
    pub fn audio_total(&self) -> u64 {
        self.species.values().map(|s| s.audio_count).sum()
    }

    /// Sum of correlated sightings across species.
    pub fn correlated_total(&self) -> u64 {
        self.species.values().map(|s| s.correlated_count).sum()
    }

    /// Species ordered by total detections, most frequent first.
    pub fn ranked(&self) -> Vec<(&str, &SpeciesDayStats)> {
        let mut ranked: Vec<_> = self
            .species
            .iter()
            .map(|(name, stats)| (name.as_str(), stats))
            .collect();
        ranked.sort_by(|a, b| b.1.total().cmp(&a.1.total()).then_with(|| a.0.cmp(b.0)));
        ranked
    }
}

/// Which counter a record increments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatColumn {
    /// `visual_count`
    Visual,
    /// `audio_count`
    Audio,
    /// `correlated_count`
    Correlated,
}

impl StatColumn {
    /// Column name in the rollup table.
    pub fn column(self) -> &'static str {
        match self {
            Self::Visual => "visual_count",
            Self::Audio => "audio_count",
            Self::Correlated => "correlated_count",
        }
    }
}

/// The rollup change a newly stored record causes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatUpdate {
    /// UTC date of the record.
    pub date: NaiveDate,
    /// Species display name.
    pub species: String,
    /// Counter to increment.
    pub column: StatColumn,
    /// Record timestamp.
    pub timestamp: DateTime<Utc>,
}

impl StatUpdate {
    /// Rollup change for a visual detection, `None` for background.
    pub fn for_visual(detection: &VisualDetection) -> Option<Self> {
        Self::build(
            &detection.species_name(),
            &detection.species,
            StatColumn::Visual,
            detection.timestamp,
        )
    }

    /// Rollup change for an audio detection, `None` for background.
    pub fn for_audio(detection: &AudioDetection) -> Option<Self> {
        Self::build(
            &detection.species_name(),
            &detection.common_name,
            StatColumn::Audio,
            detection.timestamp,
        )
    }

    /// Rollup change for a correlated sighting.
    pub fn for_sighting(sighting: &CorrelatedSighting) -> Option<Self> {
        let name =
            SpeciesName::from_parts(Some(&sighting.common_name), Some(&sighting.scientific_name));
        Self::build(
            &name,
            &sighting.species,
            StatColumn::Correlated,
            sighting.timestamp,
        )
    }

    /// Rollup change for any record kind.
    pub fn for_record(record: &DetectionRecord) -> Option<Self> {
        match record {
            DetectionRecord::Visual(v) => Self::for_visual(v),
            DetectionRecord::Audio(a) => Self::for_audio(a),
            DetectionRecord::Correlated(s) => Self::for_sighting(s),
        }
    }

    fn build(
        name: &SpeciesName,
        fallback: &str,
        column: StatColumn,
        timestamp: DateTime<Utc>,
    ) -> Option<Self> {
        if name.is_background() {
            return None;
        }

        Some(Self {
            date: timestamp.date_naive(),
            species: name
                .display_name()
                .map_or_else(|| fallback.trim().to_string(), str::to_string),
            column,
            timestamp,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn visual(species: &str) -> DetectionRecord {
        DetectionRecord::Visual(VisualDetection {
            id: "v".to_string(),
            timestamp: Utc.with_ymd_and_hms(2025, 5, 1, 23, 59, 59).unwrap(),
            species: species.to_string(),
            confidence: 0.9,
            image_path: None,
        })
    }

    #[test]
    fn test_visual_keyed_by_common_name() {
        let update = StatUpdate::for_record(&visual("671 Passer domesticus (House Sparrow)")).unwrap();
        assert_eq!(update.species, "House Sparrow");
        assert_eq!(update.column, StatColumn::Visual);
        assert_eq!(update.date, NaiveDate::from_ymd_opt(2025, 5, 1).unwrap());
    }

    #[test]
    fn test_visual_scientific_only_falls_back() {
        let update = StatUpdate::for_record(&visual("Parus major")).unwrap();
        assert_eq!(update.species, "Parus major");
    }

    #[test]
    fn test_background_not_counted() {
        assert!(StatUpdate::for_record(&visual("Background")).is_none());
    }

    #[test]
    fn test_audio_keyed_by_common_name() {
        let record = DetectionRecord::Audio(AudioDetection {
            id: "a".to_string(),
            timestamp: Utc.with_ymd_and_hms(2025, 5, 2, 0, 0, 1).unwrap(),
            common_name: "Great Tit".to_string(),
            scientific_name: "Parus major".to_string(),
            confidence: 0.7,
            audio_path: None,
            source: None,
        });
        let update = StatUpdate::for_record(&record).unwrap();
        assert_eq!(update.species, "Great Tit");
        assert_eq!(update.column.column(), "audio_count");
        assert_eq!(update.date, NaiveDate::from_ymd_opt(2025, 5, 2).unwrap());
    }

    #[test]
    fn test_ranked_orders_by_total() {
        let ts = Utc.with_ymd_and_hms(2025, 5, 1, 8, 0, 0).unwrap();
        let entry = |visual_count, audio_count| SpeciesDayStats {
            visual_count,
            audio_count,
            correlated_count: 0,
            first_seen: ts,
            last_seen: ts,
        };
        let stats = DailyStats {
            date: ts.date_naive(),
            species: BTreeMap::from([
                ("Blue Jay".to_string(), entry(1, 0)),
                ("Great Tit".to_string(), entry(2, 3)),
            ]),
        };
        let ranked = stats.ranked();
        assert_eq!(ranked[0].0, "Great Tit");
        assert_eq!(stats.visual_total(), 3);
        assert_eq!(stats.audio_total(), 3);
    }
}
