//! eBird checklist CSV export of correlated sightings.

use crate::config::ExportConfig;
use crate::constants::{UTF8_BOM, ebird};
use crate::detection::CorrelatedSighting;
use crate::error::{Error, Result};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// One row of the eBird record format.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EbirdRow {
    /// Common name (falls back to the visual label).
    #[serde(rename = "Common Name")]
    pub common_name: String,
    /// Scientific name.
    #[serde(rename = "Scientific Name")]
    pub scientific_name: String,
    /// Sightings merged into this row.
    #[serde(rename = "Count")]
    pub count: u64,
    /// Observation location.
    #[serde(rename = "Location Name")]
    pub location_name: String,
    /// Observation latitude.
    #[serde(rename = "Latitude")]
    pub latitude: f64,
    /// Observation longitude.
    #[serde(rename = "Longitude")]
    pub longitude: f64,
    /// `MM/DD/YYYY`.
    #[serde(rename = "Date")]
    pub date: String,
    /// `HH:MM`.
    #[serde(rename = "Start Time")]
    pub start_time: String,
    /// eBird protocol.
    #[serde(rename = "Protocol")]
    pub protocol: String,
    /// Observation duration.
    #[serde(rename = "Duration (Minutes)")]
    pub duration_minutes: u32,
    /// Always `N`: automated observations are incomplete checklists.
    #[serde(rename = "All Obs Reported")]
    pub all_obs_reported: String,
    /// Confidence note.
    #[serde(rename = "Species Comments")]
    pub species_comments: String,
}

type GroupKey = (NaiveDate, String, String, String, String);

/// Group sightings per (date, minute, species) into eBird rows, newest first.
pub fn build_ebird_rows(sightings: &[CorrelatedSighting], config: &ExportConfig) -> Vec<EbirdRow> {
    let mut groups: BTreeMap<GroupKey, (u64, f32)> = BTreeMap::new();
    for s in sightings {
        let key = (
            s.timestamp.date_naive(),
            s.timestamp.format(ebird::TIME_FORMAT).to_string(),
            s.species.clone(),
            s.common_name.clone(),
            s.scientific_name.clone(),
        );
        let entry = groups.entry(key).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 = entry.1.max(s.confidence);
    }

    groups
        .into_iter()
        .rev()
        .map(
            |((date, time, species, common, scientific), (count, best))| EbirdRow {
                common_name: if common.trim().is_empty() { species } else { common },
                scientific_name: scientific,
                count,
                location_name: config.location_name.clone(),
                latitude: config.latitude,
                longitude: config.longitude,
                date: date.format(ebird::DATE_FORMAT).to_string(),
                start_time: time,
                protocol: config.protocol.clone(),
                duration_minutes: config.duration_minutes,
                all_obs_reported: "N".to_string(),
                species_comments: format!(
                    "Automated detection (confidence: {:.0}%)",
                    best * 100.0
                ),
            },
        )
        .collect()
}

/// Write rows as CSV, optionally prefixed with a UTF-8 BOM.
pub fn write_ebird_csv<W: Write>(mut out: W, rows: &[EbirdRow], bom: bool) -> csv::Result<()> {
    if bom {
        out.write_all(UTF8_BOM)?;
    }

    let mut writer = csv::Writer::from_writer(out);
    if rows.is_empty() {
        writer.write_record([
            "Common Name",
            "Scientific Name",
            "Count",
            "Location Name",
            "Latitude",
            "Longitude",
            "Date",
            "Start Time",
            "Protocol",
            "Duration (Minutes)",
            "All Obs Reported",
            "Species Comments",
        ])?;
    }
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write rows to a CSV file.
pub fn write_ebird_file(path: &Path, rows: &[EbirdRow], bom: bool) -> Result<()> {
    let csv_error = |source: csv::Error| Error::CsvWrite {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let file = File::create(path).map_err(|e| csv_error(csv::Error::from(e)))?;
    write_ebird_csv(BufWriter::new(file), rows, bom).map_err(csv_error)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sighting(id: &str, h: u32, m: u32, s: u32, confidence: f32) -> CorrelatedSighting {
        CorrelatedSighting {
            id: id.to_string(),
            visual_id: format!("v-{id}"),
            audio_id: format!("a-{id}"),
            timestamp: Utc.with_ymd_and_hms(2025, 5, 1, h, m, s).unwrap(),
            species: "Cyanocitta cristata (Blue Jay)".to_string(),
            common_name: "Blue Jay".to_string(),
            scientific_name: "Cyanocitta cristata".to_string(),
            confidence,
            visual_confidence: confidence,
            audio_confidence: 0.5,
            image_path: None,
            audio_path: None,
            time_diff: 1.0,
        }
    }

    #[test]
    fn test_rows_grouped_per_minute() {
        let rows = build_ebird_rows(
            &[
                sighting("s1", 8, 0, 5, 0.8),
                sighting("s2", 8, 0, 40, 0.95),
                sighting("s3", 9, 15, 0, 0.7),
            ],
            &ExportConfig::default(),
        );

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].start_time, "09:15");
        assert_eq!(rows[1].start_time, "08:00");
        assert_eq!(rows[1].count, 2);
        assert_eq!(rows[1].date, "05/01/2025");
        assert_eq!(
            rows[1].species_comments,
            "Automated detection (confidence: 95%)"
        );
        assert_eq!(rows[1].all_obs_reported, "N");
    }

    #[test]
    fn test_csv_header_and_bom() {
        let rows = build_ebird_rows(&[sighting("s1", 8, 0, 0, 0.9)], &ExportConfig::default());
        let mut buf = Vec::new();
        write_ebird_csv(&mut buf, &rows, true).unwrap();

        assert!(buf.starts_with(UTF8_BOM));
        let text = String::from_utf8(buf[UTF8_BOM.len()..].to_vec()).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Common Name,Scientific Name,Count,Location Name,Latitude,Longitude,Date,Start Time,Protocol,Duration (Minutes),All Obs Reported,Species Comments"
        );
        assert_eq!(
            lines.next().unwrap(),
            "Blue Jay,Cyanocitta cristata,1,My Garden,47.3769,8.5417,05/01/2025,08:00,eBird - Stationary Count,60,N,Automated detection (confidence: 90%)"
        );
    }

    #[test]
    fn test_empty_export_still_has_header() {
        let mut buf = Vec::new();
        write_ebird_csv(&mut buf, &[], false).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("Common Name,"));
        assert_eq!(text.lines().count(), 1);
    }

    #[test]
    fn test_write_file_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exports").join("ebird.csv");
        write_ebird_file(&path, &[], false).unwrap();
        assert!(path.exists());
    }
}
