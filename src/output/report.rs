//! Text and JSON rendering of stored data for the CLI.

use crate::constants::confidence::DECIMAL_PLACES;
use crate::detection::{CorrelatedSighting, DetectionRecord};
use crate::error::{Error, Result};
use crate::stats::DailyStats;
use serde::Serialize;
use std::fmt::Write;

/// Pretty-printed JSON of any report value.
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|source| Error::JsonSerialize { source })
}

/// Per-day species tables.
pub fn render_stats(days: &[DailyStats]) -> String {
    if days.is_empty() {
        return "No statistics recorded.\n".to_string();
    }

    let mut out = String::new();
    for day in days {
        let _ = writeln!(
            out,
            "{}  visual {}  audio {}  correlated {}",
            day.date,
            day.visual_total(),
            day.audio_total(),
            day.correlated_total()
        );
        let _ = writeln!(
            out,
            "  {:<32} {:>7} {:>7} {:>11}  {:<5}  {:<5}",
            "Species", "Visual", "Audio", "Correlated", "First", "Last"
        );
        for (name, entry) in day.ranked() {
            let _ = writeln!(
                out,
                "  {:<32} {:>7} {:>7} {:>11}  {}  {}",
                name,
                entry.visual_count,
                entry.audio_count,
                entry.correlated_count,
                entry.first_seen.format("%H:%M"),
                entry.last_seen.format("%H:%M")
            );
        }
        let _ = writeln!(out);
    }
    out
}

/// Chronological feed of one day's detections.
pub fn render_feed(records: &[DetectionRecord]) -> String {
    if records.is_empty() {
        return "No detections recorded.\n".to_string();
    }

    let mut out = String::new();
    for record in records {
        let _ = writeln!(
            out,
            "{}  {:<10}  {:<32}  {:.decimal$}",
            record.timestamp().format("%H:%M:%S"),
            record.kind(),
            record.display_name(),
            record.confidence(),
            decimal = DECIMAL_PLACES
        );
    }
    out
}

/// List of correlated sightings.
pub fn render_sightings(sightings: &[CorrelatedSighting]) -> String {
    if sightings.is_empty() {
        return "No correlated sightings.\n".to_string();
    }

    let mut out = String::new();
    for s in sightings {
        let _ = writeln!(
            out,
            "{}  {} ({})  {:.1}%  [visual {:.1}%, audio {:.1}%, {:+.1}s]",
            s.timestamp.format("%Y-%m-%d %H:%M:%S"),
            s.common_name,
            s.scientific_name,
            s.confidence * 100.0,
            s.visual_confidence * 100.0,
            s.audio_confidence * 100.0,
            s.time_diff
        );
    }
    out
}
