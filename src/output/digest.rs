//! Plain-text daily digest.

use crate::constants::report::DIGEST_WIDTH;
use crate::detection::DetectionRecord;
use crate::stats::{DailyStats, StatUpdate};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::fmt::Write;

/// Render the digest of one day.
///
/// `records` are the day's stored detections; they supply the best
/// confidence per species, which the rollup does not keep.
pub fn render_digest(date: NaiveDate, stats: &DailyStats, records: &[DetectionRecord]) -> String {
    let rule = "=".repeat(DIGEST_WIDTH);
    let mut out = String::new();

    let _ = writeln!(out, "{rule}");
    let _ = writeln!(
        out,
        "   BIRD WATCHER DAILY DIGEST - {}",
        date.format("%A, %B %d, %Y")
    );
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out);

    if stats.species.is_empty() {
        let _ = writeln!(out, "No bird sightings recorded on this day.");
        return out;
    }

    let mut best: HashMap<String, f32> = HashMap::new();
    for record in records {
        if let Some(update) = StatUpdate::for_record(record) {
            let entry = best.entry(update.species).or_insert(0.0);
            *entry = entry.max(record.confidence());
        }
    }

    let total: u64 = stats.species.values().map(|s| s.total()).sum();
    let _ = writeln!(out, "SUMMARY");
    let _ = writeln!(out, "   Total Sightings:     {total}");
    let _ = writeln!(out, "   Unique Species:      {}", stats.species.len());
    let _ = writeln!(out, "   High Confidence:     {}", stats.correlated_total());
    let _ = writeln!(out);
    let _ = writeln!(out, "SPECIES BREAKDOWN");
    let _ = writeln!(out);

    for (rank, (name, entry)) in stats.ranked().into_iter().enumerate() {
        let _ = writeln!(out, "{}. {name}", rank + 1);
        let confidence = best
            .get(name)
            .map_or_else(|| "N/A".to_string(), |c| format!("{:.0}%", c * 100.0));
        let _ = writeln!(
            out,
            "   Sightings: {}  |  Confirmed: {}  |  Best confidence: {confidence}",
            entry.total(),
            entry.correlated_count
        );
        let _ = writeln!(
            out,
            "   First seen: {}  |  Last seen: {}",
            entry.first_seen.format("%H:%M"),
            entry.last_seen.format("%H:%M")
        );
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "{rule}");
    out
}
