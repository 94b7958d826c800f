//! Correlation counters.

use serde::Serialize;

/// Snapshot of engine counters.
///
/// A persistently low [`match_rate`](Self::match_rate) while both sources
/// report the same species usually means their clocks disagree by more than
/// the correlation window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CorrelationMetrics {
    /// Visual detections offered to the engine.
    pub visual_received: u64,
    /// Visual detections excluded as background/non-bird.
    pub visual_excluded: u64,
    /// Visual detections settled without an audio match.
    pub visual_expired: u64,
    /// Audio detections offered to the engine.
    pub audio_received: u64,
    /// Audio detections below the minimum confidence.
    pub audio_rejected: u64,
    /// Audio detections that aged out without a match.
    pub audio_expired: u64,
    /// Correlated sightings produced.
    pub matched: u64,
    /// Events that arrived older than their source's watermark.
    pub late_events: u64,
    /// Entries dropped or force-settled because the window was full.
    pub capacity_evictions: u64,
    /// Visual detections currently waiting for their window to close.
    pub pending_visual: u64,
    /// Audio detections currently held in the window.
    pub window_audio: u64,
}

impl CorrelationMetrics {
    /// Fraction of settled visual detections that found an audio match.
    ///
    /// `None` until at least one visual detection has settled.
    pub fn match_rate(&self) -> Option<f64> {
        let settled = self.matched + self.visual_expired;
        #[allow(clippy::cast_precision_loss)]
        (settled > 0).then(|| self.matched as f64 / settled as f64)
    }
}
