//! Thread-safe correlation engine.

use super::metrics::CorrelationMetrics;
use super::window::CorrelationWindow;
use crate::config::CorrelationConfig;
use crate::detection::{AudioDetection, CorrelatedSighting, VisualDetection};
use crate::error::{Error, Result};
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

#[derive(Debug)]
struct EngineState {
    window: CorrelationWindow,
    metrics: CorrelationMetrics,
}

/// Matches visual detections with audio detections of the same species.
///
/// Every operation runs its find-and-claim sequence under one lock, so the
/// engine can be shared between the visual and audio producer threads.
/// Visual detections are settled once their window has closed; the
/// sightings each call settles are returned to the caller.
#[derive(Debug)]
pub struct CorrelationEngine {
    audio_min_confidence: f32,
    state: Mutex<EngineState>,
}

impl CorrelationEngine {
    /// Create an engine from validated settings.
    pub fn new(config: &CorrelationConfig) -> Result<Self> {
        crate::config::validate_correlation(config)?;

        #[allow(clippy::cast_possible_truncation)]
        let window = TimeDelta::try_milliseconds((config.window_seconds * 1000.0).round() as i64)
            .ok_or_else(|| Error::ConfigValidation {
                message: format!("window_seconds out of range: {}", config.window_seconds),
            })?;

        Ok(Self {
            audio_min_confidence: config.audio_min_confidence,
            state: Mutex::new(EngineState {
                window: CorrelationWindow::new(window, config.fusion, config.max_window_entries),
                metrics: CorrelationMetrics::default(),
            }),
        })
    }

    /// Offer a visual detection.
    ///
    /// Background/non-bird detections are counted and otherwise ignored.
    /// Returns the sightings settled by this call, which include this
    /// detection's own sighting when its window had already closed.
    pub fn on_visual_detection(&self, detection: VisualDetection) -> Vec<CorrelatedSighting> {
        let name = detection.species_name();
        let mut state = self.lock();
        let EngineState { window, metrics } = &mut *state;
        metrics.visual_received += 1;

        if name.is_background() || name.is_empty() {
            metrics.visual_excluded += 1;
            debug!(
                "Excluding visual detection {} ({}) from correlation",
                detection.id, detection.species
            );
            window.note_visual(detection.timestamp, metrics);
            return Vec::new();
        }

        window.push_visual(detection, name, metrics)
    }

    /// Offer an audio detection.
    ///
    /// Audio below the minimum confidence never enters the window. Anything
    /// else may settle earlier visual detections, retroactively matching them.
    pub fn on_audio_detection(&self, detection: AudioDetection) -> Vec<CorrelatedSighting> {
        let mut state = self.lock();
        let EngineState { window, metrics } = &mut *state;
        metrics.audio_received += 1;

        if detection.confidence < self.audio_min_confidence {
            metrics.audio_rejected += 1;
            debug!(
                "Ignoring audio detection {} ({}) below {:.2} confidence",
                detection.id, detection.common_name, self.audio_min_confidence
            );
            return Vec::new();
        }

        let name = detection.species_name();
        window.push_audio(detection, name, metrics)
    }

    /// Declare that no event older than `now` will arrive from either source.
    ///
    /// Live deployments call this from a wall-clock timer so visual
    /// detections settle even while the audio producer is silent. The
    /// `ingest` replay does not need it: it settles the remainder with
    /// [`Self::flush`] at end of input.
    pub fn advance_to(&self, now: DateTime<Utc>) -> Vec<CorrelatedSighting> {
        let mut state = self.lock();
        let EngineState { window, metrics } = &mut *state;
        window.advance_to(now, metrics)
    }

    /// Settle all pending visual detections with the candidates known now.
    pub fn flush(&self) -> Vec<CorrelatedSighting> {
        let mut state = self.lock();
        let EngineState { window, metrics } = &mut *state;
        window.settle_all(metrics)
    }

    /// Snapshot of the engine counters.
    pub fn metrics(&self) -> CorrelationMetrics {
        self.lock().metrics
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        // State is consistent after every completed operation, so a panic in
        // another holder does not invalidate it.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
