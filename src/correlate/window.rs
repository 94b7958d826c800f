//! Time-ordered correlation window.
//!
//! Holds audio candidates and visual detections whose window is still open.
//! A visual detection settles once the audio watermark has moved strictly
//! past `t + W`: from then on no audio event that could fall inside its window
//! can still arrive, so the choice made is the same whatever order the two
//! sources interleaved in.

use super::fusion::FusionPolicy;
use super::metrics::CorrelationMetrics;
use crate::detection::{
    AudioDetection, CorrelatedSighting, VisualDetection, new_id, seconds_between,
};
use crate::species::SpeciesName;
use chrono::{DateTime, TimeDelta, Utc};
use std::cmp::Ordering;
use std::collections::VecDeque;
use tracing::{debug, info, warn};

/// Outcome of settling one visual detection.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// An audio detection confirmed it.
    Matched(CorrelatedSighting),
    /// The window closed without a qualifying audio detection.
    Expired,
}

trait Timed {
    fn timestamp(&self) -> DateTime<Utc>;
}

impl Timed for VisualDetection {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl Timed for AudioDetection {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

#[derive(Debug)]
struct Entry<T> {
    seq: u64,
    name: SpeciesName,
    detection: T,
}

/// Pending visual detections and audio candidates, both ordered by time.
#[derive(Debug)]
pub struct CorrelationWindow {
    window: TimeDelta,
    fusion: FusionPolicy,
    capacity: usize,
    audio: VecDeque<Entry<AudioDetection>>,
    pending: VecDeque<Entry<VisualDetection>>,
    audio_watermark: Option<DateTime<Utc>>,
    visual_watermark: Option<DateTime<Utc>>,
    next_seq: u64,
}

impl CorrelationWindow {
    /// Create an empty window.
    pub fn new(window: TimeDelta, fusion: FusionPolicy, capacity: usize) -> Self {
        Self {
            window,
            fusion,
            capacity: capacity.max(1),
            audio: VecDeque::new(),
            pending: VecDeque::new(),
            audio_watermark: None,
            visual_watermark: None,
            next_seq: 0,
        }
    }

    /// Add an audio candidate and settle every visual detection it closes.
    pub fn push_audio(
        &mut self,
        detection: AudioDetection,
        name: SpeciesName,
        metrics: &mut CorrelationMetrics,
    ) -> Vec<CorrelatedSighting> {
        let ts = detection.timestamp;
        if self.audio_watermark.is_some_and(|wm| ts < wm) {
            metrics.late_events += 1;
            warn!(
                "Audio detection {} at {} is older than the audio watermark",
                detection.id, ts
            );
        }
        self.audio_watermark = self.audio_watermark.max(Some(ts));

        let seq = self.bump_seq();
        insert_sorted(
            &mut self.audio,
            Entry {
                seq,
                name,
                detection,
            },
        );

        if self.audio.len() > self.capacity
            && let Some(dropped) = self.audio.pop_front()
        {
            metrics.capacity_evictions += 1;
            warn!(
                "Audio window full ({} entries), dropping {} ({})",
                self.capacity, dropped.detection.id, dropped.detection.common_name
            );
        }

        let sightings = self.settle_ready(metrics);
        self.evict_expired_audio(metrics);
        self.sync_gauges(metrics);
        sightings
    }

    /// Queue a visual detection and settle whatever is already decidable.
    pub fn push_visual(
        &mut self,
        detection: VisualDetection,
        name: SpeciesName,
        metrics: &mut CorrelationMetrics,
    ) -> Vec<CorrelatedSighting> {
        self.observe_visual(detection.timestamp, metrics);

        let seq = self.bump_seq();
        insert_sorted(
            &mut self.pending,
            Entry {
                seq,
                name,
                detection,
            },
        );

        let mut sightings = Vec::new();
        if self.pending.len() > self.capacity
            && let Some(oldest) = self.pending.pop_front()
        {
            metrics.capacity_evictions += 1;
            warn!(
                "Pending queue full ({} entries), settling {} early",
                self.capacity, oldest.detection.id
            );
            if let Resolution::Matched(sighting) = self.resolve(oldest, metrics) {
                sightings.push(sighting);
            }
        }

        sightings.extend(self.settle_ready(metrics));
        self.evict_expired_audio(metrics);
        self.sync_gauges(metrics);
        sightings
    }

    /// Record a visual event that takes no part in matching.
    ///
    /// It still moves the visual watermark forward, which lets old audio expire.
    pub fn note_visual(&mut self, ts: DateTime<Utc>, metrics: &mut CorrelationMetrics) {
        self.observe_visual(ts, metrics);
        self.evict_expired_audio(metrics);
        self.sync_gauges(metrics);
    }

    /// Declare that neither source will deliver events older than `now`.
    pub fn advance_to(
        &mut self,
        now: DateTime<Utc>,
        metrics: &mut CorrelationMetrics,
    ) -> Vec<CorrelatedSighting> {
        self.audio_watermark = self.audio_watermark.max(Some(now));
        self.visual_watermark = self.visual_watermark.max(Some(now));

        let sightings = self.settle_ready(metrics);
        self.evict_expired_audio(metrics);
        self.sync_gauges(metrics);
        sightings
    }

    /// Settle every pending visual detection with the candidates known now.
    pub fn settle_all(&mut self, metrics: &mut CorrelationMetrics) -> Vec<CorrelatedSighting> {
        let mut sightings = Vec::new();
        while let Some(entry) = self.pending.pop_front() {
            if let Resolution::Matched(sighting) = self.resolve(entry, metrics) {
                sightings.push(sighting);
            }
        }
        self.evict_expired_audio(metrics);
        self.sync_gauges(metrics);
        sightings
    }

    fn observe_visual(&mut self, ts: DateTime<Utc>, metrics: &mut CorrelationMetrics) {
        if self.visual_watermark.is_some_and(|wm| ts < wm) {
            metrics.late_events += 1;
            warn!("Visual detection at {ts} is older than the visual watermark");
        }
        self.visual_watermark = self.visual_watermark.max(Some(ts));
    }

    fn settle_ready(&mut self, metrics: &mut CorrelationMetrics) -> Vec<CorrelatedSighting> {
        let mut sightings = Vec::new();
        while self
            .pending
            .front()
            .is_some_and(|front| self.is_closed(front.detection.timestamp))
        {
            let Some(entry) = self.pending.pop_front() else {
                break;
            };
            if let Resolution::Matched(sighting) = self.resolve(entry, metrics) {
                sightings.push(sighting);
            }
        }
        sightings
    }

    /// Pick the best unclaimed audio candidate for a visual detection.
    ///
    /// Ordering: smallest absolute time gap, then higher audio confidence,
    /// then earlier arrival.
    fn resolve(
        &mut self,
        entry: Entry<VisualDetection>,
        metrics: &mut CorrelationMetrics,
    ) -> Resolution {
        let visual_ts = entry.detection.timestamp;
        let window = self.window;
        let gap = |a: &Entry<AudioDetection>| (a.detection.timestamp - visual_ts).abs();

        let best = self
            .audio
            .iter()
            .enumerate()
            .filter(|(_, a)| gap(a) <= window && entry.name.matches(&a.name))
            .min_by(|(_, x), (_, y)| compare_candidates(gap(x), x, gap(y), y))
            .map(|(idx, _)| idx);

        let Some(audio) = best.and_then(|idx| self.audio.remove(idx)) else {
            metrics.visual_expired += 1;
            debug!(
                "Visual detection {} ({}) expired without audio match",
                entry.detection.id, entry.detection.species
            );
            return Resolution::Expired;
        };

        metrics.matched += 1;
        let sighting = build_sighting(entry.detection, audio.detection, self.fusion);
        info!(
            "Correlated sighting: {} (visual {:.1}%, audio {:.1}%, fused {:.1}%, time_diff {:+.1}s)",
            sighting.common_name,
            sighting.visual_confidence * 100.0,
            sighting.audio_confidence * 100.0,
            sighting.confidence * 100.0,
            sighting.time_diff
        );
        Resolution::Matched(sighting)
    }

    /// Drop audio that no pending or future visual detection can reach.
    fn evict_expired_audio(&mut self, metrics: &mut CorrelationMetrics) {
        let horizon = self
            .pending
            .front()
            .map(|p| p.detection.timestamp)
            .or(self.visual_watermark);
        let Some(horizon) = horizon else {
            return;
        };

        while self
            .audio
            .front()
            .is_some_and(|a| self.window_end(a.detection.timestamp) < horizon)
        {
            if let Some(expired) = self.audio.pop_front() {
                metrics.audio_expired += 1;
                debug!(
                    "Audio detection {} ({}) expired without visual match",
                    expired.detection.id, expired.detection.common_name
                );
            }
        }
    }

    fn is_closed(&self, visual_ts: DateTime<Utc>) -> bool {
        self.audio_watermark
            .is_some_and(|wm| wm > self.window_end(visual_ts))
    }

    fn window_end(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        ts.checked_add_signed(self.window)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    fn sync_gauges(&self, metrics: &mut CorrelationMetrics) {
        metrics.pending_visual = self.pending.len() as u64;
        metrics.window_audio = self.audio.len() as u64;
    }

    fn bump_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }
}

fn insert_sorted<T: Timed>(queue: &mut VecDeque<Entry<T>>, entry: Entry<T>) {
    let ts = entry.detection.timestamp();
    let idx = queue.partition_point(|e| e.detection.timestamp() <= ts);
    queue.insert(idx, entry);
}

fn compare_candidates(
    gap_x: TimeDelta,
    x: &Entry<AudioDetection>,
    gap_y: TimeDelta,
    y: &Entry<AudioDetection>,
) -> Ordering {
    gap_x
        .cmp(&gap_y)
        .then_with(|| y.detection.confidence.total_cmp(&x.detection.confidence))
        .then_with(|| x.seq.cmp(&y.seq))
}

fn build_sighting(
    visual: VisualDetection,
    audio: AudioDetection,
    fusion: FusionPolicy,
) -> CorrelatedSighting {
    CorrelatedSighting {
        id: new_id(),
        time_diff: seconds_between(visual.timestamp, audio.timestamp),
        confidence: fusion.fuse(visual.confidence, audio.confidence),
        visual_confidence: visual.confidence,
        audio_confidence: audio.confidence,
        visual_id: visual.id,
        audio_id: audio.id,
        timestamp: visual.timestamp,
        species: visual.species,
        common_name: audio.common_name,
        scientific_name: audio.scientific_name,
        image_path: visual.image_path,
        audio_path: audio.audio_path,
    }
}
