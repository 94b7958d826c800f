//! Replay of visual and audio event streams through the correlation engine.
//!
//! Each source is read on its own thread, the way the two producers publish
//! independently in a live deployment. Raw detections and settled sightings
//! are handed to the sink writer thread; the engine never waits on storage.

use crate::correlate::{CorrelationEngine, CorrelationMetrics};
use crate::detection::{DetectionRecord, parse_audio_line, parse_visual_line};
use crate::error::{Error, Result};
use crate::output::progress;
use crate::store::{DeadLetter, DetectionSink, RetryPolicy, SinkWriter, WriterStats};
use indicatif::{MultiProgress, ProgressBar};
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Where an event stream is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventSource {
    /// Standard input.
    Stdin,
    /// A newline-delimited JSON file.
    File(PathBuf),
}

impl EventSource {
    /// Interpret a command-line path; `-` means standard input.
    pub fn from_arg(path: &Path) -> Self {
        if path.as_os_str() == "-" {
            Self::Stdin
        } else {
            Self::File(path.to_path_buf())
        }
    }

    fn open(&self) -> Result<Box<dyn BufRead>> {
        match self {
            Self::Stdin => Ok(Box::new(std::io::stdin().lock())),
            Self::File(path) => {
                let file = File::open(path).map_err(|source| Error::EventStreamOpen {
                    path: path.clone(),
                    source,
                })?;
                Ok(Box::new(BufReader::new(file)))
            }
        }
    }
}

impl std::fmt::Display for EventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdin => write!(f, "<stdin>"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Inputs of one ingest run.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Visual event stream.
    pub visual: EventSource,
    /// Audio event stream.
    pub audio: EventSource,
    /// Visual events below this confidence are dropped.
    pub visual_threshold: f32,
    /// Audio events below this confidence are dropped.
    pub audio_threshold: f32,
    /// Show progress spinners.
    pub progress: bool,
}

/// Per-stream counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StreamSummary {
    /// Non-empty lines read.
    pub lines: u64,
    /// Events handed to the engine.
    pub accepted: u64,
    /// Lines rejected as malformed.
    pub invalid: u64,
    /// Events under the stream's confidence threshold.
    pub below_threshold: u64,
    /// Sightings settled while handling this stream.
    pub sightings: u64,
}

/// Outcome of an ingest run.
#[derive(Debug, Clone, Serialize)]
pub struct IngestSummary {
    /// Visual stream counters.
    pub visual: StreamSummary,
    /// Audio stream counters.
    pub audio: StreamSummary,
    /// Sightings settled by the final flush.
    pub flushed_sightings: u64,
    /// Engine counters at the end of the run.
    pub metrics: CorrelationMetrics,
    /// Storage outcome.
    pub writer: WriterStats,
    /// Wall-clock duration in seconds.
    pub elapsed_secs: f64,
}

impl IngestSummary {
    /// All sightings produced in this run.
    pub fn total_sightings(&self) -> u64 {
        self.visual.sightings + self.audio.sightings + self.flushed_sightings
    }
}

/// Feed both streams through `engine` and persist everything into `sink`.
pub fn ingest(
    engine: &CorrelationEngine,
    sink: Arc<dyn DetectionSink>,
    retry: RetryPolicy,
    dead_letter: DeadLetter,
    options: &IngestOptions,
) -> Result<IngestSummary> {
    if options.visual == EventSource::Stdin && options.audio == EventSource::Stdin {
        return Err(Error::InvalidArgument {
            message: "visual and audio streams cannot both read standard input".to_string(),
        });
    }

    let start = Instant::now();
    info!(
        "Ingesting visual events from {} and audio events from {}",
        options.visual, options.audio
    );

    let writer = SinkWriter::spawn(sink, retry, dead_letter)?;
    let multi = MultiProgress::new();
    let visual_pb = progress::create_stream_progress(&multi, "visual", options.progress);
    let audio_pb = progress::create_stream_progress(&multi, "audio", options.progress);

    let (visual, audio) = std::thread::scope(|scope| {
        let visual = scope.spawn(|| {
            read_visual(
                &options.visual,
                options.visual_threshold,
                engine,
                &writer,
                visual_pb.as_ref(),
            )
        });
        let audio = scope.spawn(|| {
            read_audio(
                &options.audio,
                options.audio_threshold,
                engine,
                &writer,
                audio_pb.as_ref(),
            )
        });
        (join_stream(visual), join_stream(audio))
    });

    progress::finish_progress(visual_pb.as_ref(), "done");
    progress::finish_progress(audio_pb.as_ref(), "done");

    let (visual, audio) = (visual?, audio?);

    let flushed = engine.flush();
    let flushed_sightings = flushed.len() as u64;
    for sighting in flushed {
        writer.send(DetectionRecord::Correlated(sighting))?;
    }

    let writer_stats = writer.finish()?;
    let summary = IngestSummary {
        visual,
        audio,
        flushed_sightings,
        metrics: engine.metrics(),
        writer: writer_stats,
        elapsed_secs: start.elapsed().as_secs_f64(),
    };

    log_summary(&summary);
    Ok(summary)
}

fn join_stream(
    handle: std::thread::ScopedJoinHandle<'_, Result<StreamSummary>>,
) -> Result<StreamSummary> {
    handle.join().map_err(|_| Error::Internal {
        message: "event reader thread panicked".to_string(),
    })?
}

fn read_visual(
    source: &EventSource,
    threshold: f32,
    engine: &CorrelationEngine,
    writer: &SinkWriter,
    pb: Option<&ProgressBar>,
) -> Result<StreamSummary> {
    let mut summary = StreamSummary::default();
    let reader = source.open()?;

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        summary.lines += 1;
        progress::inc_progress(pb);

        let detection = match parse_visual_line(&line) {
            Ok(detection) => detection,
            Err(e) => {
                summary.invalid += 1;
                warn!("{source} line {}: {e}", idx + 1);
                continue;
            }
        };

        if detection.confidence < threshold {
            summary.below_threshold += 1;
            debug!(
                "Dropping visual detection {} at {:.1}% (threshold {:.1}%)",
                detection.id,
                detection.confidence * 100.0,
                threshold * 100.0
            );
            continue;
        }

        summary.accepted += 1;
        writer.send(DetectionRecord::Visual(detection.clone()))?;
        for sighting in engine.on_visual_detection(detection) {
            summary.sightings += 1;
            writer.send(DetectionRecord::Correlated(sighting))?;
        }
    }

    Ok(summary)
}

fn read_audio(
    source: &EventSource,
    threshold: f32,
    engine: &CorrelationEngine,
    writer: &SinkWriter,
    pb: Option<&ProgressBar>,
) -> Result<StreamSummary> {
    let mut summary = StreamSummary::default();
    let reader = source.open()?;

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        summary.lines += 1;
        progress::inc_progress(pb);

        let detection = match parse_audio_line(&line) {
            Ok(detection) => detection,
            Err(e) => {
                summary.invalid += 1;
                warn!("{source} line {}: {e}", idx + 1);
                continue;
            }
        };

        if detection.confidence < threshold {
            summary.below_threshold += 1;
            debug!(
                "Dropping audio detection {} at {:.1}% (threshold {:.1}%)",
                detection.id,
                detection.confidence * 100.0,
                threshold * 100.0
            );
            continue;
        }

        summary.accepted += 1;
        writer.send(DetectionRecord::Audio(detection.clone()))?;
        for sighting in engine.on_audio_detection(detection) {
            summary.sightings += 1;
            writer.send(DetectionRecord::Correlated(sighting))?;
        }
    }

    Ok(summary)
}

fn log_summary(summary: &IngestSummary) {
    let metrics = &summary.metrics;
    info!(
        "Read {} visual and {} audio events ({} invalid, {} below threshold)",
        summary.visual.lines,
        summary.audio.lines,
        summary.visual.invalid + summary.audio.invalid,
        summary.visual.below_threshold + summary.audio.below_threshold
    );
    info!(
        "Correlated {} sightings; {} visual expired, {} audio expired, {} audio rejected, {} background excluded",
        summary.total_sightings(),
        metrics.visual_expired,
        metrics.audio_expired,
        metrics.audio_rejected,
        metrics.visual_excluded
    );
    match metrics.match_rate() {
        Some(rate) => info!("Match rate: {:.1}%", rate * 100.0),
        None => info!("Match rate: n/a (no settled visual detections)"),
    }
    if metrics.late_events > 0 {
        warn!(
            "{} events arrived out of order; check producer clocks",
            metrics.late_events
        );
    }
    if summary.writer.dead_lettered > 0 || summary.writer.lost > 0 {
        warn!(
            "{} records dead-lettered, {} lost",
            summary.writer.dead_lettered, summary.writer.lost
        );
    }
    info!(
        "Stored {} new rows ({} duplicates) in {}",
        summary.writer.written,
        summary.writer.duplicates,
        progress::format_duration(summary.elapsed_secs)
    );
}
