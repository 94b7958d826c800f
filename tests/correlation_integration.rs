//! End-to-end tests of the correlation engine, ingest pipeline and store.

#![allow(clippy::unwrap_used, clippy::float_cmp)]

use birdfuse::config::CorrelationConfig;
use birdfuse::correlate::{CorrelationEngine, FusionPolicy};
use birdfuse::detection::{AudioDetection, CorrelatedSighting, VisualDetection};
use birdfuse::pipeline::{EventSource, IngestOptions, ingest};
use birdfuse::store::{DeadLetter, DetectionSink, RetryPolicy, SqliteStore};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

const VISUAL_EVENTS: &str = r#"{"id":"v1","timestamp":"2025-05-01T08:00:00Z","species":"Cyanocitta cristata (Blue Jay)","confidence":0.95}
{"id":"v2","timestamp":"2025-05-01T08:10:00Z","species":"Passer domesticus (House Sparrow)","confidence":0.9}
{"id":"v3","timestamp":"2025-05-01T08:20:00Z","species":"background","confidence":0.99}
not json at all
{"id":"v4","timestamp":"2025-05-01T08:30:00Z","species":"Cyanocitta cristata (Blue Jay)","confidence":0.4}
"#;

const AUDIO_EVENTS: &str = r#"{"id":"a1","timestamp":"2025-05-01T08:00:02Z","common_name":"Blue Jay","scientific_name":"Cyanocitta cristata","confidence":0.78}
{"id":"a2","timestamp":"2025-05-01T09:00:00Z","common_name":"Northern Cardinal","scientific_name":"Cardinalis cardinalis","confidence":0.8}
"#;

fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 1, h, m, s).unwrap()
}

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 5, 1).unwrap()
}

fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

fn visual(id: &str, t: DateTime<Utc>, species: &str, confidence: f32) -> VisualDetection {
    VisualDetection {
        id: id.to_string(),
        timestamp: t,
        species: species.to_string(),
        confidence,
        image_path: None,
    }
}

fn audio(id: &str, t: DateTime<Utc>, common: &str, scientific: &str, confidence: f32) -> AudioDetection {
    AudioDetection {
        id: id.to_string(),
        timestamp: t,
        common_name: common.to_string(),
        scientific_name: scientific.to_string(),
        confidence,
        audio_path: None,
        source: None,
    }
}

fn run_ingest(dir: &TempDir, store: Arc<SqliteStore>) -> birdfuse::pipeline::IngestSummary {
    let engine = CorrelationEngine::new(&CorrelationConfig::default()).unwrap();
    let options = IngestOptions {
        visual: EventSource::File(write(dir, "visual.ndjson", VISUAL_EVENTS)),
        audio: EventSource::File(write(dir, "audio.ndjson", AUDIO_EVENTS)),
        visual_threshold: 0.6,
        audio_threshold: 0.25,
        progress: false,
    };
    ingest(
        &engine,
        store,
        RetryPolicy::default(),
        DeadLetter::new(dir.path().join("failed.jsonl")),
        &options,
    )
    .unwrap()
}

#[test]
fn test_ingest_correlates_and_persists() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(SqliteStore::open(&dir.path().join("birds.db")).unwrap());

    let summary = run_ingest(&dir, store.clone());

    assert_eq!(summary.total_sightings(), 1);
    assert_eq!(summary.visual.invalid, 1);
    assert_eq!(summary.visual.below_threshold, 1);
    assert_eq!(summary.metrics.visual_excluded, 1);
    assert_eq!(summary.writer.dead_lettered, 0);
    assert!(!dir.path().join("failed.jsonl").exists());

    let sightings = store.recent_sightings(10).unwrap();
    assert_eq!(sightings.len(), 1);
    let sighting = &sightings[0];
    assert_eq!(sighting.visual_id, "v1");
    assert_eq!(sighting.audio_id, "a1");
    assert_eq!(sighting.common_name, "Blue Jay");
    assert_eq!(sighting.confidence, 0.95);
    assert_eq!(sighting.time_diff, 2.0);

    let stats = store.stats_for(day()).unwrap();
    assert_eq!(stats["Blue Jay"].visual_count, 1);
    assert_eq!(stats["Blue Jay"].audio_count, 1);
    assert_eq!(stats["Blue Jay"].correlated_count, 1);
    assert_eq!(stats["House Sparrow"].visual_count, 1);
    assert_eq!(stats["Northern Cardinal"].audio_count, 1);
    assert!(!stats.contains_key("background"));

    // background detections are kept as history
    let kinds: Vec<_> = store
        .detections_on(day())
        .unwrap()
        .iter()
        .map(|r| r.kind())
        .collect();
    assert_eq!(kinds.iter().filter(|k| **k == "visual").count(), 3);
}

#[test]
fn test_reingest_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(SqliteStore::open(&dir.path().join("birds.db")).unwrap());

    run_ingest(&dir, store.clone());
    let second = run_ingest(&dir, store.clone());

    assert_eq!(second.writer.written, 0);
    assert!(second.writer.duplicates > 0);
    assert_eq!(store.recent_sightings(10).unwrap().len(), 1);
    assert_eq!(store.stats_for(day()).unwrap()["Blue Jay"].visual_count, 1);
}

fn key(s: &CorrelatedSighting) -> (String, String, String, i64, u32) {
    #[allow(clippy::cast_possible_truncation)]
    let micros = (s.time_diff * 1e6).round() as i64;
    (
        s.visual_id.clone(),
        s.audio_id.clone(),
        s.common_name.clone(),
        micros,
        s.confidence.to_bits(),
    )
}

fn scenario() -> (Vec<VisualDetection>, Vec<AudioDetection>) {
    let visuals = vec![
        visual("v1", at(8, 0, 0), "Cyanocitta cristata (Blue Jay)", 0.9),
        visual("v2", at(8, 0, 10), "Cyanocitta cristata (Blue Jay)", 0.8),
        visual("v3", at(8, 5, 0), "Turdus migratorius (American Robin)", 0.7),
    ];
    let audios = vec![
        audio("a1", at(7, 59, 55), "Blue Jay", "Cyanocitta cristata", 0.6),
        audio("a2", at(8, 0, 12), "Blue Jay", "Cyanocitta cristata", 0.7),
        audio("a3", at(8, 5, 20), "American Robin", "Turdus migratorius", 0.5),
    ];
    (visuals, audios)
}

fn engine(fusion: FusionPolicy) -> CorrelationEngine {
    CorrelationEngine::new(&CorrelationConfig {
        fusion,
        ..CorrelationConfig::default()
    })
    .unwrap()
}

#[test]
fn test_interleaving_does_not_change_results() {
    let (visuals, audios) = scenario();

    let visual_first = engine(FusionPolicy::Mean);
    let mut a = Vec::new();
    for v in visuals.clone() {
        a.extend(visual_first.on_visual_detection(v));
    }
    for x in audios.clone() {
        a.extend(visual_first.on_audio_detection(x));
    }
    a.extend(visual_first.flush());

    let audio_first = engine(FusionPolicy::Mean);
    let mut b = Vec::new();
    for x in audios.clone() {
        b.extend(audio_first.on_audio_detection(x));
    }
    for v in visuals.clone() {
        b.extend(audio_first.on_visual_detection(v));
    }
    b.extend(audio_first.flush());

    let alternating = engine(FusionPolicy::Mean);
    let mut c = Vec::new();
    for (v, x) in visuals.into_iter().zip(audios) {
        c.extend(alternating.on_audio_detection(x));
        c.extend(alternating.on_visual_detection(v));
    }
    c.extend(alternating.flush());

    let keys = |list: &[CorrelatedSighting]| {
        let mut keys: Vec<_> = list.iter().map(key).collect();
        keys.sort();
        keys
    };
    assert_eq!(a.len(), 3);
    assert_eq!(keys(&a), keys(&b));
    assert_eq!(keys(&a), keys(&c));

    for s in &a {
        assert!(s.time_diff.abs() <= 30.0);
    }
}

#[test]
fn test_concurrent_producers_never_share_audio() {
    let engine = Arc::new(engine(FusionPolicy::Max));
    let base = at(8, 0, 0);

    let visuals: Vec<_> = (0..200)
        .map(|i| {
            visual(
                &format!("v{i}"),
                base + chrono::TimeDelta::seconds(i),
                "Cyanocitta cristata (Blue Jay)",
                0.9,
            )
        })
        .collect();
    let audios: Vec<_> = (0..200)
        .map(|i| {
            audio(
                &format!("a{i}"),
                base + chrono::TimeDelta::seconds(i),
                "Blue Jay",
                "Cyanocitta cristata",
                0.8,
            )
        })
        .collect();

    let sightings = std::thread::scope(|scope| {
        let v = scope.spawn(|| {
            visuals
                .into_iter()
                .flat_map(|d| engine.on_visual_detection(d))
                .collect::<Vec<_>>()
        });
        let a = scope.spawn(|| {
            audios
                .into_iter()
                .flat_map(|d| engine.on_audio_detection(d))
                .collect::<Vec<_>>()
        });
        let mut all = v.join().unwrap();
        all.extend(a.join().unwrap());
        all
    });
    let mut all = sightings;
    all.extend(engine.flush());

    let used: HashSet<_> = all.iter().map(|s| s.audio_id.clone()).collect();
    assert_eq!(used.len(), all.len());
    assert_eq!(all.len(), 200);
}

#[test]
fn test_store_rejects_second_use_of_audio() {
    let store = SqliteStore::open_in_memory().unwrap();
    let (visuals, audios) = scenario();
    let engine = engine(FusionPolicy::Max);
    engine.on_audio_detection(audios[1].clone());
    engine.on_visual_detection(visuals[0].clone());
    let mut sighting = engine.flush().pop().unwrap();

    assert!(store.insert_sighting(&sighting).unwrap());
    sighting.id = "another".to_string();
    sighting.visual_id = "v2".to_string();
    assert!(!store.insert_sighting(&sighting).unwrap());
}

#[test]
fn test_wall_clock_settles_while_audio_is_silent() {
    let engine = engine(FusionPolicy::Max);
    let (visuals, audios) = scenario();

    engine.on_audio_detection(audios[0].clone());
    assert!(engine.on_visual_detection(visuals[0].clone()).is_empty());

    // window of v1 still open at 08:00:30
    assert!(engine.advance_to(at(8, 0, 30)).is_empty());

    let settled = engine.advance_to(at(8, 0, 31));
    assert_eq!(settled.len(), 1);
    assert_eq!(settled[0].audio_id, "a1");
    assert!(engine.flush().is_empty());
}
