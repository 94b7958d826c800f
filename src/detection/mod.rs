//! Detection records and the ingest wire format.

mod event;
mod types;

pub use event::{
    RankedSpecies, RawAudioEvent, RawSpecies, RawTimestamp, RawVisualEvent, parse_audio_line,
    parse_timestamp, parse_visual_line,
};
pub use types::{
    AudioDetection, CorrelatedSighting, DetectionRecord, VisualDetection, new_id, seconds_between,
};
