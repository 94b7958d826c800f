//! Event ingestion pipeline.

mod ingest;

pub use ingest::{EventSource, IngestOptions, IngestSummary, StreamSummary, ingest};
