//! Dedicated writer thread feeding a [`DetectionSink`].

use super::{DeadLetter, DetectionSink, RetryPolicy};
use crate::detection::DetectionRecord;
use crate::error::{Error, Result};
use serde::Serialize;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error};

/// Outcome counters of a writer thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriterStats {
    /// Records that produced a new row.
    pub written: u64,
    /// Records already present (or claiming an already used detection).
    pub duplicates: u64,
    /// Records appended to the dead-letter file.
    pub dead_lettered: u64,
    /// Records lost because the dead-letter write failed too.
    pub lost: u64,
}

/// Owns the writer thread; records are handed over through a channel so
/// producers never wait on storage.
#[derive(Debug)]
pub struct SinkWriter {
    sender: Option<mpsc::Sender<DetectionRecord>>,
    worker: Option<JoinHandle<WriterStats>>,
}

impl SinkWriter {
    /// Start the writer thread.
    pub fn spawn(
        sink: Arc<dyn DetectionSink>,
        policy: RetryPolicy,
        dead_letter: DeadLetter,
    ) -> Result<Self> {
        let (sender, receiver) = mpsc::channel::<DetectionRecord>();

        let worker = thread::Builder::new()
            .name("birdfuse-writer".into())
            .spawn(move || drain(&receiver, sink.as_ref(), policy, &dead_letter))?;

        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
        })
    }

    /// Queue a record for storage.
    pub fn send(&self, record: DetectionRecord) -> Result<()> {
        self.sender
            .as_ref()
            .ok_or(Error::WriterChannelClosed)?
            .send(record)
            .map_err(|_| Error::WriterChannelClosed)
    }

    /// Close the channel, wait for queued records, and report the outcome.
    pub fn finish(mut self) -> Result<WriterStats> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<WriterStats> {
        drop(self.sender.take());
        match self.worker.take() {
            Some(handle) => handle.join().map_err(|_| Error::Internal {
                message: "sink writer thread panicked".to_string(),
            }),
            None => Ok(WriterStats::default()),
        }
    }
}

impl Drop for SinkWriter {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!("Failed to stop sink writer: {e}");
        }
    }
}

fn drain(
    receiver: &mpsc::Receiver<DetectionRecord>,
    sink: &dyn DetectionSink,
    policy: RetryPolicy,
    dead_letter: &DeadLetter,
) -> WriterStats {
    let mut stats = WriterStats::default();

    while let Ok(record) = receiver.recv() {
        let what = format!("insert {}", record.kind());
        match policy.run(&what, || sink.insert_record(&record)) {
            Ok(true) => stats.written += 1,
            Ok(false) => {
                stats.duplicates += 1;
                debug!("Skipped duplicate {} record", record.kind());
            }
            Err(cause) => match dead_letter.write(&record, &cause) {
                Ok(()) => stats.dead_lettered += 1,
                Err(e) => {
                    stats.lost += 1;
                    error!("Lost {} record: {cause} (dead-letter failed: {e})", record.kind());
                }
            },
        }
    }

    debug!("Sink writer drained: {stats:?}");
    stats
}
