//! Export job orchestration.
//!
//! One run moves the pending range end to end: read, transform, deliver,
//! advance the checkpoint, delete the exported buckets. Stages run strictly
//! in sequence and the checkpoint only moves after the sink has accepted the
//! whole batch, so an aborted run never loses a range and a rerun never
//! re-reads an exported one. Re-delivery after a send-side failure is
//! accepted; the stream consumers de-duplicate downstream.
//!
//! Mutual exclusion between runs belongs to the scheduling harness; the job
//! holds no lock of its own.

use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::pipeline::{self, ParseError};
use crate::reader::BucketReader;
use crate::sink::StreamSink;
use crate::store::{BucketStore, CheckpointTracker};

/// Identifies the export job class to the scheduling harness.
///
/// The harness registers this value explicitly at startup and uses it to
/// enforce at-most-one-concurrent-run per job class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobDescriptor {
    pub name: &'static str,
    pub queue: &'static str,
}

/// Successful run summary surfaced to the scheduling harness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub events_sent: usize,
}

impl RunReport {
    /// Harness log line for this run.
    pub fn message(&self) -> String {
        format!(
            "{} events have been sent to the stream sink",
            self.events_sent
        )
    }
}

/// Fatal run failures surfaced to the scheduling harness.
///
/// Each variant maps to one failure domain; none is swallowed past the run
/// boundary. Delete failures are not here: cleanup is deferred, not fatal.
#[derive(Error, Debug)]
pub enum ExportError {
    /// Storage read failed; nothing was sent or written.
    #[error("reading pending buckets")]
    Read(#[source] anyhow::Error),

    /// A raw entry could not be decoded. Fatal by design: the retried run
    /// hits the same entry again until the stored data is remediated, which
    /// beats silently dropping usage.
    #[error("parsing raw bucket entry")]
    Parse(#[from] ParseError),

    /// The sink rejected or partially delivered the batch. The checkpoint is
    /// untouched, so a retry is safe but may duplicate downstream delivery.
    #[error("delivering events to the stream sink")]
    Send(#[source] anyhow::Error),

    /// The checkpoint write failed after a successful send: the batch is
    /// already externally visible and the next run will resend the range.
    #[error("advancing checkpoint after a successful send")]
    CheckpointWrite(#[source] anyhow::Error),
}

/// Sequences one export run over injected storage and sink capabilities.
pub struct ExportJob<S, C, K> {
    granularity: Duration,
    store: S,
    checkpoint: C,
    sink: K,
}

impl<S: BucketStore, C: CheckpointTracker, K: StreamSink> ExportJob<S, C, K> {
    pub fn new(granularity: Duration, store: S, checkpoint: C, sink: K) -> Self {
        Self {
            granularity,
            store,
            checkpoint,
            sink,
        }
    }

    /// The descriptor the harness registers for this job class.
    pub const fn descriptor() -> JobDescriptor {
        JobDescriptor {
            name: "usage_export",
            queue: "stats",
        }
    }

    /// Runs one export: buckets at or before `end_time` are eligible.
    ///
    /// A run with nothing pending is a successful no-op that performs no
    /// sink call, checkpoint write, or delete.
    pub async fn run(&self, end_time: DateTime<Utc>) -> Result<RunReport, ExportError> {
        let reader = BucketReader::new(self.granularity, &self.store, &self.checkpoint);

        let pending = reader
            .pending_events_in_buckets(end_time)
            .await
            .map_err(ExportError::Read)?;

        let Some(latest_bucket) = pending.latest_bucket else {
            info!(%end_time, "no pending buckets");
            return Ok(RunReport { events_sent: 0 });
        };

        // A range whose events are all filtered out still advances the
        // checkpoint below, so it is not re-read forever.
        let events = pipeline::prepare(&pending.entries)?;

        self.sink
            .send_events(&events)
            .await
            .map_err(ExportError::Send)?;

        if let Err(e) = self.checkpoint.set(latest_bucket).await {
            error!(
                bucket = %latest_bucket,
                sink = self.sink.name(),
                error = %e,
                "checkpoint write failed after a successful send; \
                 the range will be re-exported (duplicate delivery risk)",
            );
            return Err(ExportError::CheckpointWrite(e));
        }

        // The checkpoint already blocks reprocessing, so a failed delete is
        // retried implicitly by a later run.
        if let Err(e) = self.store.delete_range(latest_bucket).await {
            warn!(
                bucket = %latest_bucket,
                error = %e,
                "deleting exported buckets failed; deferring cleanup",
            );
        }

        let report = RunReport {
            events_sent: events.len(),
        };

        info!(
            events = report.events_sent,
            latest_bucket = %latest_bucket,
            sink = self.sink.name(),
            "export run finished",
        );

        Ok(report)
    }
}

/// Converts the harness's string trigger parameter into a typed UTC instant.
///
/// The trigger crosses the job queue as an RFC 3339 string; it becomes typed
/// here at the boundary and stays typed everywhere else.
pub fn parse_end_time(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc))
}
