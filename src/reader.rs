//! Pending-range computation over the bucket store.
//!
//! Composes the bucket store and checkpoint tracker into a single answer:
//! which buckets are pending below the trigger instant, and what raw entries
//! do they hold once merged.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::bucket;
use crate::store::{BucketStore, CheckpointTracker};

/// One merged raw entry with the bucket that contributed its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    pub value: String,
    pub bucket: DateTime<Utc>,
}

/// Result of a pending-range read.
///
/// An empty result (no `latest_bucket`) is a valid, successful outcome, not
/// an error.
#[derive(Debug, Default)]
pub struct PendingBuckets {
    /// Most recent bucket in the range; becomes the new checkpoint once the
    /// range is exported.
    pub latest_bucket: Option<DateTime<Utc>>,
    /// Merged raw entries keyed by encoded stats key.
    pub entries: BTreeMap<String, RawEntry>,
}

/// Computes and fetches the range that has not been exported yet.
pub struct BucketReader<'a, S, C> {
    granularity: Duration,
    store: &'a S,
    checkpoint: &'a C,
}

impl<'a, S: BucketStore, C: CheckpointTracker> BucketReader<'a, S, C> {
    pub fn new(granularity: Duration, store: &'a S, checkpoint: &'a C) -> Self {
        Self {
            granularity,
            store,
            checkpoint,
        }
    }

    /// Fetches and merges every bucket in `(checkpoint, end_time]`.
    ///
    /// The latest eligible bucket boundary is derived from `end_time` at the
    /// configured granularity; when it is at or before the checkpoint the
    /// read short-circuits without touching the store. Buckets merge in
    /// increasing time order; on raw-key collision the later bucket's value
    /// overwrites the earlier one, because the upstream accumulator copies
    /// full current counter totals into each bucket it touches.
    pub async fn pending_events_in_buckets(
        &self,
        end_time: DateTime<Utc>,
    ) -> Result<PendingBuckets> {
        let checkpoint = self.checkpoint.get().await?;
        let latest_boundary = bucket::start_of(end_time, self.granularity);

        if let Some(exported) = checkpoint {
            if latest_boundary <= exported {
                debug!(
                    %end_time,
                    checkpoint = %exported,
                    "no bucket boundary past checkpoint",
                );
                return Ok(PendingBuckets::default());
            }
        }

        let buckets = self.store.read_range(checkpoint, end_time).await?;

        let mut pending = PendingBuckets::default();
        for (bucket_ts, entries) in buckets {
            for (key, value) in entries {
                pending.entries.insert(
                    key,
                    RawEntry {
                        value,
                        bucket: bucket_ts,
                    },
                );
            }
            pending.latest_bucket = Some(bucket_ts);
        }

        debug!(
            entries = pending.entries.len(),
            latest_bucket = ?pending.latest_bucket,
            "pending range read",
        );

        Ok(pending)
    }
}
