//! In-process bucket store and checkpoint tracker.
//!
//! Used by tests and substitute deployments. Clones share the same
//! underlying state, so a caller can keep a handle for inspection after
//! moving a clone into the export job.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::{BucketEntries, BucketStore, CheckpointTracker};

/// Bucket store backed by an in-memory ordered map.
#[derive(Debug, Clone, Default)]
pub struct MemoryBucketStore {
    buckets: Arc<Mutex<BTreeMap<DateTime<Utc>, BucketEntries>>>,
}

impl MemoryBucketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of buckets currently stored.
    pub fn bucket_count(&self) -> usize {
        self.buckets.lock().len()
    }

    /// Whether a bucket with the given start instant exists.
    pub fn contains_bucket(&self, bucket: DateTime<Utc>) -> bool {
        self.buckets.lock().contains_key(&bucket)
    }
}

impl BucketStore for MemoryBucketStore {
    async fn read_range(
        &self,
        from_exclusive: Option<DateTime<Utc>>,
        to_inclusive: DateTime<Utc>,
    ) -> Result<BTreeMap<DateTime<Utc>, BucketEntries>> {
        let buckets = self.buckets.lock();

        let range = buckets
            .range(..=to_inclusive)
            .filter(|(ts, _)| from_exclusive.map_or(true, |from| **ts > from))
            .map(|(ts, entries)| (*ts, entries.clone()))
            .collect();

        Ok(range)
    }

    async fn delete_range(&self, up_to_inclusive: DateTime<Utc>) -> Result<()> {
        self.buckets.lock().retain(|ts, _| *ts > up_to_inclusive);
        Ok(())
    }

    async fn record(&self, bucket: DateTime<Utc>, key: &str, value: &str) -> Result<()> {
        self.buckets
            .lock()
            .entry(bucket)
            .or_default()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Checkpoint tracker backed by a shared cell.
#[derive(Debug, Clone, Default)]
pub struct MemoryCheckpoint {
    latest: Arc<Mutex<Option<DateTime<Utc>>>>,
}

impl MemoryCheckpoint {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckpointTracker for MemoryCheckpoint {
    async fn get(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(*self.latest.lock())
    }

    async fn set(&self, ts: DateTime<Utc>) -> Result<()> {
        let mut latest = self.latest.lock();

        if let Some(current) = *latest {
            if ts < current {
                bail!("checkpoint regression: {ts} is older than {current}");
            }
        }

        *latest = Some(ts);
        Ok(())
    }
}
