//! Bucket store and checkpoint tracker contracts.
//!
//! The export pipeline reads bucket ranges and deletes exported ranges; it
//! never creates buckets. Bucket creation belongs to the external writer
//! that accumulates usage counters.

pub mod memory;
pub mod redis;

use std::collections::BTreeMap;
use std::future::Future;

use anyhow::Result;
use chrono::{DateTime, Utc};

/// Raw counter entries of a single bucket, keyed by encoded stats key.
pub type BucketEntries = BTreeMap<String, String>;

/// Durable store of raw per-bucket counters.
pub trait BucketStore: Send + Sync {
    /// Returns existing buckets in `(from_exclusive, to_inclusive]` with
    /// their raw entries, in increasing time order.
    fn read_range(
        &self,
        from_exclusive: Option<DateTime<Utc>>,
        to_inclusive: DateTime<Utc>,
    ) -> impl Future<Output = Result<BTreeMap<DateTime<Utc>, BucketEntries>>> + Send;

    /// Deletes every bucket at or before `up_to_inclusive`.
    ///
    /// Idempotent: deleting an empty or already-deleted range succeeds
    /// trivially.
    fn delete_range(&self, up_to_inclusive: DateTime<Utc>)
        -> impl Future<Output = Result<()>> + Send;

    /// Writes one raw entry into a bucket, registering the bucket if needed.
    ///
    /// Mirrors the external writer's copy-current-value semantics so
    /// substitutes and tests can seed data; an existing entry is overwritten
    /// with the newer total.
    fn record(
        &self,
        bucket: DateTime<Utc>,
        key: &str,
        value: &str,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// Persists the single "latest exported bucket" marker.
pub trait CheckpointTracker: Send + Sync {
    /// Returns the latest exported bucket, if any run has completed.
    fn get(&self) -> impl Future<Output = Result<Option<DateTime<Utc>>>> + Send;

    /// Records `ts` as the latest exported bucket in a single write.
    ///
    /// The orchestrator only calls this with non-decreasing values;
    /// implementations still refuse a regression.
    fn set(&self, ts: DateTime<Utc>) -> impl Future<Output = Result<()>> + Send;
}
