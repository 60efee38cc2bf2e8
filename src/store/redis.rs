//! Redis-backed bucket store and checkpoint tracker.
//!
//! Layout mirrors the upstream writer:
//!
//! - `<prefix>:buckets` — sorted set; member and score are both the bucket's
//!   start in epoch seconds.
//! - `<prefix>:bucket:<epoch>` — hash of raw stats key to raw value.
//! - `<prefix>:checkpoint` — epoch seconds of the latest exported bucket.

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::BTreeMap;

use crate::config::StorageConfig;

use super::{BucketEntries, BucketStore, CheckpointTracker};

/// Bucket store over a Redis connection.
#[derive(Clone)]
pub struct RedisBucketStore {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisBucketStore {
    /// Opens a connection and verifies connectivity with a ping.
    pub async fn connect(cfg: &StorageConfig) -> Result<Self> {
        let conn = open_connection(cfg).await?;
        Ok(Self::from_connection(conn, &cfg.key_prefix))
    }

    /// Wraps an existing connection, sharing it with other adapters.
    pub fn from_connection(conn: ConnectionManager, prefix: &str) -> Self {
        Self {
            conn,
            prefix: prefix.to_string(),
        }
    }

    fn buckets_key(&self) -> String {
        buckets_key(&self.prefix)
    }

    fn bucket_key(&self, epoch: i64) -> String {
        bucket_key(&self.prefix, epoch)
    }

    async fn bucket_epochs_up_to(&self, up_to_inclusive: DateTime<Utc>) -> Result<Vec<i64>> {
        let mut conn = self.conn.clone();
        conn.zrangebyscore(self.buckets_key(), "-inf", up_to_inclusive.timestamp())
            .await
            .context("listing buckets")
    }
}

impl BucketStore for RedisBucketStore {
    async fn read_range(
        &self,
        from_exclusive: Option<DateTime<Utc>>,
        to_inclusive: DateTime<Utc>,
    ) -> Result<BTreeMap<DateTime<Utc>, BucketEntries>> {
        let mut conn = self.conn.clone();

        let min = match from_exclusive {
            Some(from) => format!("({}", from.timestamp()),
            None => "-inf".to_string(),
        };

        let epochs: Vec<i64> = conn
            .zrangebyscore(self.buckets_key(), min, to_inclusive.timestamp())
            .await
            .context("listing pending buckets")?;

        let mut out = BTreeMap::new();
        for epoch in epochs {
            let entries: BucketEntries = conn
                .hgetall(self.bucket_key(epoch))
                .await
                .with_context(|| format!("reading bucket {epoch}"))?;

            let ts = DateTime::from_timestamp(epoch, 0)
                .ok_or_else(|| anyhow!("invalid bucket timestamp {epoch}"))?;

            out.insert(ts, entries);
        }

        Ok(out)
    }

    async fn delete_range(&self, up_to_inclusive: DateTime<Utc>) -> Result<()> {
        let epochs = self.bucket_epochs_up_to(up_to_inclusive).await?;

        let mut conn = self.conn.clone();
        for epoch in &epochs {
            let _: () = conn
                .del(self.bucket_key(*epoch))
                .await
                .with_context(|| format!("deleting bucket {epoch}"))?;
        }

        let _: () = conn
            .zrembyscore(self.buckets_key(), "-inf", up_to_inclusive.timestamp())
            .await
            .context("unregistering exported buckets")?;

        Ok(())
    }

    async fn record(&self, bucket: DateTime<Utc>, key: &str, value: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let epoch = bucket.timestamp();

        let _: () = conn
            .zadd(self.buckets_key(), epoch, epoch)
            .await
            .context("registering bucket")?;

        let _: () = conn
            .hset(self.bucket_key(epoch), key, value)
            .await
            .with_context(|| format!("writing entry into bucket {epoch}"))?;

        Ok(())
    }
}

/// Checkpoint tracker over a Redis connection.
#[derive(Clone)]
pub struct RedisCheckpoint {
    conn: ConnectionManager,
    key: String,
}

impl RedisCheckpoint {
    /// Opens a connection and verifies connectivity with a ping.
    pub async fn connect(cfg: &StorageConfig) -> Result<Self> {
        let conn = open_connection(cfg).await?;
        Ok(Self::from_connection(conn, &cfg.key_prefix))
    }

    /// Wraps an existing connection, sharing it with other adapters.
    pub fn from_connection(conn: ConnectionManager, prefix: &str) -> Self {
        Self {
            conn,
            key: checkpoint_key(prefix),
        }
    }
}

impl CheckpointTracker for RedisCheckpoint {
    async fn get(&self) -> Result<Option<DateTime<Utc>>> {
        let mut conn = self.conn.clone();

        let epoch: Option<i64> = conn.get(&self.key).await.context("reading checkpoint")?;

        match epoch {
            None => Ok(None),
            Some(epoch) => DateTime::from_timestamp(epoch, 0)
                .map(Some)
                .ok_or_else(|| anyhow!("invalid checkpoint timestamp {epoch}")),
        }
    }

    // The marker itself is one SET. The regression check reads first, which
    // is racy in general but sufficient here: the scheduling harness
    // guarantees at most one concurrent run, so this writer is the only one.
    async fn set(&self, ts: DateTime<Utc>) -> Result<()> {
        let mut conn = self.conn.clone();

        let current: Option<i64> = conn.get(&self.key).await.context("reading checkpoint")?;
        if let Some(current) = current {
            if ts.timestamp() < current {
                bail!(
                    "checkpoint regression: {} is older than stored {current}",
                    ts.timestamp()
                );
            }
        }

        let _: () = conn
            .set(&self.key, ts.timestamp())
            .await
            .context("writing checkpoint")?;

        Ok(())
    }
}

fn buckets_key(prefix: &str) -> String {
    format!("{prefix}:buckets")
}

fn bucket_key(prefix: &str, epoch: i64) -> String {
    format!("{prefix}:bucket:{epoch}")
}

fn checkpoint_key(prefix: &str) -> String {
    format!("{prefix}:checkpoint")
}

/// Opens a managed connection from storage configuration.
async fn open_connection(cfg: &StorageConfig) -> Result<ConnectionManager> {
    let client = redis::Client::open(cfg.url.as_str())
        .with_context(|| format!("parsing storage url {}", cfg.url))?;

    let mut conn = ConnectionManager::new(client)
        .await
        .context("connecting to bucket storage")?;

    redis::cmd("PING")
        .query_async::<_, ()>(&mut conn)
        .await
        .context("pinging bucket storage")?;

    tracing::info!(url = %cfg.url, prefix = %cfg.key_prefix, "bucket storage connected");

    Ok(conn)
}
