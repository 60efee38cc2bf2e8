//! HTTP NDJSON stream sink adapter.
//!
//! Serializes a batch as newline-delimited JSON, optionally compresses it,
//! and delivers it in a single POST. Any transport error or non-success
//! status fails the whole call; there is no internal retry or re-batching.

use std::io::Write;

use anyhow::{bail, Context, Result};

use crate::config::SinkConfig;
use crate::pipeline::UsageEvent;

use super::StreamSink;

/// Stream sink delivering one batch per HTTP POST.
pub struct HttpStreamSink {
    cfg: SinkConfig,
    client: reqwest::Client,
}

impl HttpStreamSink {
    /// Creates a sink from configuration.
    pub fn new(cfg: SinkConfig) -> Result<Self> {
        if cfg.endpoint.is_empty() {
            bail!("sink endpoint is required");
        }

        let client = reqwest::Client::builder()
            .timeout(cfg.request_timeout)
            .build()
            .context("building HTTP client")?;

        Ok(Self { cfg, client })
    }
}

impl StreamSink for HttpStreamSink {
    fn name(&self) -> &str {
        "http"
    }

    async fn send_events(&self, events: &[UsageEvent]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        let raw = encode_ndjson(events)?;
        let raw_len = raw.len();

        let body = compress(&raw, &self.cfg.compression).context("compressing NDJSON data")?;

        let mut request = self
            .client
            .post(&self.cfg.endpoint)
            .header("Content-Type", "application/x-ndjson")
            .header("X-Stream-Name", &self.cfg.stream_name)
            .body(body);

        if let Some(encoding) = content_encoding(&self.cfg.compression) {
            request = request.header("Content-Encoding", encoding);
        }

        if !self.cfg.auth_token.is_empty() {
            request = request.header("Authorization", format!("Bearer {}", self.cfg.auth_token));
        }

        let resp = request.send().await.context("sending event batch")?;

        let status = resp.status();
        // Drain body for connection reuse.
        let _ = resp.bytes().await;

        if !status.is_success() {
            bail!("stream sink rejected batch: {status}");
        }

        tracing::debug!(
            events = events.len(),
            bytes = raw_len,
            stream = %self.cfg.stream_name,
            "delivered batch to stream sink",
        );

        Ok(())
    }
}

/// Serializes events as newline-delimited JSON.
fn encode_ndjson(events: &[UsageEvent]) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(events.len() * 128);
    for event in events {
        serde_json::to_writer(&mut buf, event).context("serializing event to JSON")?;
        buf.push(b'\n');
    }
    Ok(buf)
}

/// Compresses data using the configured algorithm.
fn compress(data: &[u8], algorithm: &str) -> Result<Vec<u8>> {
    match algorithm {
        "none" | "" => Ok(data.to_vec()),
        "gzip" => compress_gzip(data),
        other => bail!("unsupported compression: {other}"),
    }
}

/// Returns the Content-Encoding header value for the algorithm.
fn content_encoding(algorithm: &str) -> Option<&'static str> {
    match algorithm {
        "gzip" => Some("gzip"),
        _ => None,
    }
}

fn compress_gzip(data: &[u8]) -> Result<Vec<u8>> {
    use flate2::write::GzEncoder;
    use flate2::Compression;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).context("gzip write")?;
    encoder.finish().context("gzip finish")
}
