use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

/// Top-level configuration for the export pipeline.
///
/// Injected by the embedding service; the pipeline itself treats every
/// value as opaque wiring.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Usage bucket granularity. Default: 60s.
    #[serde(default = "default_granularity", with = "humantime_serde")]
    pub bucket_granularity: Duration,

    /// Bucket storage connection.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Stream sink destination.
    #[serde(default)]
    pub sink: SinkConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bucket_granularity: default_granularity(),
            storage: StorageConfig::default(),
            sink: SinkConfig::default(),
        }
    }
}

/// Bucket storage connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Storage URL (e.g., "redis://localhost:6379").
    #[serde(default)]
    pub url: String,

    /// Key namespace for bucket and checkpoint keys. Default: "stats".
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            key_prefix: default_key_prefix(),
        }
    }
}

/// Stream sink destination configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SinkConfig {
    /// Stream endpoint to POST event batches to.
    #[serde(default)]
    pub endpoint: String,

    /// Destination stream name.
    #[serde(default)]
    pub stream_name: String,

    /// Bearer token attached to each delivery. Empty disables auth.
    #[serde(default)]
    pub auth_token: String,

    /// Request timeout. Default: 10s.
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Payload compression ("none" or "gzip"). Default: "none".
    #[serde(default = "default_compression")]
    pub compression: String,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            stream_name: String::new(),
            auth_token: String::new(),
            request_timeout: default_request_timeout(),
            compression: default_compression(),
        }
    }
}

impl Config {
    /// Loads and validates configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;

        let cfg: Config = serde_yaml::from_str(&data)
            .with_context(|| format!("parsing config file {}", path.display()))?;

        cfg.validate()?;

        Ok(cfg)
    }

    /// Validates the configuration for required fields and consistency.
    pub fn validate(&self) -> Result<()> {
        if self.bucket_granularity.is_zero() {
            bail!("bucket_granularity must be positive");
        }

        if self.storage.url.is_empty() {
            bail!("storage.url is required");
        }

        if self.sink.endpoint.is_empty() {
            bail!("sink.endpoint is required");
        }

        if self.sink.stream_name.is_empty() {
            bail!("sink.stream_name is required");
        }

        match self.sink.compression.as_str() {
            "none" | "gzip" => {}
            other => bail!("unsupported sink.compression: {other}"),
        }

        Ok(())
    }
}

fn default_granularity() -> Duration {
    Duration::from_secs(60)
}

fn default_key_prefix() -> String {
    "stats".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_compression() -> String {
    "none".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_yaml() -> &'static str {
        r#"
bucket_granularity: 30s
storage:
  url: redis://localhost:6379
sink:
  endpoint: https://stream.example.com/v1/records
  stream_name: backend_usage
"#
    }

    #[test]
    fn test_parse_with_defaults() {
        let cfg: Config = serde_yaml::from_str(valid_yaml()).expect("parse");

        assert_eq!(cfg.bucket_granularity, Duration::from_secs(30));
        assert_eq!(cfg.storage.key_prefix, "stats");
        assert_eq!(cfg.sink.request_timeout, Duration::from_secs(10));
        assert_eq!(cfg.sink.compression, "none");
        assert!(cfg.sink.auth_token.is_empty());

        cfg.validate().expect("valid");
    }

    #[test]
    fn test_validate_requires_storage_url() {
        let mut cfg: Config = serde_yaml::from_str(valid_yaml()).expect("parse");
        cfg.storage.url.clear();

        let err = cfg.validate().expect_err("should fail");
        assert!(err.to_string().contains("storage.url"));
    }

    #[test]
    fn test_validate_requires_sink_endpoint_and_stream() {
        let mut cfg: Config = serde_yaml::from_str(valid_yaml()).expect("parse");
        cfg.sink.endpoint.clear();
        assert!(cfg.validate().is_err());

        let mut cfg: Config = serde_yaml::from_str(valid_yaml()).expect("parse");
        cfg.sink.stream_name.clear();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_granularity() {
        let mut cfg: Config = serde_yaml::from_str(valid_yaml()).expect("parse");
        cfg.bucket_granularity = Duration::ZERO;

        let err = cfg.validate().expect_err("should fail");
        assert!(err.to_string().contains("bucket_granularity"));
    }

    #[test]
    fn test_validate_rejects_unknown_compression() {
        let mut cfg: Config = serde_yaml::from_str(valid_yaml()).expect("parse");
        cfg.sink.compression = "brotli".to_string();

        let err = cfg.validate().expect_err("should fail");
        assert!(err.to_string().contains("compression"));
    }

    #[test]
    fn test_gzip_compression_accepted() {
        let mut cfg: Config = serde_yaml::from_str(valid_yaml()).expect("parse");
        cfg.sink.compression = "gzip".to_string();
        cfg.validate().expect("valid");
    }
}
