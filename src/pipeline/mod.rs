//! Event transform pipeline: parse → filter → stamp.
//!
//! Pure transformation from raw bucket entries to structured usage events.
//! Nothing here touches storage or the network; failures are precise parse
//! errors so a malformed entry is never silently dropped.

pub mod parse;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::bucket;
use crate::reader::RawEntry;

pub use self::parse::{parse, ParseError};

/// Aggregation granularity of a usage counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
    Eternity,
}

impl Period {
    /// Decodes a period from its key label.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "minute" => Some(Self::Minute),
            "hour" => Some(Self::Hour),
            "day" => Some(Self::Day),
            "week" => Some(Self::Week),
            "month" => Some(Self::Month),
            "year" => Some(Self::Year),
            "eternity" => Some(Self::Eternity),
            _ => None,
        }
    }

    /// Returns the period's key label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
            Self::Eternity => "eternity",
        }
    }

    /// Whether events of this period leave the pipeline.
    ///
    /// Week and eternity counters are derived aggregates the downstream
    /// consumers rebuild themselves.
    pub fn exported(&self) -> bool {
        !matches!(self, Self::Week | Self::Eternity)
    }
}

/// Structured usage event delivered to the stream sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageEvent {
    pub service_id: String,
    pub metric_id: String,
    pub period: Period,
    /// Period start in epoch seconds.
    pub period_start: i64,
    pub value: i64,
    /// Source bucket timestamp (`%Y%m%d %H:%M:%S` UTC). Empty until
    /// [`stamp`] runs; never wall-clock send time.
    pub time_gen: String,
}

/// Drops every event whose period is not exported downstream.
pub fn filter(events: Vec<UsageEvent>) -> Vec<UsageEvent> {
    events.into_iter().filter(|e| e.period.exported()).collect()
}

/// Sets `time_gen` to the source bucket's own timestamp.
///
/// Downstream consumers get a deterministic "when this usage occurred"
/// marker independent of when the export ran.
pub fn stamp(event: &mut UsageEvent, bucket_ts: DateTime<Utc>) {
    event.time_gen = bucket::format_timestamp(bucket_ts);
}

/// Runs the full pipeline over a merged pending range.
///
/// Parses every entry first (failing the whole batch on the first malformed
/// one), then filters, then stamps each survivor with its own source
/// bucket's timestamp. Output order follows the entry key order.
pub fn prepare(entries: &BTreeMap<String, RawEntry>) -> Result<Vec<UsageEvent>, ParseError> {
    let mut parsed = Vec::with_capacity(entries.len());
    for (key, entry) in entries {
        parsed.push((parse(key, &entry.value)?, entry.bucket));
    }

    let mut events = Vec::with_capacity(parsed.len());
    for (mut event, bucket_ts) in parsed {
        if !event.period.exported() {
            continue;
        }
        stamp(&mut event, bucket_ts);
        events.push(event);
    }

    Ok(events)
}
