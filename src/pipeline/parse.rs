//! Raw bucket entry parsing.
//!
//! Decodes encoded stats keys and counter values into typed [`UsageEvent`]s.
//! Keys follow the upstream writer's encoding
//! `stats/{service:<id>}/metric:<id>/<period>:<start>`, where `<start>` is
//! the period start in epoch seconds and the `eternity` period carries no
//! start segment at all.

use thiserror::Error;

use super::{Period, UsageEvent};

/// Errors raised while decoding a raw bucket entry.
///
/// Every variant is fatal for the run: a malformed entry recurs on retry
/// until the stored data is remediated, which is preferred over dropping it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("key missing stats prefix: {key}")]
    MissingPrefix { key: String },

    #[error("malformed service segment in key: {key}")]
    MalformedService { key: String },

    #[error("malformed metric segment in key: {key}")]
    MalformedMetric { key: String },

    #[error("unknown period {period:?} in key: {key}")]
    UnknownPeriod { key: String, period: String },

    #[error("malformed period start {start:?} in key: {key}")]
    MalformedPeriodStart { key: String, start: String },

    #[error("non-numeric value {value:?} for key: {key}")]
    NonNumericValue { key: String, value: String },
}

/// Decodes one raw bucket entry into a [`UsageEvent`].
///
/// `time_gen` is left empty; the stamp step fills it from the source bucket.
pub fn parse(raw_key: &str, raw_value: &str) -> Result<UsageEvent, ParseError> {
    let rest = raw_key
        .strip_prefix("stats/")
        .ok_or_else(|| ParseError::MissingPrefix {
            key: raw_key.to_string(),
        })?;

    let rest = rest
        .strip_prefix("{service:")
        .ok_or_else(|| ParseError::MalformedService {
            key: raw_key.to_string(),
        })?;

    let (service_id, rest) =
        rest.split_once("}/")
            .ok_or_else(|| ParseError::MalformedService {
                key: raw_key.to_string(),
            })?;

    if service_id.is_empty() {
        return Err(ParseError::MalformedService {
            key: raw_key.to_string(),
        });
    }

    let rest = rest
        .strip_prefix("metric:")
        .ok_or_else(|| ParseError::MalformedMetric {
            key: raw_key.to_string(),
        })?;

    let (metric_id, period_segment) =
        rest.split_once('/')
            .ok_or_else(|| ParseError::MalformedMetric {
                key: raw_key.to_string(),
            })?;

    if metric_id.is_empty() {
        return Err(ParseError::MalformedMetric {
            key: raw_key.to_string(),
        });
    }

    let (period_label, start) = match period_segment.split_once(':') {
        Some((label, start)) => (label, Some(start)),
        None => (period_segment, None),
    };

    let period = Period::from_label(period_label).ok_or_else(|| ParseError::UnknownPeriod {
        key: raw_key.to_string(),
        period: period_label.to_string(),
    })?;

    let period_start = parse_period_start(raw_key, period, start)?;

    let value = raw_value
        .parse::<i64>()
        .map_err(|_| ParseError::NonNumericValue {
            key: raw_key.to_string(),
            value: raw_value.to_string(),
        })?;

    Ok(UsageEvent {
        service_id: service_id.to_string(),
        metric_id: metric_id.to_string(),
        period,
        period_start,
        value,
        time_gen: String::new(),
    })
}

/// Decodes the period start segment.
///
/// Eternity keys carry no start and map to 0; every other period requires a
/// decimal epoch-seconds start. An eternity key with a start segment is
/// rejected rather than guessed at.
fn parse_period_start(
    raw_key: &str,
    period: Period,
    start: Option<&str>,
) -> Result<i64, ParseError> {
    match (period, start) {
        (Period::Eternity, None) => Ok(0),
        (_, Some(start)) if period != Period::Eternity => {
            start
                .parse::<i64>()
                .map_err(|_| ParseError::MalformedPeriodStart {
                    key: raw_key.to_string(),
                    start: start.to_string(),
                })
        }
        (_, start) => Err(ParseError::MalformedPeriodStart {
            key: raw_key.to_string(),
            start: start.unwrap_or_default().to_string(),
        }),
    }
}
