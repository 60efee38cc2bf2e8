//! Bucket boundary math.
//!
//! Buckets are fixed-granularity UTC time windows identified by their start
//! instant. The external writer aligns bucket names to the configured
//! granularity; this module provides the same alignment for deriving the
//! latest eligible boundary from an arbitrary trigger instant, plus the
//! timestamp wire format stamped onto exported events.

use std::time::Duration;

use chrono::{DateTime, Utc};

/// Wire format for `time_gen` timestamps.
const TIME_GEN_FORMAT: &str = "%Y%m%d %H:%M:%S";

/// Returns the start of the bucket containing `ts` at the given granularity.
///
/// A `ts` exactly on a boundary is its own bucket start. Zero granularity is
/// rejected by config validation; as a guard, it returns `ts` unchanged.
pub fn start_of(ts: DateTime<Utc>, granularity: Duration) -> DateTime<Utc> {
    let step = granularity.as_secs() as i64;
    if step <= 0 {
        return ts;
    }

    let secs = ts.timestamp();
    let aligned = secs - secs.rem_euclid(step);

    DateTime::from_timestamp(aligned, 0).unwrap_or(ts)
}

/// Formats a bucket timestamp for the `time_gen` event field.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(TIME_GEN_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_start_of_mid_window() {
        let g = Duration::from_secs(60);
        assert_eq!(start_of(ts(90), g), ts(60));
        assert_eq!(start_of(ts(119), g), ts(60));
    }

    #[test]
    fn test_start_of_exact_boundary() {
        let g = Duration::from_secs(60);
        assert_eq!(start_of(ts(0), g), ts(0));
        assert_eq!(start_of(ts(60), g), ts(60));
    }

    #[test]
    fn test_start_of_pre_epoch() {
        let g = Duration::from_secs(60);
        assert_eq!(start_of(ts(-30), g), ts(-60));
    }

    #[test]
    fn test_start_of_zero_granularity_is_identity() {
        assert_eq!(start_of(ts(90), Duration::ZERO), ts(90));
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(ts(0)), "19700101 00:00:00");
        assert_eq!(format_timestamp(ts(60)), "19700101 00:01:00");

        let dt = Utc.with_ymd_and_hms(2016, 1, 1, 13, 45, 9).unwrap();
        assert_eq!(format_timestamp(dt), "20160101 13:45:09");
    }
}
